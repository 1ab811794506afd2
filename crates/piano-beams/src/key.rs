//! Per-key visual state
//!
//! Each rendered key owns a [`KeyComponent`]: its Active/Inactive state,
//! the touch regions of a black key, its last on-screen rectangle and its
//! beam controller. The component sees every event on the bus and ignores
//! those that are not addressed to it or, for black keys, its neighbors.

use crate::beam::{Beam, BeamController, BeamSettings, KeyRect};
use crate::event::{EventType, PianoEvent};
use crate::layout::Key;
use log::debug;
use std::time::Instant;

/// Highlight state of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    Inactive,
    Active,
}

impl KeyState {
    pub fn is_active(self) -> bool {
        self == KeyState::Active
    }

    /// State an event type moves a key to, if any
    fn target(event_type: EventType) -> Option<Self> {
        match event_type {
            EventType::KeyPress => Some(KeyState::Active),
            EventType::KeyRelease => Some(KeyState::Inactive),
            EventType::Pedal | EventType::Ambience => None,
        }
    }
}

/// The two strips under a black key that mirror its white neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchRegions {
    /// Mirrors the white key at `id - 1`
    pub left: KeyState,
    /// Mirrors the white key at `id + 1`
    pub right: KeyState,
}

/// A state change of the key itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activated,
    Released,
}

/// One key of the rendered keyboard
#[derive(Debug, Clone)]
pub struct KeyComponent {
    key: Key,
    state: KeyState,
    generation: u64,
    touch: Option<TouchRegions>,
    rect: Option<KeyRect>,
    beams: BeamController,
}

impl KeyComponent {
    pub fn new(key: Key, settings: BeamSettings) -> Self {
        let touch = key.is_black().then(TouchRegions::default);
        Self {
            key,
            state: KeyState::Inactive,
            generation: 0,
            touch,
            rect: None,
            beams: BeamController::new(settings),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn id(&self) -> u8 {
        self.key.id
    }

    pub fn state(&self) -> KeyState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Number of Inactive -> Active transitions so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Touch regions (black keys only)
    pub fn touch_regions(&self) -> Option<TouchRegions> {
        self.touch
    }

    /// Last on-screen rectangle, None until rendered
    pub fn rect(&self) -> Option<KeyRect> {
        self.rect
    }

    pub fn beams(&self) -> &[Beam] {
        self.beams.beams()
    }

    pub fn mount(&mut self, rect: KeyRect) {
        self.rect = Some(rect);
    }

    pub fn unmount(&mut self) {
        self.rect = None;
    }

    /// Apply an event to the state machine without touching beams.
    ///
    /// Returns the transition of this key's own state, if the event caused
    /// one. Touch regions update silently.
    pub fn apply(&mut self, event: &PianoEvent) -> Option<Transition> {
        let target = KeyState::target(event.event_type)?;
        let id = i32::from(self.key.id);
        let target_id = event.key_id;

        if target_id == id {
            if self.state == target {
                return None;
            }
            self.state = target;
            return Some(match target {
                KeyState::Active => {
                    self.generation += 1;
                    Transition::Activated
                }
                KeyState::Inactive => Transition::Released,
            });
        }

        if let Some(touch) = self.touch.as_mut() {
            if target_id == id - 1 {
                touch.left = target;
            } else if target_id == id + 1 {
                touch.right = target;
            }
        }
        None
    }

    /// Handle a bus event: update state, spawn a beam on activation and
    /// start the release of the growing beam on deactivation
    pub fn on_event(&mut self, event: &PianoEvent, at: Instant, viewport_height: f32) {
        match self.apply(event) {
            Some(Transition::Activated) => {
                let spawned = self.beams.spawn(self.key.id, self.generation, self.rect, viewport_height, at);
                if spawned {
                    debug!("Beam spawned for key {} ({})", self.key.id, self.key.note_name());
                }
            }
            Some(Transition::Released) => self.beams.release(at, viewport_height),
            None => {}
        }
    }

    /// Advance this key's beams one frame
    pub fn tick(&mut self, now: Instant, viewport_height: f32) {
        let active = self.state.is_active().then_some(self.generation);
        self.beams.tick(now, active, viewport_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;

    fn component(id: u8) -> KeyComponent {
        let layout = Layout::generate();
        KeyComponent::new(layout.get(id).unwrap().clone(), BeamSettings::default())
    }

    fn rect() -> KeyRect {
        KeyRect { left: 0.0, width: 2.0, baseline: 64.0 }
    }

    #[test]
    fn test_press_release() {
        let mut key = component(60);
        assert_eq!(key.state(), KeyState::Inactive);
        assert_eq!(key.apply(&PianoEvent::press(60, 100)), Some(Transition::Activated));
        assert!(key.is_active());
        assert_eq!(key.apply(&PianoEvent::release(60)), Some(Transition::Released));
        assert!(!key.is_active());
        assert_eq!(key.generation(), 1);
    }

    #[test]
    fn test_idempotent() {
        let mut key = component(60);
        assert_eq!(key.apply(&PianoEvent::release(60)), None);
        assert_eq!(key.state(), KeyState::Inactive);

        key.apply(&PianoEvent::press(60, 100));
        assert_eq!(key.apply(&PianoEvent::press(60, 100)), None);
        assert!(key.is_active());
        assert_eq!(key.generation(), 1);
    }

    #[test]
    fn test_ignores_ids_off_the_keyboard() {
        let mut key = component(61);
        for key_id in [i32::MIN, -1, 0, 300, i32::MAX] {
            let event = PianoEvent { key_id, ..PianoEvent::press(61, 100) };
            assert_eq!(key.apply(&event), None);
        }
        assert!(!key.is_active());
        assert_eq!(key.touch_regions(), Some(TouchRegions::default()));
    }

    #[test]
    fn test_ignores_other_keys() {
        let mut key = component(60);
        assert_eq!(key.apply(&PianoEvent::press(59, 100)), None);
        assert_eq!(key.apply(&PianoEvent::press(61, 100)), None);
        assert!(!key.is_active());
        assert!(key.touch_regions().is_none());
    }

    #[test]
    fn test_non_key_events_ignored() {
        let mut key = component(60);
        let pedal = PianoEvent { event_type: EventType::Pedal, intensity: 1.0, key_string: String::new(), key_id: 60 };
        assert_eq!(key.apply(&pedal), None);
        assert!(!key.is_active());
    }

    #[test]
    fn test_black_key_touch_regions() {
        let mut key = component(61);
        let touch = key.touch_regions().unwrap();
        assert_eq!(touch, TouchRegions::default());

        key.apply(&PianoEvent::press(60, 100));
        assert_eq!(key.touch_regions().unwrap().left, KeyState::Active);
        assert_eq!(key.touch_regions().unwrap().right, KeyState::Inactive);
        assert!(!key.is_active());

        key.apply(&PianoEvent::press(62, 100));
        assert_eq!(key.touch_regions().unwrap().right, KeyState::Active);

        key.apply(&PianoEvent::release(60));
        assert_eq!(key.touch_regions().unwrap().left, KeyState::Inactive);
        assert!(!key.is_active());
    }

    #[test]
    fn test_touch_regions_do_not_gate_own_state() {
        let mut key = component(61);
        key.apply(&PianoEvent::press(60, 100));
        assert_eq!(key.apply(&PianoEvent::press(61, 100)), Some(Transition::Activated));
        key.apply(&PianoEvent::release(62));
        assert!(key.is_active());
    }

    #[test]
    fn test_on_event_spawns_only_when_mounted() {
        let now = Instant::now();
        let mut key = component(60);
        key.on_event(&PianoEvent::press(60, 100), now, 700.0);
        assert!(key.is_active());
        assert!(key.beams().is_empty());

        key.on_event(&PianoEvent::release(60), now, 700.0);
        key.mount(rect());
        key.on_event(&PianoEvent::press(60, 100), now, 700.0);
        assert_eq!(key.beams().len(), 1);
        assert_eq!(key.beams()[0].origin(), rect());
        assert_eq!(key.beams()[0].generation(), 2);
    }

    #[test]
    fn test_rect_captured_at_spawn() {
        let now = Instant::now();
        let mut key = component(60);
        key.mount(rect());
        key.on_event(&PianoEvent::press(60, 100), now, 700.0);
        key.mount(KeyRect { left: 40.0, width: 3.0, baseline: 80.0 });
        key.tick(now, 700.0);
        assert_eq!(key.beams()[0].origin(), rect());
    }
}
