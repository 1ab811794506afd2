//! The keyboard view model
//!
//! [`PianoKeyboard`] builds the 88-key layout once, creates one
//! [`KeyComponent`] per key and subscribes each of them to its own
//! [`EventBus`]. Events reach the keys only through the bus; beams advance
//! only through [`PianoKeyboard::tick`].

use crate::beam::{Beam, BeamSettings, KeyRect};
use crate::bus::{EventBus, FeedAdapter};
use crate::event::{PianoEvent, TimedEvent};
use crate::key::{KeyComponent, KeyState, TouchRegions};
use crate::layout::Layout;
use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Fixed-rate frame deadline.
///
/// Beams grow once per frame, so the frame rate must not depend on how
/// often the caller wakes up for input.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    interval: Duration,
    next_frame: Instant,
}

impl FrameClock {
    /// First frame is due at `start`
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next_frame: start,
        }
    }

    /// Whether a frame is due at `now`. Advances the deadline if so.
    pub fn due(&mut self, now: Instant) -> bool {
        if now < self.next_frame {
            return false;
        }
        self.next_frame += self.interval;
        // Missed frames are dropped, not replayed
        if self.next_frame <= now {
            self.next_frame = now + self.interval;
        }
        true
    }

    /// Time left until the next frame
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_frame.saturating_duration_since(now)
    }
}

/// Keyboard view model
pub struct PianoKeyboard {
    layout: Layout,
    keys: Vec<Rc<RefCell<KeyComponent>>>,
    bus: EventBus<TimedEvent>,
    viewport_height: Rc<Cell<f32>>,
}

impl Default for PianoKeyboard {
    fn default() -> Self {
        Self::new(BeamSettings::default())
    }
}

impl PianoKeyboard {
    /// Build the layout and wire every key to a fresh bus
    pub fn new(settings: BeamSettings) -> Self {
        let layout = Layout::generate();
        let viewport_height = Rc::new(Cell::new(0.0));
        let mut bus = EventBus::new();

        let keys = layout
            .keys()
            .iter()
            .map(|key| {
                let component = Rc::new(RefCell::new(KeyComponent::new(key.clone(), settings)));
                let listener = Rc::clone(&component);
                let viewport = Rc::clone(&viewport_height);
                bus.subscribe(move |timed: &TimedEvent| {
                    listener.borrow_mut().on_event(&timed.event, timed.at, viewport.get());
                });
                component
            })
            .collect();

        Self {
            layout,
            keys,
            bus,
            viewport_height,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Deliver one event to every key
    pub fn dispatch(&mut self, event: PianoEvent, at: Instant) {
        self.bus.publish(&TimedEvent::new(event, at));
    }

    /// Deliver everything pending on the feed
    pub fn pump(&mut self, feed: &FeedAdapter, now: Instant) -> usize {
        feed.pump(&mut self.bus, now)
    }

    /// Advance every beam one frame
    pub fn tick(&mut self, now: Instant) {
        let viewport_height = self.viewport_height.get();
        for key in &self.keys {
            key.borrow_mut().tick(now, viewport_height);
        }
    }

    /// Viewport height (in beam units) used for new beams and releases
    pub fn viewport_height(&self) -> f32 {
        self.viewport_height.get()
    }

    pub fn set_viewport_height(&self, height: f32) {
        self.viewport_height.set(height);
    }

    /// Record where a key was drawn; beams spawned later start there
    pub fn mount(&self, id: u8, rect: KeyRect) -> bool {
        match self.layout.index_of(id) {
            Some(index) => {
                self.keys[index].borrow_mut().mount(rect);
                true
            }
            None => false,
        }
    }

    /// Forget all on-screen rectangles (e.g. the keyboard no longer fits)
    pub fn unmount_all(&self) {
        for key in &self.keys {
            key.borrow_mut().unmount();
        }
    }

    /// Borrow a key component by id
    pub fn key(&self, id: u8) -> Option<Ref<'_, KeyComponent>> {
        self.layout.index_of(id).map(|index| self.keys[index].borrow())
    }

    /// Borrow every key component, left to right
    pub fn components(&self) -> impl Iterator<Item = Ref<'_, KeyComponent>> {
        self.keys.iter().map(|key| key.borrow())
    }

    pub fn state(&self, id: u8) -> Option<KeyState> {
        self.key(id).map(|key| key.state())
    }

    pub fn is_active(&self, id: u8) -> bool {
        self.key(id).is_some_and(|key| key.is_active())
    }

    pub fn touch_regions(&self, id: u8) -> Option<TouchRegions> {
        self.key(id).and_then(|key| key.touch_regions())
    }

    /// Ids of all active keys, ascending
    pub fn active_keys(&self) -> Vec<u8> {
        self.components().filter(|key| key.is_active()).map(|key| key.id()).collect()
    }

    /// Snapshot of the beams owned by a key
    pub fn beams(&self, id: u8) -> Vec<Beam> {
        self.key(id).map(|key| key.beams().to_vec()).unwrap_or_default()
    }

    /// Total number of live beams
    pub fn beam_count(&self) -> usize {
        self.components().map(|key| key.beams().len()).sum()
    }

    /// Number of bus subscribers (one per key)
    pub fn subscriber_count(&self) -> usize {
        self.bus.len()
    }
}
