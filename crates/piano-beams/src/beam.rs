//! Sustain beams
//!
//! A beam is spawned when a key goes down. It sits on the key's top edge,
//! grows by a fixed increment every frame while the key is held, and once
//! the key is released it freezes, drifts up by the full viewport height
//! and is removed after a fixed delay.
//!
//! The release phase is stamped with the time of the release event, so the
//! drift and the removal delay count from the event. Removal itself happens
//! on the first frame at or past that delay.
//!
//! Coordinates: `left`/`width` are in screen columns, vertical values
//! (`baseline`, heights, viewport) are in abstract units measured upward
//! from the bottom of the screen. The renderer decides how many units make
//! up a terminal row.

use log::debug;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Height of a freshly spawned beam
pub const DEFAULT_INITIAL_HEIGHT: f32 = 10.0;

/// Per-frame growth is `viewport_height / DEFAULT_GROWTH_DIVISOR`
pub const DEFAULT_GROWTH_DIVISOR: f32 = 700.0;

/// Duration of the upward drift after release
pub const DEFAULT_RELEASE_TRANSLATE_MS: u64 = 2900;

/// Delay between release and removal
pub const DEFAULT_RELEASE_REMOVAL_MS: u64 = 3000;

/// Maximum concurrent beams per key (0 = unbounded)
pub const DEFAULT_MAX_BEAMS_PER_KEY: usize = 8;

/// Easing curve for the release drift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseOut,
}

impl Easing {
    /// Map progress in [0, 1] to eased progress in [0, 1]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseOut => 1.0 - (1.0 - t).powi(3),
        }
    }
}

/// Beam animation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamSettings {
    pub initial_height: f32,
    pub growth_divisor: f32,
    pub release_translate: Duration,
    pub release_removal: Duration,
    pub max_per_key: usize,
    pub easing: Easing,
}

impl Default for BeamSettings {
    fn default() -> Self {
        Self {
            initial_height: DEFAULT_INITIAL_HEIGHT,
            growth_divisor: DEFAULT_GROWTH_DIVISOR,
            release_translate: Duration::from_millis(DEFAULT_RELEASE_TRANSLATE_MS),
            release_removal: Duration::from_millis(DEFAULT_RELEASE_REMOVAL_MS),
            max_per_key: DEFAULT_MAX_BEAMS_PER_KEY,
            easing: Easing::Linear,
        }
    }
}

impl BeamSettings {
    /// Per-frame growth for a given viewport height
    pub fn increment(&self, viewport_height: f32) -> f32 {
        if self.growth_divisor > 0.0 {
            viewport_height / self.growth_divisor
        } else {
            0.0
        }
    }
}

/// On-screen rectangle of a key, as captured when a beam spawns
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyRect {
    pub left: f32,
    pub width: f32,
    pub baseline: f32,
}

/// Animation phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeamPhase {
    Growing,
    /// Drifting away; `travel` is the viewport height at release time
    Releasing { started: Instant, travel: f32 },
}

/// A single beam
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    owner: u8,
    generation: u64,
    origin: KeyRect,
    height: f32,
    increment: f32,
    offset: f32,
    phase: BeamPhase,
}

impl Beam {
    pub fn owner(&self) -> u8 {
        self.owner
    }

    /// Activation generation of the owning key that spawned this beam
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn origin(&self) -> KeyRect {
        self.origin
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Upward translation applied during release
    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn phase(&self) -> BeamPhase {
        self.phase
    }

    pub fn is_growing(&self) -> bool {
        self.phase == BeamPhase::Growing
    }

    /// Bottom edge, including the release translation
    pub fn bottom(&self) -> f32 {
        self.origin.baseline + self.offset
    }

    /// Top edge, including the release translation
    pub fn top(&self) -> f32 {
        self.bottom() + self.height
    }

    fn begin_release(&mut self, now: Instant, viewport_height: f32) {
        if self.is_growing() {
            self.phase = BeamPhase::Releasing {
                started: now,
                travel: viewport_height,
            };
        }
    }

    /// Advance one frame. Returns false once the beam should be removed.
    fn step(&mut self, now: Instant, holding: bool, viewport_height: f32, settings: &BeamSettings) -> bool {
        match self.phase {
            BeamPhase::Growing if holding => {
                self.height += self.increment;
                true
            }
            BeamPhase::Growing => {
                self.begin_release(now, viewport_height);
                true
            }
            BeamPhase::Releasing { started, travel } => {
                let elapsed = now.saturating_duration_since(started);
                if elapsed >= settings.release_removal {
                    return false;
                }
                let progress = if settings.release_translate.is_zero() {
                    1.0
                } else {
                    elapsed.as_secs_f32() / settings.release_translate.as_secs_f32()
                };
                self.offset = travel * settings.easing.apply(progress);
                true
            }
        }
    }
}

/// Beam animation controller for one key
#[derive(Debug, Clone)]
pub struct BeamController {
    settings: BeamSettings,
    beams: Vec<Beam>,
}

impl BeamController {
    pub fn new(settings: BeamSettings) -> Self {
        Self {
            settings,
            beams: Vec::new(),
        }
    }

    pub fn settings(&self) -> &BeamSettings {
        &self.settings
    }

    /// Spawn a beam for a new activation.
    ///
    /// Does nothing and returns false when the key has no on-screen
    /// rectangle yet. Any beam still growing from an earlier activation is
    /// switched to its release phase first.
    pub fn spawn(
        &mut self,
        owner: u8,
        generation: u64,
        rect: Option<KeyRect>,
        viewport_height: f32,
        now: Instant,
    ) -> bool {
        let Some(origin) = rect else {
            return false;
        };

        for beam in self.beams.iter_mut() {
            beam.begin_release(now, viewport_height);
        }

        if self.settings.max_per_key > 0 {
            while self.beams.len() >= self.settings.max_per_key {
                // Oldest first; none of them is growing at this point
                let retired = self.beams.remove(0);
                debug!("Retiring beam for key {} (generation {})", owner, retired.generation);
            }
        }

        self.beams.push(Beam {
            owner,
            generation,
            origin,
            height: self.settings.initial_height,
            increment: self.settings.increment(viewport_height),
            offset: 0.0,
            phase: BeamPhase::Growing,
        });
        true
    }

    /// Switch the growing beam, if any, to its release phase at `now`
    pub fn release(&mut self, now: Instant, viewport_height: f32) {
        for beam in self.beams.iter_mut() {
            beam.begin_release(now, viewport_height);
        }
    }

    /// Advance every beam one frame.
    ///
    /// `active_generation` is the owning key's current activation, or None
    /// while the key is up. A growing beam keeps growing only while it
    /// belongs to the current activation.
    pub fn tick(&mut self, now: Instant, active_generation: Option<u64>, viewport_height: f32) {
        let settings = self.settings;
        self.beams.retain_mut(|beam| {
            let holding = active_generation == Some(beam.generation);
            beam.step(now, holding, viewport_height, &settings)
        });
    }

    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    /// The beam tracking the current activation, if any
    pub fn growing(&self) -> Option<&Beam> {
        self.beams.iter().find(|b| b.is_growing())
    }

    pub fn len(&self) -> usize {
        self.beams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }
}
