//! piano-beams - Terminal 88-key piano visualizer
//!
//! Renders a full 88-key keyboard and shows, in real time, which keys are
//! held and for how long: a pressed key lights up and grows a "sustain
//! beam" that drifts away and disappears after the key is released.
//! Features include:
//!
//! - Layout generated from the Start / CE / FB section templates (ids 21-108)
//! - Synchronous event bus fanning normalized key events out to every key
//! - Touch regions under black keys mirroring their white neighbors
//! - Computer-keyboard capture with in-memory recording and replay
//! - JSON-lines event feed for external producers
//! - Configurable via TOML file
//!
//! # Usage as a Library
//!
//! ```
//! use piano_beams::{KeyRect, PianoEvent, PianoKeyboard};
//! use std::time::{Duration, Instant};
//!
//! let mut keyboard = PianoKeyboard::default();
//! keyboard.set_viewport_height(700.0);
//! keyboard.mount(60, KeyRect { left: 46.0, width: 2.0, baseline: 128.0 });
//!
//! let now = Instant::now();
//! keyboard.dispatch(PianoEvent::press(60, 100), now);
//! assert!(keyboard.is_active(60));
//!
//! // One frame later the beam has grown by 700 / 700 units
//! keyboard.tick(now + Duration::from_millis(16));
//! assert_eq!(keyboard.beams(60)[0].height(), 11.0);
//! ```

pub mod backend;
pub mod beam;
pub mod bus;
pub mod capture;
pub mod config;
pub mod controls;
pub mod error;
pub mod event;
pub mod feed;
pub mod key;
pub mod layout;
pub mod piano;
pub mod ui;

// Re-export main types
pub use backend::{Backend, LocalBackend, Recording};
pub use beam::{Beam, BeamController, BeamPhase, BeamSettings, Easing, KeyRect};
pub use bus::{EventBus, FeedAdapter, SubscriptionId};
pub use capture::{CaptureLayout, KeyCapture, C3_MIDI};
pub use config::{Config, Theme};
pub use controls::{Controls, Toggle};
pub use error::{Error, Result};
pub use event::{EventType, PianoEvent, TimedEvent, EVENT_CHANNEL};
pub use feed::FeedReader;
pub use key::{KeyComponent, KeyState, TouchRegions};
pub use layout::{note_name, Key, KeyGeometry, KeyKind, Layout, LayoutContext, SectionKind};
pub use piano::{FrameClock, PianoKeyboard};
pub use ui::{render_piano, PianoWidget, ScreenLayout};
