//! Normalized key events
//!
//! Every event source (local capture, replay, external feed) produces
//! [`PianoEvent`]s in the same payload shape:
//!
//! ```json
//! { "event_type": "KeyPress", "intensity": 0.78, "key_string": "C", "key_id": 60 }
//! ```
//!
//! Only `event_type` and `key_id` drive the visualization; `intensity` and
//! `key_string` are carried through unchanged. `key_id` is any integer on the
//! wire: ids outside the keyboard match no key and are ignored.

use crate::error::Result;
use crate::layout::pitch_class_name;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Name of the channel the normalized events travel on
pub const EVENT_CHANNEL: &str = "pianoevent";

/// Maximum raw intensity value (MIDI velocity range)
pub const MAX_RAW_INTENSITY: u8 = 127;

/// Event type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    KeyPress,
    KeyRelease,
    /// Pedal changes; accepted but not visualized
    Pedal,
    /// Ambience changes; accepted but not visualized
    Ambience,
}

/// A normalized key event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PianoEvent {
    pub event_type: EventType,
    #[serde(default)]
    pub intensity: f32,
    #[serde(default)]
    pub key_string: String,
    pub key_id: i32,
}

impl PianoEvent {
    /// Key press with a raw 0-127 intensity
    pub fn press(key_id: u8, raw_intensity: u8) -> Self {
        Self {
            event_type: EventType::KeyPress,
            intensity: raw_intensity.min(MAX_RAW_INTENSITY) as f32 / MAX_RAW_INTENSITY as f32,
            key_string: pitch_class_name(key_id).to_string(),
            key_id: key_id.into(),
        }
    }

    /// Key release
    pub fn release(key_id: u8) -> Self {
        Self {
            event_type: EventType::KeyRelease,
            intensity: 0.0,
            key_string: pitch_class_name(key_id).to_string(),
            key_id: key_id.into(),
        }
    }

    pub fn is_press(&self) -> bool {
        self.event_type == EventType::KeyPress
    }

    pub fn is_release(&self) -> bool {
        self.event_type == EventType::KeyRelease
    }

    /// Parse a JSON payload
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Serialize to a single-line JSON payload
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An event stamped with the frame time it is delivered at
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub event: PianoEvent,
    pub at: Instant,
}

impl TimedEvent {
    pub fn new(event: PianoEvent, at: Instant) -> Self {
        Self { event, at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload() {
        let event = PianoEvent::from_json(
            r#"{"event_type":"KeyPress","intensity":0.5,"key_string":"C","key_id":60}"#,
        )
        .unwrap();
        assert!(event.is_press());
        assert_eq!(event.key_id, 60);
        assert_eq!(event.intensity, 0.5);
        assert_eq!(event.key_string, "C");
    }

    #[test]
    fn test_parse_minimal_payload() {
        let event = PianoEvent::from_json(r#"{"event_type":"KeyRelease","key_id":61}"#).unwrap();
        assert!(event.is_release());
        assert_eq!(event.key_id, 61);
        assert_eq!(event.intensity, 0.0);
        assert!(event.key_string.is_empty());
    }

    #[test]
    fn test_parse_non_key_events() {
        let event = PianoEvent::from_json(
            r#"{"event_type":"Pedal","intensity":1.0,"key_string":"","key_id":0}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, EventType::Pedal);
        assert!(!event.is_press());
        assert!(!event.is_release());
    }

    #[test]
    fn test_parse_out_of_range_key_id() {
        let event = PianoEvent::from_json(r#"{"event_type":"KeyPress","key_id":300}"#).unwrap();
        assert_eq!(event.key_id, 300);
        let event = PianoEvent::from_json(r#"{"event_type":"KeyRelease","key_id":-1}"#).unwrap();
        assert_eq!(event.key_id, -1);
    }

    #[test]
    fn test_rejects_bad_payload() {
        assert!(PianoEvent::from_json(r#"{"event_type":"Bogus","key_id":60}"#).is_err());
        assert!(PianoEvent::from_json(r#"{"event_type":"KeyPress","key_id":1.5}"#).is_err());
        assert!(PianoEvent::from_json("not json").is_err());
    }

    #[test]
    fn test_constructors() {
        let press = PianoEvent::press(61, 127);
        assert_eq!(press.intensity, 1.0);
        assert_eq!(press.key_string, "C#");

        let release = PianoEvent::release(61);
        assert_eq!(release.intensity, 0.0);
        assert!(release.is_release());
    }

    #[test]
    fn test_json_shape() {
        let json = PianoEvent::release(60).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event_type"], "KeyRelease");
        assert_eq!(value["key_id"], 60);
        assert_eq!(value["key_string"], "C");
        assert!(value.get("intensity").is_some());
    }
}
