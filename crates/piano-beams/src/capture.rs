//! Computer-keyboard capture
//!
//! Turns terminal key presses into normalized [`PianoEvent`]s using a
//! two-octave piano mapping on the letter rows. Terminals without
//! key-release reporting only send presses and repeats, so a held note is
//! released once it has not been touched for the auto-release timeout.

use crate::event::PianoEvent;
use crate::layout::{note_name, FIRST_KEY_ID, LAST_KEY_ID};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// MIDI note number for C3
pub const C3_MIDI: u8 = 48;

/// Default raw intensity for captured presses
pub const DEFAULT_INTENSITY: u8 = 100;

/// Default note release timeout in milliseconds.
/// Must be longer than the OS key repeat delay (typically 300-500ms)
pub const DEFAULT_NOTE_RELEASE_MS: u64 = 400;

/// Octave shift limit in either direction
const MAX_OCTAVE_SHIFT: i8 = 4;

/// Physical keyboard layout preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureLayout {
    /// German QWERTZ layout
    #[default]
    German,
    /// US QWERTY layout
    Us,
}

/// A computer key and the note offset it plays relative to the base note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMapping {
    pub key_char: char,
    pub note_offset: i8,
}

/// German QWERTZ mapping - two octave range:
/// ```text
///     1   2     4   5   6        C#4 D#4   F#4 G#4 A#4
///    Q   W   E   R   T   Z   U   D4  E4  F4  G4  A4  B4  C5
///     S     F G     J K L        A#2   C#3 D#3   F#3 G#3 A#3
///    Y   X   C   V   B   N   M   ,   .   -
///    A2  B2  C3  D3  E3  F3  G3  A3  B3  C4
/// ```
const GERMAN_MAPPINGS: [(char, i8); 28] = [
    ('y', -3), ('x', -1), ('c', 0), ('v', 2), ('b', 4), ('n', 5), ('m', 7),
    (',', 9), ('.', 11), ('-', 12),
    ('s', -2), ('f', 1), ('g', 3), ('j', 6), ('k', 8), ('l', 10),
    ('q', 14), ('w', 16), ('e', 17), ('r', 19), ('t', 21), ('z', 23), ('u', 24),
    ('1', 13), ('2', 15), ('4', 18), ('5', 20), ('6', 22),
];

impl CaptureLayout {
    /// Key mappings for this layout
    pub fn mappings(self) -> Vec<KeyMapping> {
        GERMAN_MAPPINGS
            .iter()
            .map(|&(key_char, note_offset)| {
                let key_char = match (self, key_char) {
                    // Y and Z swap places, '/' sits where '-' is on QWERTZ
                    (CaptureLayout::Us, 'y') => 'z',
                    (CaptureLayout::Us, 'z') => 'y',
                    (CaptureLayout::Us, '-') => '/',
                    (_, c) => c,
                };
                KeyMapping { key_char, note_offset }
            })
            .collect()
    }
}

/// Capture state: key mapping, octave shift and held notes
#[derive(Debug, Clone)]
pub struct KeyCapture {
    layout: CaptureLayout,
    mappings: Vec<KeyMapping>,
    base_note: u8,
    octave_shift: i8,
    intensity: u8,
    release_after: Option<Duration>,
    /// Held notes and when they were last touched
    held: HashMap<u8, Instant>,
}

impl Default for KeyCapture {
    fn default() -> Self {
        Self::new(
            CaptureLayout::German,
            C3_MIDI,
            DEFAULT_INTENSITY,
            Some(Duration::from_millis(DEFAULT_NOTE_RELEASE_MS)),
        )
    }
}

impl KeyCapture {
    /// `release_after` of None disables auto-release (for terminals that
    /// report key releases)
    pub fn new(layout: CaptureLayout, base_note: u8, intensity: u8, release_after: Option<Duration>) -> Self {
        Self {
            layout,
            mappings: layout.mappings(),
            base_note: base_note.min(127),
            octave_shift: 0,
            intensity: intensity.min(127),
            release_after,
            held: HashMap::new(),
        }
    }

    pub fn layout(&self) -> CaptureLayout {
        self.layout
    }

    pub fn set_release_after(&mut self, release_after: Option<Duration>) {
        self.release_after = release_after;
    }

    /// Base note with the octave shift applied
    pub fn effective_base_note(&self) -> u8 {
        let shifted = self.base_note as i16 + self.octave_shift as i16 * 12;
        shifted.clamp(0, 127) as u8
    }

    /// Note played by a computer key, if it is mapped and on the keyboard
    pub fn note_for_char(&self, c: char) -> Option<u8> {
        let c = c.to_ascii_lowercase();
        let mapping = self.mappings.iter().find(|m| m.key_char == c)?;
        let note = self.effective_base_note() as i16 + mapping.note_offset as i16;
        (FIRST_KEY_ID as i16..=LAST_KEY_ID as i16)
            .contains(&note)
            .then_some(note as u8)
    }

    /// Handle a key press. Returns a press event for a newly held note;
    /// a press on an already held note only extends it.
    pub fn key_down(&mut self, c: char, now: Instant) -> Option<PianoEvent> {
        let note = self.note_for_char(c)?;
        if self.held.insert(note, now).is_some() {
            return None;
        }
        Some(PianoEvent::press(note, self.intensity))
    }

    /// Extend a held note (key repeat)
    pub fn touch(&mut self, c: char, now: Instant) {
        if let Some(note) = self.note_for_char(c) {
            if let Some(touched) = self.held.get_mut(&note) {
                *touched = now;
            }
        }
    }

    /// Handle a key release
    pub fn key_up(&mut self, c: char) -> Option<PianoEvent> {
        let note = self.note_for_char(c)?;
        self.held.remove(&note).map(|_| PianoEvent::release(note))
    }

    /// Release notes not touched within the auto-release timeout
    pub fn expire(&mut self, now: Instant) -> Vec<PianoEvent> {
        let Some(release_after) = self.release_after else {
            return Vec::new();
        };
        let mut expired: Vec<u8> = self
            .held
            .iter()
            .filter(|(_, &touched)| now.saturating_duration_since(touched) > release_after)
            .map(|(&note, _)| note)
            .collect();
        expired.sort_unstable();
        for note in &expired {
            self.held.remove(note);
        }
        expired.into_iter().map(PianoEvent::release).collect()
    }

    /// Release every held note
    pub fn release_all(&mut self) -> Vec<PianoEvent> {
        let mut notes: Vec<u8> = self.held.drain().map(|(note, _)| note).collect();
        notes.sort_unstable();
        notes.into_iter().map(PianoEvent::release).collect()
    }

    /// Shift up an octave, releasing held notes first
    pub fn octave_up(&mut self) -> Vec<PianoEvent> {
        let released = self.release_all();
        if self.octave_shift < MAX_OCTAVE_SHIFT {
            self.octave_shift += 1;
        }
        released
    }

    /// Shift down an octave, releasing held notes first
    pub fn octave_down(&mut self) -> Vec<PianoEvent> {
        let released = self.release_all();
        if self.octave_shift > -MAX_OCTAVE_SHIFT {
            self.octave_shift -= 1;
        }
        released
    }

    /// Current octave display name (e.g. "C3")
    pub fn octave_name(&self) -> String {
        note_name(self.effective_base_note())
    }

    /// Held notes, ascending
    pub fn held_notes(&self) -> Vec<u8> {
        let mut notes: Vec<u8> = self.held.keys().copied().collect();
        notes.sort_unstable();
        notes
    }
}
