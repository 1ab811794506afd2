//! Configuration file support for piano-beams
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/piano-beams/config.toml`
//! - macOS: `~/Library/Application Support/piano-beams/config.toml`
//! - Windows: `%APPDATA%\piano-beams\config.toml`

use crate::beam::{
    BeamSettings, Easing, DEFAULT_GROWTH_DIVISOR, DEFAULT_INITIAL_HEIGHT, DEFAULT_MAX_BEAMS_PER_KEY,
    DEFAULT_RELEASE_REMOVAL_MS, DEFAULT_RELEASE_TRANSLATE_MS,
};
use crate::capture::{CaptureLayout, KeyCapture, C3_MIDI, DEFAULT_INTENSITY, DEFAULT_NOTE_RELEASE_MS};
use crate::controls::{Controls, DEFAULT_AUTOPLAY_DELAY_MS, DEFAULT_RECORDING_NAME};
use crate::error::{Error, Result};
use directories::ProjectDirs;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of vertical beam units per terminal row
pub const DEFAULT_UNITS_PER_ROW: f32 = 16.0;

const DEFAULT_CONFIG: &str = r##"# piano-beams configuration file

[beam]
# Height of a new beam (units; one terminal row is units_per_row units)
initial_height = 10.0

# Beams grow by viewport_height / growth_divisor every frame while held
growth_divisor = 700.0

# After release a beam drifts up by the viewport height over this time
release_translate_ms = 2900

# ... and is removed this long after release
release_removal_ms = 3000

# Concurrent beams per key (0 = unbounded)
max_per_key = 8

# Vertical units per terminal row
units_per_row = 16.0

# Release drift curve: "linear" or "ease_out"
easing = "linear"

[theme]
# Colors: names ("red", "dark_gray", ...) or "#rrggbb"
active_color = "red"
white_key_color = "white"
black_key_color = "black"
beam_color = "light_red"
border_color = "cyan"

# Show note names on the C keys
show_note_names = true

# Show keyboard shortcuts help
show_help = true

[capture]
# Computer keyboard layout: "german" or "us"
layout = "german"

# Base MIDI note (48 = C3)
base_note = 48

# Auto-release timeout in milliseconds
# Notes are released after this time if no key repeat arrives
note_release_ms = 400

# Intensity of captured presses (1-127)
intensity = 100

[recording]
# Name a stopped recording is stored under
name = "First recording"

# Replay the recording after stopping it
autoplay = true
autoplay_delay_ms = 500
"##;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Beam animation
    pub beam: BeamConfig,
    /// UI/Theme configuration
    pub theme: Theme,
    /// Computer-keyboard capture
    pub capture: CaptureConfig,
    /// Recording and replay
    pub recording: RecordingConfig,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "piano-beams") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config(&path)?;
        Ok(path)
    }

    /// Write the commented default config to `path`
    pub fn write_default_config(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }

    /// Beam animation parameters
    pub fn beam_settings(&self) -> BeamSettings {
        BeamSettings {
            initial_height: self.beam.initial_height,
            growth_divisor: self.beam.growth_divisor,
            release_translate: Duration::from_millis(self.beam.release_translate_ms),
            release_removal: Duration::from_millis(self.beam.release_removal_ms),
            max_per_key: self.beam.max_per_key,
            easing: self.beam.easing,
        }
    }

    /// Capture state for the local backend
    pub fn key_capture(&self) -> KeyCapture {
        let release_after = (self.capture.note_release_ms > 0)
            .then(|| Duration::from_millis(self.capture.note_release_ms));
        KeyCapture::new(
            self.capture.layout,
            self.capture.base_note,
            self.capture.intensity,
            release_after,
        )
    }

    /// Control bar state
    pub fn controls(&self) -> Controls {
        let autoplay = self
            .recording
            .autoplay
            .then(|| Duration::from_millis(self.recording.autoplay_delay_ms));
        Controls::new(self.recording.name.clone(), autoplay)
    }
}

/// Beam settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamConfig {
    /// Height of a new beam
    pub initial_height: f32,
    /// Per-frame growth divisor
    pub growth_divisor: f32,
    /// Release drift duration in milliseconds
    pub release_translate_ms: u64,
    /// Delay between release and removal in milliseconds
    pub release_removal_ms: u64,
    /// Concurrent beams per key (0 = unbounded)
    pub max_per_key: usize,
    /// Vertical units per terminal row
    pub units_per_row: f32,
    /// Release drift curve
    pub easing: Easing,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            initial_height: DEFAULT_INITIAL_HEIGHT,
            growth_divisor: DEFAULT_GROWTH_DIVISOR,
            release_translate_ms: DEFAULT_RELEASE_TRANSLATE_MS,
            release_removal_ms: DEFAULT_RELEASE_REMOVAL_MS,
            max_per_key: DEFAULT_MAX_BEAMS_PER_KEY,
            units_per_row: DEFAULT_UNITS_PER_ROW,
            easing: Easing::Linear,
        }
    }
}

/// Capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Keyboard layout preset
    pub layout: CaptureLayout,
    /// Base MIDI note (48 = C3)
    pub base_note: u8,
    /// Auto-release timeout in milliseconds (0 = only explicit releases)
    pub note_release_ms: u64,
    /// Raw press intensity (1-127)
    pub intensity: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            layout: CaptureLayout::German,
            base_note: C3_MIDI,
            note_release_ms: DEFAULT_NOTE_RELEASE_MS,
            intensity: DEFAULT_INTENSITY,
        }
    }
}

/// Recording settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Name a stopped recording is stored under
    pub name: String,
    /// Replay after stopping
    pub autoplay: bool,
    /// Delay before the replay in milliseconds
    pub autoplay_delay_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_RECORDING_NAME.to_string(),
            autoplay: true,
            autoplay_delay_ms: DEFAULT_AUTOPLAY_DELAY_MS,
        }
    }
}

/// Theme/UI settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    /// Fill of pressed keys and touch regions
    pub active_color: String,
    /// White key color
    pub white_key_color: String,
    /// Black key color
    pub black_key_color: String,
    /// Beam color
    pub beam_color: String,
    /// Border color
    pub border_color: String,
    /// Show note names on keys
    pub show_note_names: bool,
    /// Show help text
    pub show_help: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            active_color: "red".to_string(),
            white_key_color: "white".to_string(),
            black_key_color: "black".to_string(),
            beam_color: "light_red".to_string(),
            border_color: "cyan".to_string(),
            show_note_names: true,
            show_help: true,
        }
    }
}

impl Theme {
    /// Parse a color string to ratatui Color
    pub fn parse_color(s: &str) -> Color {
        match s.to_lowercase().as_str() {
            "black" => Color::Black,
            "red" => Color::Red,
            "green" => Color::Green,
            "yellow" => Color::Yellow,
            "blue" => Color::Blue,
            "magenta" => Color::Magenta,
            "cyan" => Color::Cyan,
            "gray" | "grey" => Color::Gray,
            "dark_gray" | "dark_grey" | "darkgray" | "darkgrey" => Color::DarkGray,
            "light_red" | "lightred" => Color::LightRed,
            "light_green" | "lightgreen" => Color::LightGreen,
            "light_yellow" | "lightyellow" => Color::LightYellow,
            "light_blue" | "lightblue" => Color::LightBlue,
            "light_magenta" | "lightmagenta" => Color::LightMagenta,
            "light_cyan" | "lightcyan" => Color::LightCyan,
            "white" => Color::White,
            // Try parsing as RGB hex
            s if s.starts_with('#') && s.len() == 7 => {
                if let (Ok(r), Ok(g), Ok(b)) = (
                    u8::from_str_radix(&s[1..3], 16),
                    u8::from_str_radix(&s[3..5], 16),
                    u8::from_str_radix(&s[5..7], 16),
                ) {
                    Color::Rgb(r, g, b)
                } else {
                    Color::White
                }
            }
            _ => Color::White,
        }
    }

    pub fn active(&self) -> Color {
        Self::parse_color(&self.active_color)
    }

    pub fn white_key(&self) -> Color {
        Self::parse_color(&self.white_key_color)
    }

    pub fn black_key(&self) -> Color {
        Self::parse_color(&self.black_key_color)
    }

    pub fn beam(&self) -> Color {
        Self::parse_color(&self.beam_color)
    }

    pub fn border(&self) -> Color {
        Self::parse_color(&self.border_color)
    }
}
