//! Error types for piano-beams

use thiserror::Error;

/// Result type alias for piano-beams operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in piano-beams
///
/// The visualization engine itself never fails; these cover the shell
/// around it (configuration, backend commands, event feeds).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend command error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Event feed error
    #[error("Feed error: {0}")]
    Feed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Event payload (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
