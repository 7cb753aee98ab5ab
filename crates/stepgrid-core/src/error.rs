//! Error types for stepgrid-core.

use thiserror::Error;

/// Result type alias for stepgrid operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the sequencing engine.
///
/// Only [`Error::UnsupportedEnvironment`] is fatal. Everything the scheduling
/// loop can run into while playing (bad tempo input, a voice with no sample
/// loaded yet, a redundant start or stop) is handled locally and never
/// surfaces here.
#[derive(Debug, Error)]
pub enum Error {
    /// Audio output is unavailable (no device, no usable stream)
    #[error("Unsupported audio environment: {0}")]
    UnsupportedEnvironment(String),

    /// Tempo is not a positive finite number
    #[error("Invalid tempo: {0}")]
    InvalidTempo(String),

    /// Grid shape or cell coordinates are out of range
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
