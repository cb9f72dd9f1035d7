// crates/arc-config/src/error.rs
// ============================================================================
// Module: Config Errors
// Description: Closed error enum for config load/parse/validation failures.
// Purpose: Surface configuration problems before any ingestor runs.
// Dependencies: thiserror, arc-core
// ============================================================================

use arc_core::ArcError;
use arc_core::ArcErrorKind;
use thiserror::Error;

/// Maximum accepted size, in bytes, of a config file on disk.
pub const MAX_CONFIG_FILE_BYTES: usize = 1024 * 1024;
/// Maximum accepted length of a config path.
pub const MAX_CONFIG_PATH_LENGTH: usize = 4096;
/// Maximum accepted length of a single path component.
pub const MAX_CONFIG_PATH_COMPONENT_LENGTH: usize = 255;

/// Config load, parse, and validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The config path exceeded [`MAX_CONFIG_PATH_LENGTH`].
    #[error("config path exceeds max length")]
    PathTooLong,
    /// A single path component exceeded [`MAX_CONFIG_PATH_COMPONENT_LENGTH`].
    #[error("config path component too long")]
    PathComponentTooLong,
    /// The config file could not be read from disk.
    #[error("config file could not be read: {0}")]
    Io(String),
    /// The config file exceeded [`MAX_CONFIG_FILE_BYTES`].
    #[error("config file exceeds size limit")]
    FileTooLarge,
    /// The config file was not valid UTF-8.
    #[error("config file must be utf-8")]
    NotUtf8,
    /// The config file was not valid TOML.
    #[error("config file is not valid toml: {0}")]
    InvalidToml(String),
    /// An ingestor is enabled but missing a key its [`crate::ingestors`]
    /// variant requires.
    #[error("ingestor '{ingestor}' is enabled but missing required key '{key}'")]
    MissingRequiredKey {
        /// Ingestor registry name.
        ingestor: String,
        /// Missing required key.
        key: String,
    },
    /// The simulation timeout was zero or otherwise out of range.
    #[error("simulation timeout must be greater than zero")]
    InvalidSimulationTimeout,
}

impl From<ConfigError> for ArcError {
    fn from(err: ConfigError) -> Self {
        Self::new(ArcErrorKind::Parse, err.to_string())
            .with_detail("source", "config")
            .with_detail("operation", "load")
    }
}
