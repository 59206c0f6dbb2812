//! Error types for split-engine
//!
//! Validation failures are raised before any state is written, so callers
//! can fix their input and retry.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// split-engine error types
#[derive(Error, Debug)]
pub enum Error {
    /// Experiment definition rejected before persisting
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No experiment with the given name is persisted or configured
    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    /// The experiment exists but has no alternative with that name
    #[error("Alternative '{alternative}' not found in experiment '{experiment}'")]
    AlternativeNotFound {
        /// Experiment name
        experiment: String,
        /// Requested alternative name
        alternative: String,
    },

    /// Store operation against a key holding another kind of value
    #[error("WRONGTYPE operation against key '{key}' (expected {expected})")]
    WrongType {
        /// Store key
        key: String,
        /// Kind the operation expected
        expected: &'static str,
    },

    /// A stored counter is not an integer
    #[error("Value at '{key}' is not an integer: {value}")]
    InvalidValue {
        /// Store key (and field, for hashes)
        key: String,
        /// Offending value
        value: String,
    },

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
