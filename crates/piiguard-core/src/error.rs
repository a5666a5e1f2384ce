//! Error types for PiiGuard Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid regex pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Malformed span [{start}, {end}) for text of length {len}")]
    MalformedSpan { start: usize, end: usize, len: usize },

    #[error("Guard type not found: {0}")]
    GuardTypeNotFound(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Regex pattern not found: {0}")]
    PatternNotFound(String),

    #[error("Detector '{detector}' unavailable: {reason}")]
    DetectorUnavailable { detector: String, reason: String },

    // Configuration errors
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error is raised while validating a configuration mutation
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidPattern { .. }
                | Error::UnknownEntityType(_)
                | Error::ConfigValidation(_)
                | Error::PatternNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
