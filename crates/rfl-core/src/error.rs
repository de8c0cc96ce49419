//! Error types for RFL

use thiserror::Error;

/// Main error type for RFL
#[derive(Error, Debug)]
pub enum RflError {
    #[error("Input size mismatch: expected {expected} power levels, got {actual}")]
    InputSizeMismatch { expected: usize, actual: usize },

    #[error("Sequencing error: {0}")]
    Sequencing(String),

    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RFL operations
pub type Result<T> = std::result::Result<T, RflError>;
