//! Crate-wide error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    /// Payload field present but unusable (e.g. non-numeric screen resolution)
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("{0} used before it was fitted")]
    NotFitted(&'static str),

    #[error("{0} is already fitted")]
    AlreadyFitted(&'static str),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("numeric instability: {0}")]
    NumericInstability(String),

    /// Persisted bundle does not match this build's format or feature schema
    #[error("model bundle mismatch: {0}")]
    BundleMismatch(String),

    #[error("model bundle checksum mismatch (expected {expected}, found {actual})")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("model not loaded")]
    ModelNotLoaded,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SentinelError>;
