//! Error types for docqa.
//!
//! A single error enum covers configuration, I/O, embedding, store and
//! serialization failures. Only provider initialization failures are meant
//! to abort; the store absorbs the rest with degraded results.

use thiserror::Error;

/// Unified error type for docqa.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Caller passed a metadata list that does not line up with the texts
    #[error("Metadata length mismatch: {texts} texts but {metadata} metadata entries")]
    MetadataLengthMismatch { texts: usize, metadata: usize },

    /// Vectors of a different dimension than the collection holds
    #[error("Dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Metadata value that cannot be stored faithfully
    #[error("Invalid metadata value for '{key}': {reason}")]
    InvalidMetadata { key: String, reason: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
