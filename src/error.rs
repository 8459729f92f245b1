//! Error types for trainr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in trainr
#[derive(Debug, Error)]
pub enum TrainrError {
    /// Bad input rejected synchronously at submission
    #[error("Validation error: {0}")]
    Validation(String),

    /// Training or inference backend failure
    #[error("Capability error: {0}")]
    Capability(String),

    /// Durable store unreachable or write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Artifact or model lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid concurrency or config limit
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    /// Admission machinery misuse, a programming error rather than an
    /// operational failure
    #[error("Admission error: {0}")]
    Admission(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for trainr operations
pub type Result<T> = std::result::Result<T, TrainrError>;
