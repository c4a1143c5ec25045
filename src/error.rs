//! Error types for AeroGuard Prep

use thiserror::Error;

/// Errors that can occur while preparing or scoring data
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("Failed to parse measurement rows: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
