//! Error types for the neurotrack training engine

use thiserror::Error;

/// Result type alias for neurotrack operations
pub type Result<T> = std::result::Result<T, NeurotrackError>;

/// Main error type for the training engine
#[derive(Error, Debug)]
pub enum NeurotrackError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Index {index} out of range for {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("Model not trained")]
    ModelNotTrained,
}

impl From<serde_json::Error> for NeurotrackError {
    fn from(err: serde_json::Error) -> Self {
        NeurotrackError::SerializationError(err.to_string())
    }
}

impl From<polars::error::PolarsError> for NeurotrackError {
    fn from(err: polars::error::PolarsError) -> Self {
        NeurotrackError::DataError(err.to_string())
    }
}
