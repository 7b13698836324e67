//! Error types for confound-continuum

use thiserror::Error;

/// Result type alias for confound-continuum operations
pub type Result<T> = std::result::Result<T, ContinuumError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum ContinuumError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Unknown parameter '{name}' for {estimator}")]
    UnknownParameter { estimator: String, name: String },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for ContinuumError {
    fn from(err: polars::error::PolarsError) -> Self {
        ContinuumError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ContinuumError {
    fn from(err: serde_json::Error) -> Self {
        ContinuumError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ContinuumError {
    fn from(err: ndarray::ShapeError) -> Self {
        ContinuumError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
