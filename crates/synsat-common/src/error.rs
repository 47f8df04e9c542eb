//! Error types shared by the data model.

use thiserror::Error;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised while manipulating fields, datasets and timestamps.
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Dimension not found: {0}")]
    MissingDimension(String),

    #[error("Variable not found: {0}")]
    MissingVariable(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Timestamp {0} not present in dataset")]
    MissingTime(String),

    #[error("Time axes differ: {0}")]
    TimeAxisMismatch(String),

    #[error("Invalid extent: {0}")]
    InvalidExtent(String),
}
