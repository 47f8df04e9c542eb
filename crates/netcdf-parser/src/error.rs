//! Error types for NetCDF reading and writing.

use synsat_common::CommonError;
use thiserror::Error;

/// Result type for NetCDF parser operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF parsing.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error reported by libnetcdf
    #[error("NetCDF error: {0}")]
    Library(#[from] netcdf::Error),

    /// Missing required variable, dimension or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Decoded values do not fit the dataset model
    #[error(transparent)]
    Model(#[from] CommonError),
}
