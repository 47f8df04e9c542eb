//! Error types for the model-input crate.

use netcdf_parser::NetCdfError;
use synsat_common::CommonError;
use thiserror::Error;

/// Errors raised while opening a source and building the atmospheric state.
#[derive(Error, Debug)]
pub enum InputError {
    // Configuration errors: raised before any file is opened.
    #[error("Cannot infer source family from '{0}'")]
    UnknownSource(String),

    #[error("Unsupported source flavor: {0}")]
    UnsupportedFlavor(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Unexpected file name '{name}': {reason}")]
    FileName { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Data errors
    #[error("Required field '{field}' missing from {source_ref}")]
    MissingField { field: String, source_ref: String },

    #[error("Field '{field}' in {source_ref} has {count} missing or non-finite values")]
    NonFinite {
        field: String,
        count: usize,
        source_ref: String,
    },

    #[error("Companion file {0} does not cover the requested times")]
    TimeMismatch(String),

    #[error("Shape error: {0}")]
    Shape(String),

    // Wrapped I/O
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read NetCDF data: {0}")]
    NetCdf(#[from] NetCdfError),

    #[error("Failed to read Zarr data: {0}")]
    Zarr(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error(transparent)]
    Model(#[from] CommonError),
}

impl InputError {
    pub fn missing_field(field: impl Into<String>, source_ref: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            source_ref: source_ref.into(),
        }
    }

    pub fn file_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FileName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised from configuration alone.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSource(_)
                | Self::UnsupportedFlavor(_)
                | Self::MissingConfig(_)
                | Self::FileName { .. }
                | Self::InvalidConfig(_)
        )
    }
}

/// Result type for input operations.
pub type Result<T> = std::result::Result<T, InputError>;
