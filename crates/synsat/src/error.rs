//! Error types for the simulation pipeline.

use model_input::InputError;
use netcdf_parser::NetCdfError;
use synsat_common::CommonError;
use thiserror::Error;

/// Errors raised while configuring, building profiles or reassembling output.
#[derive(Error, Debug)]
pub enum SynsatError {
    /// Invalid or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Instrument name or satellite number not in the registry.
    #[error("unsupported instrument: {0}")]
    UnsupportedInstrument(String),

    /// Channel number not defined for the instrument.
    #[error("{instrument} has no channel {channel}")]
    UnknownChannel { instrument: String, channel: u16 },

    /// A profile batch over zero profiles was requested.
    #[error("empty profile selection: {0}")]
    EmptySelection(String),

    /// Array shapes or dimensions that cannot be stacked or reassembled.
    #[error("shape error: {0}")]
    Shape(String),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    NetCdf(#[from] NetCdfError),

    #[error(transparent)]
    Model(#[from] CommonError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SynsatError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    /// Configuration errors are raised before any I/O or solver call.
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::Config(_) | Self::UnsupportedInstrument(_) | Self::UnknownChannel { .. } => true,
            Self::Input(e) => e.is_config_error(),
            _ => false,
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, SynsatError>;

/// Failure of a simulation run.
///
/// Solver errors are carried unmodified in [`RunError::Solver`].
#[derive(Error, Debug)]
pub enum RunError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Solver(E),

    #[error(transparent)]
    Pipeline(#[from] SynsatError),
}

impl<E: std::error::Error + 'static> RunError<E> {
    /// The solver's own error, if that is what failed.
    pub fn solver_error(&self) -> Option<&E> {
        match self {
            Self::Solver(e) => Some(e),
            Self::Pipeline(_) => None,
        }
    }
}

impl<E: std::error::Error + 'static> From<InputError> for RunError<E> {
    fn from(e: InputError) -> Self {
        Self::Pipeline(e.into())
    }
}
