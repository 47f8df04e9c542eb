//! NetCDF reading and writing for synsat datasets.
//!
//! Source adapters read model output with [`read_dataset`] /
//! [`read_dataset_with`]; results and solver exchange files are written with
//! [`DatasetWriter`].
//!
//! Uses the native `netcdf` crate (libnetcdf + HDF5). System requirements:
//! `libhdf5-dev libnetcdf-dev`.

pub mod error;
pub mod native;
pub mod reader;
pub mod writer;

pub use error::{NetCdfError, NetCdfResult};
pub use native::silence_hdf5_errors;
pub use reader::{read_dataset, read_dataset_with, ReadOptions, TIME_VAR};
pub use writer::{write_dataset, DatasetWriter, Precision, EPOCH_UNITS};
