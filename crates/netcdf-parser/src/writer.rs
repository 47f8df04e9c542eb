//! Write a [`Dataset`] to NetCDF.
//!
//! Dimensions are collected from the time axis, coordinates and fields;
//! a dimension must have the same length everywhere it appears. The time
//! axis is written as `time(time)` in seconds since the Unix epoch.

use std::collections::BTreeMap;
use std::path::Path;

use synsat_common::time::to_epoch_seconds;
use synsat_common::{Dataset, Field};
use tracing::debug;

use crate::error::{NetCdfError, NetCdfResult};
use crate::native::silence_hdf5_errors;
use crate::reader::TIME_VAR;

/// Units written on the time coordinate.
pub const EPOCH_UNITS: &str = "seconds since 1970-01-01 00:00:00";

/// Storage precision for fields. Coordinates and time are always f64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Double,
    Single,
}

/// Writes datasets with a chosen field precision.
#[derive(Debug, Clone, Default)]
pub struct DatasetWriter {
    precision: Precision,
}

impl DatasetWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn write(&self, path: &Path, ds: &Dataset) -> NetCdfResult<()> {
        silence_hdf5_errors();

        let dims = collect_dimensions(ds)?;
        let mut file = netcdf::create(path).map_err(|e| {
            NetCdfError::InvalidFormat(format!("Failed to create NetCDF {}: {}", path.display(), e))
        })?;

        for (name, len) in &dims {
            file.add_dimension(name, *len)?;
        }

        for (name, value) in ds.attrs() {
            file.add_attribute(name, value.as_str())?;
        }

        if !ds.time.is_empty() {
            let seconds: Vec<f64> = ds.time.iter().map(to_epoch_seconds).collect();
            let mut var = file.add_variable::<f64>(TIME_VAR, &[TIME_VAR])?;
            var.put_values(&seconds, ..)?;
            var.put_attribute("units", EPOCH_UNITS)?;
            var.put_attribute("calendar", "standard")?;
        }

        for (name, field) in ds.coords() {
            write_field(&mut file, name, field, Precision::Double)?;
        }
        for (name, field) in ds.fields() {
            write_field(&mut file, name, field, self.precision)?;
        }

        debug!(
            file = %path.display(),
            dimensions = dims.len(),
            fields = ds.field_names().len(),
            "Wrote NetCDF dataset"
        );

        Ok(())
    }
}

/// Write a dataset with double-precision fields.
pub fn write_dataset(path: &Path, ds: &Dataset) -> NetCdfResult<()> {
    DatasetWriter::new().write(path, ds)
}

fn collect_dimensions(ds: &Dataset) -> NetCdfResult<BTreeMap<String, usize>> {
    let mut dims = BTreeMap::new();
    if !ds.time.is_empty() {
        dims.insert(TIME_VAR.to_string(), ds.time.len());
    }

    for (name, field) in ds.coords().chain(ds.fields()) {
        for (dim, &len) in field.dims().iter().zip(field.shape()) {
            if len == 0 {
                return Err(NetCdfError::InvalidFormat(format!(
                    "dimension '{}' of '{}' is empty",
                    dim, name
                )));
            }
            match dims.get(dim) {
                Some(&known) if known != len => {
                    return Err(NetCdfError::InvalidFormat(format!(
                        "dimension '{}' has length {} in '{}' but {} elsewhere",
                        dim, len, name, known
                    )));
                }
                Some(_) => {}
                None => {
                    dims.insert(dim.clone(), len);
                }
            }
        }
    }

    Ok(dims)
}

fn write_field(
    file: &mut netcdf::FileMut,
    name: &str,
    field: &Field,
    precision: Precision,
) -> NetCdfResult<()> {
    let dims: Vec<&str> = field.dims().iter().map(String::as_str).collect();
    let values = field.values();

    let mut var = match precision {
        Precision::Double => {
            let mut var = file.add_variable::<f64>(name, &dims)?;
            var.put_values(&values, ..)?;
            var
        }
        Precision::Single => {
            let values: Vec<f32> = values.iter().map(|&v| v as f32).collect();
            let mut var = file.add_variable::<f32>(name, &dims)?;
            var.put_values(&values, ..)?;
            var
        }
    };

    // Packing and fill attributes describe the source encoding, not ours.
    for (key, value) in field.attrs() {
        if is_encoding_attr(key) {
            continue;
        }
        var.put_attribute(key, value.as_str())?;
    }

    Ok(())
}

fn is_encoding_attr(key: &str) -> bool {
    key.starts_with('_') || matches!(key, "scale_factor" | "add_offset" | "missing_value")
}
