//! Read NetCDF files into a [`Dataset`].
//!
//! Every numeric variable becomes an `f64` [`Field`] with its on-disk
//! dimension names. One-dimensional variables named after their own
//! dimension (`lon(lon)`, `lev(lev)`) become coordinates. The `time`
//! variable is decoded into [`Dataset::time`] instead of being stored as a
//! field.
//!
//! Packing (`scale_factor`/`add_offset`) is applied and `_FillValue` /
//! `missing_value` entries are replaced by NaN.

use std::path::Path;

use synsat_common::time::decode_time_values;
use synsat_common::{Dataset, Field};
use tracing::{debug, warn};

use crate::error::{NetCdfError, NetCdfResult};
use crate::native::{get_f64_attr, get_string_attr, global_attributes, silence_hdf5_errors, variable_attributes};

/// Name of the decoded time variable.
pub const TIME_VAR: &str = "time";

/// Options controlling [`read_dataset_with`].
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Only read these variables (plus coordinates and time). `None` reads all.
    pub variables: Option<Vec<String>>,
    /// Rounding applied when decoding packed `YYYYMMDD.fraction` times.
    pub time_round_secs: f64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            variables: None,
            time_round_secs: 60.0,
        }
    }
}

impl ReadOptions {
    pub fn variables<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.variables = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn time_round_secs(mut self, secs: f64) -> Self {
        self.time_round_secs = secs;
        self
    }

    fn wants(&self, name: &str) -> bool {
        self.variables
            .as_ref()
            .map_or(true, |v| v.iter().any(|n| n == name))
    }
}

/// Read every variable of a file.
pub fn read_dataset(path: &Path) -> NetCdfResult<Dataset> {
    read_dataset_with(path, &ReadOptions::default())
}

/// Read a file with explicit options.
pub fn read_dataset_with(path: &Path, options: &ReadOptions) -> NetCdfResult<Dataset> {
    silence_hdf5_errors();

    let file = netcdf::open(path).map_err(|e| {
        NetCdfError::InvalidFormat(format!("Failed to open NetCDF {}: {}", path.display(), e))
    })?;

    let mut ds = Dataset::new();
    for (name, value) in global_attributes(&file) {
        ds.set_attr(name, value);
    }

    for var in file.variables() {
        let name = var.name();
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();

        if name == TIME_VAR {
            let values = read_values(&var)?;
            let units = get_string_attr(&var, "units");
            ds.time = decode_time_values(&values, units.as_deref(), options.time_round_secs)?;
            continue;
        }

        let is_coord = dims.len() == 1 && dims[0] == name;
        if !is_coord && !options.wants(&name) {
            continue;
        }

        let values = match read_values(&var) {
            Ok(v) => v,
            Err(e) => {
                // Character and string variables have no numeric view.
                debug!(variable = %name, error = %e, "Skipping non-numeric variable");
                continue;
            }
        };

        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let mut field = Field::from_shape_vec(dims, &shape, values)?;
        for (key, value) in variable_attributes(&var) {
            field.set_attr(key, value);
        }

        if is_coord {
            ds.insert_coord(name, field);
        } else {
            ds.insert_field(name, field);
        }
    }

    if let Some(wanted) = &options.variables {
        for name in wanted {
            if !ds.has_field(name) && ds.coord(name).is_none() && name != TIME_VAR {
                warn!(variable = %name, file = %path.display(), "Requested variable not found");
            }
        }
    }

    debug!(
        file = %path.display(),
        fields = ds.field_names().len(),
        times = ds.time.len(),
        "Read NetCDF dataset"
    );

    Ok(ds)
}

/// Read a variable as unpacked f64 values with fill values replaced by NaN.
fn read_values(var: &netcdf::Variable) -> NetCdfResult<Vec<f64>> {
    let raw: Vec<f64> = var.get_values(..).map_err(|e| {
        NetCdfError::InvalidFormat(format!("Failed to read {}: {}", var.name(), e))
    })?;

    let fill = get_f64_attr(var, "_FillValue");
    let missing = get_f64_attr(var, "missing_value");
    let scale = get_f64_attr(var, "scale_factor").unwrap_or(1.0);
    let offset = get_f64_attr(var, "add_offset").unwrap_or(0.0);

    Ok(raw
        .into_iter()
        .map(|v| {
            if Some(v) == fill || Some(v) == missing {
                f64::NAN
            } else {
                v * scale + offset
            }
        })
        .collect())
}
