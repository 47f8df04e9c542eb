//! Reanalysis input (ERA5 on hybrid model levels).
//!
//! Files are named `{model}-{data_type}-{region}-{year}-{month}-{day}.nc`.
//! Surface fields live in a monthly companion
//! `{model}-2d-{region}-{year}-{month}.nc` next to the 3-D file. Variable
//! names already follow the canonical naming; pressure is derived from the
//! hybrid coefficients as `p = hybm * SP + hyam`.

use std::path::{Path, PathBuf};

use netcdf_parser::{read_dataset_with, ReadOptions};
use synsat_common::{Dataset, Field};
use tracing::{debug, info};

use crate::config::{InputConfig, ModelKind};
use crate::error::{InputError, Result};
use crate::state::{AtmosphericState, LEVEL_DIM};

/// Dimension of the hybrid coefficients on disk.
const HYBRID_DIM: &str = "nhym";

/// Decomposed reanalysis file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EraFileName {
    pub directory: PathBuf,
    pub model: String,
    pub data_type: String,
    pub region: String,
    pub year: String,
    pub month: String,
    pub day: String,
}

impl EraFileName {
    /// Split a path like `era5-3d-europe-2020-09-15.nc`.
    pub fn parse(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| InputError::file_name(&display, "no file name"))?;

        let parts: Vec<&str> = stem.split('-').collect();
        let [model, data_type, region, year, month, day] = parts.as_slice() else {
            return Err(InputError::file_name(
                &display,
                format!(
                    "expected 6 '-'-separated parts (model-type-region-year-month-day), found {}",
                    parts.len()
                ),
            ));
        };

        Ok(Self {
            directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            model: model.to_string(),
            data_type: data_type.to_string(),
            region: region.to_string(),
            year: year.to_string(),
            month: month.to_string(),
            day: day.to_string(),
        })
    }

    /// Path of the monthly 2-D companion.
    pub fn surface_companion(&self) -> PathBuf {
        self.directory.join(format!(
            "{}-2d-{}-{}-{}.nc",
            self.model, self.region, self.year, self.month
        ))
    }
}

/// Reanalysis adapter.
#[derive(Debug, Clone)]
pub struct EraAdapter {
    config: InputConfig,
}

impl EraAdapter {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    /// Open a 3-D file and its companion and build the canonical state.
    pub fn open(&self, path: &Path) -> Result<AtmosphericState> {
        let name = EraFileName::parse(path)?;
        let companion = name.surface_companion();
        let options = ReadOptions::default().time_round_secs(self.config.source.time_round_secs);

        info!(file = %path.display(), companion = %companion.display(), "Opening reanalysis input");

        let ds3d = read_dataset_with(path, &options)?;
        let ds2d = read_dataset_with(&companion, &options)?;

        // Only the 3-D time slots are wanted from the monthly file.
        let ds2d = ds2d
            .sel_time(&ds3d.time)
            .map_err(|_| InputError::TimeMismatch(companion.display().to_string()))?;

        let merged = ds2d.merge(ds3d)?;
        let ds = self.derive_fields(merged, &path.display().to_string())?;

        AtmosphericState::new(ds, ModelKind::Era, path.display().to_string(), self.config.source.qmin)
    }

    /// Add pressure and rename the hybrid dimension.
    pub fn derive_fields(&self, mut ds: Dataset, source_ref: &str) -> Result<Dataset> {
        let sp = ds
            .get_field("SP")
            .ok_or_else(|| InputError::missing_field("SP", source_ref))?;
        let a = ds
            .get_field("hyam")
            .ok_or_else(|| InputError::missing_field("hyam", source_ref))?;
        let b = ds
            .get_field("hybm")
            .ok_or_else(|| InputError::missing_field("hybm", source_ref))?;

        let p = hybrid_pressure(sp, a, b)?
            .with_attr("long_name", "atmospheric pressure")
            .with_attr("units", "Pa");
        debug!(levels = p.len_of(LEVEL_DIM).unwrap_or(0), "Derived hybrid pressure");

        ds.insert_field("p", p);
        ds.rename_dim(HYBRID_DIM, LEVEL_DIM);
        Ok(ds)
    }
}

/// `p[lev, ...] = b[lev] * sp[...] + a[lev]`, with `lev` placed after `time`.
pub fn hybrid_pressure(sp: &Field, a: &Field, b: &Field) -> Result<Field> {
    if a.dims().len() != 1 || a.dims() != b.dims() || a.len() != b.len() {
        return Err(InputError::Shape(format!(
            "hybrid coefficients must be matching vectors, got {:?} and {:?}",
            a.dims(),
            b.dims()
        )));
    }

    let a = a.values();
    let b = b.values();
    let sp_values = sp.values();

    let mut values = Vec::with_capacity(a.len() * sp_values.len());
    for (ak, bk) in a.iter().zip(&b) {
        values.extend(sp_values.iter().map(|s| bk * s + ak));
    }

    let mut dims = vec![LEVEL_DIM.to_string()];
    dims.extend(sp.dims().iter().cloned());
    let mut shape = vec![a.len()];
    shape.extend_from_slice(sp.shape());

    let p = Field::from_shape_vec(dims, &shape, values)?;

    if sp.has_dim("time") {
        let mut order: Vec<String> = vec!["time".to_string(), LEVEL_DIM.to_string()];
        order.extend(sp.dims().iter().filter(|d| d.as_str() != "time").cloned());
        Ok(p.transpose(&order[..])?)
    } else {
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_era_name() {
        let name = EraFileName::parse(Path::new("/data/era5-3d-europe-2020-09-15.nc")).unwrap();
        assert_eq!(name.model, "era5");
        assert_eq!(name.data_type, "3d");
        assert_eq!(name.day, "15");
        assert_eq!(
            name.surface_companion(),
            PathBuf::from("/data/era5-2d-europe-2020-09.nc")
        );
    }

    #[test]
    fn test_parse_rejects_short_names() {
        let err = EraFileName::parse(Path::new("era5-3d-europe.nc")).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_hybrid_pressure() {
        let sp = Field::from_shape_vec(["time", "lat"], &[2, 2], vec![1000.0, 2000.0, 3000.0, 4000.0])
            .unwrap();
        let a = Field::vector("nhym", vec![10.0, 0.0]);
        let b = Field::vector("nhym", vec![0.5, 1.0]);

        let p = hybrid_pressure(&sp, &a, &b).unwrap();
        assert_eq!(p.dims(), &["time", "lev", "lat"]);
        assert_eq!(p.shape(), &[2, 2, 2]);
        // time 0: lev 0 = 0.5*sp + 10, lev 1 = sp
        assert_eq!(p.values(), vec![510.0, 1010.0, 1000.0, 2000.0, 1510.0, 2010.0, 3000.0, 4000.0]);
    }
}
