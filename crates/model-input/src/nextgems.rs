//! nextGEMS storm-resolving model input.
//!
//! Output is indexed by a [`Catalog`] and stored on an unstructured `cell`
//! grid at a chosen zoom level. The adapter optionally reduces the cells
//! (regional box or viewing-zenith threshold) before deriving the surface
//! fields from the lowest model level and a binary cloud mask.

use std::path::Path;

use netcdf_parser::{read_dataset_with, ReadOptions};
use projection::Geostationary;
use synsat_common::time::parse_timestamp;
use synsat_common::Dataset;
use tracing::{debug, info};

use crate::catalog::{Catalog, StoreFormat};
use crate::config::{InputConfig, ModelKind, NextGemsConfig, Selection};
use crate::error::{InputError, Result};
use crate::state::{condensate_mask, promote_coords, remap_fields, AtmosphericState, CELL_DIM, LEVEL_DIM};
use crate::zarr::ZarrGroup;

/// Vertical dimension on full levels.
const FULL_LEVEL_DIM: &str = "level_full";

/// Variables read from the store.
pub const NEXTGEMS_VARIABLES: [&str; 7] = ["pfull", "ta", "hus", "clw", "cli", "qs", "ts"];

const NAME_TABLE: [(&str, &str); 10] = [
    ("pfull", "p"),
    ("ta", "t"),
    ("hus", "q"),
    ("clw", "clwc"),
    ("cli", "ciwc"),
    ("qs", "cswc"),
    ("ts", "SKT"),
    ("t_2m", "T2M"),
    ("pres_sfc", "SP"),
    ("clc", "cc"),
];

/// nextGEMS adapter.
#[derive(Debug, Clone)]
pub struct NextGemsAdapter {
    config: InputConfig,
}

impl NextGemsAdapter {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    fn ngc(&self) -> &NextGemsConfig {
        &self.config.nextgems
    }

    /// Open the configured experiment from a catalog file.
    pub fn open(&self, catalog_path: &Path) -> Result<AtmosphericState> {
        let ngc = self.ngc();
        let catalog = Catalog::open(catalog_path)?;
        let store = catalog.resolve(&ngc.experiment, ngc.zoom, &ngc.time_resolution)?;
        let source_ref = format!(
            "{}#{}(zoom={}, time={})",
            catalog_path.display(),
            ngc.experiment,
            ngc.zoom,
            ngc.time_resolution
        );

        info!(
            catalog = %catalog_path.display(),
            experiment = %ngc.experiment,
            zoom = ngc.zoom,
            store = %store.path.display(),
            "Opening nextGEMS input"
        );

        let time = ngc.time.as_deref().map(parse_timestamp).transpose()?;
        let round = self.config.source.time_round_secs;

        let ds = match store.format {
            StoreFormat::Zarr => {
                let group = ZarrGroup::open(&store.path)?;
                let time_index = match time {
                    Some(t) => Some(
                        group
                            .read_time(round)?
                            .iter()
                            .position(|x| *x == t)
                            .ok_or_else(|| InputError::TimeMismatch(format!("{} at {}", source_ref, t)))?,
                    ),
                    None => None,
                };
                // Cells are chosen from the coordinates before any 3-D variable is read.
                let cells = self.selection_indices(&group.read_lonlat()?)?;
                if let Some(indices) = &cells {
                    self.check_kept(indices)?;
                }
                group.read_dataset(&NEXTGEMS_VARIABLES, time_index, cells.as_deref(), round)?
            }
            StoreFormat::Netcdf => {
                let options = ReadOptions::default()
                    .variables(NEXTGEMS_VARIABLES.iter().chain(&["lon", "lat"]).copied())
                    .time_round_secs(round);
                let ds = promote_coords(read_dataset_with(&store.path, &options)?, &["lon", "lat"]);
                let ds = match time {
                    Some(t) => ds
                        .sel_time(&[t])
                        .map_err(|_| InputError::TimeMismatch(format!("{} at {}", source_ref, t)))?,
                    None => ds,
                };
                self.select_cells(ds)?
            }
        };

        let ds = self.derive_fields(ds, &source_ref)?;
        let mut ds = remap_fields(ds, &NAME_TABLE, &source_ref)?;
        ds.rename_dim(FULL_LEVEL_DIM, LEVEL_DIM);

        AtmosphericState::new(ds, ModelKind::NextGems, source_ref, self.config.source.qmin)
    }

    /// Cell indices kept by the configured selection, `None` for no selection.
    pub fn selection_indices(&self, ds: &Dataset) -> Result<Option<Vec<usize>>> {
        let ngc = self.ngc();
        let indices = match ngc.selection {
            Selection::None => return Ok(None),
            Selection::Regional => {
                let extent = ngc.extent.ok_or_else(|| {
                    InputError::MissingConfig("nextgems.extent is required for regional selection".to_string())
                })?;
                let (lon, lat) = cell_lonlat(ds)?;
                extent.select_indices(&lon, &lat)
            }
            Selection::Zenith => {
                let (lon, lat) = cell_lonlat(ds)?;
                Geostationary::new(ngc.sub_lon).zenith_mask_indices(&lon, &lat, ngc.max_zenith)
            }
        };

        Ok(Some(indices))
    }

    /// Reduce the cell dimension to the configured selection.
    pub fn select_cells(&self, ds: Dataset) -> Result<Dataset> {
        let Some(indices) = self.selection_indices(&ds)? else {
            return Ok(ds);
        };

        self.check_kept(&indices)?;

        debug!(
            selection = ?self.ngc().selection,
            kept = indices.len(),
            total = ds.dim_len(CELL_DIM).unwrap_or(0),
            "Selected cells"
        );
        Ok(ds.isel(CELL_DIM, &indices)?)
    }

    fn check_kept(&self, indices: &[usize]) -> Result<()> {
        if indices.is_empty() {
            return Err(InputError::Shape(format!(
                "{:?} selection keeps no cells",
                self.ngc().selection
            )));
        }
        Ok(())
    }

    /// Surface fields from the lowest full level and the cloud mask.
    pub fn derive_fields(&self, mut ds: Dataset, source_ref: &str) -> Result<Dataset> {
        let ta = ds
            .get_field("ta")
            .ok_or_else(|| InputError::missing_field("ta", source_ref))?;
        let t_2m = ta.last_along(FULL_LEVEL_DIM)?;

        let pfull = ds
            .get_field("pfull")
            .ok_or_else(|| InputError::missing_field("pfull", source_ref))?;
        let pres_sfc = pfull.last_along(FULL_LEVEL_DIM)?;

        let parts = ["clw", "cli", "qs"]
            .iter()
            .map(|n| ds.get_field(n).ok_or_else(|| InputError::missing_field(*n, source_ref)))
            .collect::<Result<Vec<_>>>()?;
        let clc = condensate_mask(&parts, self.ngc().condensate_threshold)?.with_attr("units", "1");

        ds.insert_field("t_2m", t_2m);
        ds.insert_field("pres_sfc", pres_sfc);
        ds.insert_field("clc", clc);
        Ok(ds)
    }
}

fn cell_lonlat(ds: &Dataset) -> Result<(Vec<f64>, Vec<f64>)> {
    let lon = ds
        .coord("lon")
        .ok_or_else(|| InputError::missing_field("lon", "nextGEMS store"))?;
    let lat = ds
        .coord("lat")
        .ok_or_else(|| InputError::missing_field("lat", "nextGEMS store"))?;
    Ok((lon.values(), lat.values()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use synsat_common::{Extent, Field};

    fn cells() -> Dataset {
        let mut ds = Dataset::new();
        ds.insert_coord("lon", Field::vector("cell", vec![0.0, 10.0, 170.0, 60.0, -8.0]));
        ds.insert_coord("lat", Field::vector("cell", vec![0.0, 50.0, 0.0, 60.0, 30.0]));
        ds.insert_field("ts", Field::vector("cell", vec![300.0, 280.0, 299.0, 270.0, 290.0]));
        ds
    }

    fn adapter(selection: Selection, extent: Option<Extent>) -> NextGemsAdapter {
        let mut config = InputConfig::default();
        config.nextgems.selection = selection;
        config.nextgems.extent = extent;
        NextGemsAdapter::new(config)
    }

    #[test]
    fn test_regional_selection_is_inclusive() {
        let a = adapter(Selection::Regional, Some(Extent::new(-8.0, 45.0, 30.0, 55.0)));
        let ds = a.select_cells(cells()).unwrap();
        assert_eq!(ds.coord("lon").unwrap().values(), vec![10.0, -8.0]);
        assert_eq!(ds.field("ts").unwrap().values(), vec![280.0, 290.0]);
    }

    #[test]
    fn test_zenith_selection() {
        let a = adapter(Selection::Zenith, None);
        let ds = a.select_cells(cells()).unwrap();
        // 170E is behind the horizon, 60N/60E is beyond 80 deg zenith
        assert_eq!(ds.coord("lon").unwrap().values(), vec![0.0, 10.0, -8.0]);
    }

    #[test]
    fn test_no_selection_keeps_everything() {
        let a = adapter(Selection::None, None);
        assert_eq!(a.select_cells(cells()).unwrap().dim_len("cell"), Some(5));
    }

    #[test]
    fn test_empty_selection_is_an_error() {
        let a = adapter(Selection::Regional, Some(Extent::new(100.0, 110.0, -10.0, -5.0)));
        assert!(matches!(a.select_cells(cells()), Err(InputError::Shape(_))));
    }

    #[test]
    fn test_derive_surface_and_cloud_mask() {
        let mut ds = Dataset::new();
        let profile = |v: Vec<f64>| Field::from_shape_vec(["cell", "level_full"], &[1, 3], v).unwrap();
        ds.insert_field("ta", profile(vec![220.0, 260.0, 290.0]));
        ds.insert_field("pfull", profile(vec![10000.0, 50000.0, 100000.0]));
        ds.insert_field("clw", profile(vec![0.0, 1e-6, 0.0]));
        ds.insert_field("cli", profile(vec![0.0, 0.0, 0.0]));
        ds.insert_field("qs", profile(vec![1e-8, 0.0, 0.0]));

        let a = adapter(Selection::None, None);
        let ds = a.derive_fields(ds, "mem").unwrap();
        assert_eq!(ds.field("t_2m").unwrap().values(), vec![290.0]);
        assert_eq!(ds.field("pres_sfc").unwrap().values(), vec![100000.0]);
        assert_eq!(ds.field("clc").unwrap().values(), vec![1.0, 1.0, 0.0]);
    }
}
