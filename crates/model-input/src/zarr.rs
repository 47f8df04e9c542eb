//! Read variables from a Zarr group on the local filesystem.
//!
//! Each variable is an array directly below the group root. Dimension names
//! come from the xarray `_ARRAY_DIMENSIONS` attribute; a `time` array with CF
//! `units` provides the time axis. Reads can be restricted to one time slot
//! and to the cell range covering a selection.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use synsat_common::time::decode_time_values;
use synsat_common::{Dataset, Field};
use tracing::debug;
use zarrs::array::{Array, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::error::{InputError, Result};
use crate::state::CELL_DIM;

/// xarray's dimension-name attribute.
pub const DIMENSIONS_ATTR: &str = "_ARRAY_DIMENSIONS";

/// Reader over one Zarr group.
pub struct ZarrGroup {
    store: Arc<FilesystemStore>,
    location: String,
}

impl ZarrGroup {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(InputError::Zarr(format!("{} is not a Zarr store", path.display())));
        }
        let store = FilesystemStore::new(path)
            .map_err(|e| InputError::Zarr(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            store: Arc::new(store),
            location: path.display().to_string(),
        })
    }

    fn array(&self, name: &str) -> Result<Array<FilesystemStore>> {
        Array::open(self.store.clone(), &format!("/{}", name))
            .map_err(|e| InputError::Zarr(format!("{}/{}: {}", self.location, name, e)))
    }

    /// Decoded time axis.
    pub fn read_time(&self, round_to_secs: f64) -> Result<Vec<DateTime<Utc>>> {
        let array = self.array("time")?;
        let units = array
            .attributes()
            .get("units")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let dims = array_dimensions(&array, "time")?;
        let values = self.read_values(&array, "time", &dims, &Window::default())?.1;
        Ok(decode_time_values(&values, units.as_deref(), round_to_secs)?)
    }

    /// Read one variable, optionally restricted to a single time index.
    pub fn read_field(&self, name: &str, time_index: Option<usize>) -> Result<Field> {
        let window = Window {
            time_index,
            ..Window::default()
        };
        self.read_window(name, &window)
    }

    /// `lon`/`lat` coordinates only.
    pub fn read_lonlat(&self) -> Result<Dataset> {
        let mut ds = Dataset::new();
        for coord in ["lon", "lat"] {
            ds.insert_coord(coord, self.read_field(coord, None)?);
        }
        Ok(ds)
    }

    /// Read several variables plus `lon`/`lat` coordinates into a dataset.
    ///
    /// With `time_index` set, only that time slot is read and the dataset's
    /// time axis holds the single matching timestamp. With `cells` set, only
    /// the cell range covering those indices is read from the store and the
    /// result holds exactly those cells in the given order.
    pub fn read_dataset(
        &self,
        variables: &[&str],
        time_index: Option<usize>,
        cells: Option<&[usize]>,
        round_to_secs: f64,
    ) -> Result<Dataset> {
        let mut ds = Dataset::new();
        let times = self.read_time(round_to_secs)?;
        ds.time = match time_index {
            Some(i) => vec![*times.get(i).ok_or_else(|| {
                InputError::Shape(format!("time index {} out of range ({} times)", i, times.len()))
            })?],
            None => times,
        };

        let cover = match cells {
            Some(indices) => Some(covering_range(indices)?),
            None => None,
        };
        let window = Window {
            time_index,
            cells: cover.clone(),
        };

        for coord in ["lon", "lat"] {
            ds.insert_coord(coord, self.read_window(coord, &window)?);
        }
        for name in variables {
            ds.insert_field(*name, self.read_window(name, &window)?);
        }

        debug!(
            store = %self.location,
            variables = variables.len(),
            times = ds.time.len(),
            cells = ds.dim_len(CELL_DIM).unwrap_or(0),
            "Read Zarr group"
        );

        match (cells, cover) {
            (Some(indices), Some(cover)) => {
                let local: Vec<usize> = indices.iter().map(|&i| i - cover.start as usize).collect();
                Ok(ds.isel(CELL_DIM, &local)?)
            }
            _ => Ok(ds),
        }
    }

    fn read_window(&self, name: &str, window: &Window) -> Result<Field> {
        let array = self.array(name)?;
        let dims = array_dimensions(&array, name)?;
        let (shape, values) = self.read_values(&array, name, &dims, window)?;
        let mut field = Field::from_shape_vec(dims, &shape, values)?;

        for (key, value) in array.attributes() {
            if key == DIMENSIONS_ATTR {
                continue;
            }
            if let Some(s) = value.as_str() {
                field.set_attr(key.clone(), s);
            } else if value.is_number() {
                field.set_attr(key.clone(), value.to_string());
            }
        }

        Ok(field)
    }

    fn read_values(
        &self,
        array: &Array<FilesystemStore>,
        name: &str,
        dims: &[String],
        window: &Window,
    ) -> Result<(Vec<usize>, Vec<f64>)> {
        let full: Vec<u64> = array.shape().to_vec();
        let mut start = vec![0u64; full.len()];
        let mut extent = full.clone();

        for (ax, dim) in dims.iter().enumerate() {
            if dim == "time" {
                if let Some(t) = window.time_index {
                    start[ax] = t as u64;
                    extent[ax] = 1;
                }
            } else if dim == CELL_DIM {
                if let Some(cells) = &window.cells {
                    if cells.end > full[ax] {
                        return Err(InputError::Shape(format!(
                            "{}: cell {} out of range ({} cells)",
                            name,
                            cells.end - 1,
                            full[ax]
                        )));
                    }
                    start[ax] = cells.start;
                    extent[ax] = cells.end - cells.start;
                }
            }
        }

        let subset = ArraySubset::new_with_start_shape(start, extent.clone())
            .map_err(|e| InputError::Zarr(format!("{}: {}", name, e)))?;
        let read_err = |e: zarrs::array::ArrayError| InputError::Zarr(format!("{}: {}", name, e));

        let values: Vec<f64> = match array.data_type() {
            DataType::Float32 => array
                .retrieve_array_subset_elements::<f32>(&subset)
                .map_err(read_err)?
                .into_iter()
                .map(f64::from)
                .collect(),
            DataType::Float64 => array
                .retrieve_array_subset_elements::<f64>(&subset)
                .map_err(read_err)?,
            DataType::Int64 => array
                .retrieve_array_subset_elements::<i64>(&subset)
                .map_err(read_err)?
                .into_iter()
                .map(|v| v as f64)
                .collect(),
            DataType::Int32 => array
                .retrieve_array_subset_elements::<i32>(&subset)
                .map_err(read_err)?
                .into_iter()
                .map(f64::from)
                .collect(),
            other => {
                return Err(InputError::Zarr(format!(
                    "{}: unsupported data type {:?}",
                    name, other
                )))
            }
        };

        let shape = extent.iter().map(|&n| n as usize).collect();
        Ok((shape, values))
    }
}

/// Part of an array to retrieve.
#[derive(Debug, Clone, Default)]
struct Window {
    time_index: Option<usize>,
    cells: Option<Range<u64>>,
}

/// Smallest contiguous cell range holding every index.
fn covering_range(indices: &[usize]) -> Result<Range<u64>> {
    match (indices.iter().min(), indices.iter().max()) {
        (Some(&lo), Some(&hi)) => Ok(lo as u64..hi as u64 + 1),
        _ => Err(InputError::Shape("cell selection is empty".to_string())),
    }
}

fn array_dimensions(array: &Array<FilesystemStore>, name: &str) -> Result<Vec<String>> {
    let dims = array
        .attributes()
        .get(DIMENSIONS_ATTR)
        .and_then(|v| v.as_array())
        .ok_or_else(|| InputError::Zarr(format!("{} has no {} attribute", name, DIMENSIONS_ATTR)))?;

    let dims: Vec<String> = dims
        .iter()
        .filter_map(|d| d.as_str().map(str::to_string))
        .collect();

    if dims.len() != array.shape().len() {
        return Err(InputError::Zarr(format!(
            "{}: {} dimension names for rank {}",
            name,
            dims.len(),
            array.shape().len()
        )));
    }
    Ok(dims)
}
