//! Flattening a canonical state into one profile axis.
//!
//! The caller names the profile dimensions, e.g. `["time", "lon", "lat"]`.
//! Profiles are enumerated in row-major order over those dimensions, so
//! profile `i` of a `(time, lon, lat)` stack with shape `(nt, nx, ny)` is
//! `(i / (nx*ny), (i / ny) % nx, i % ny)`. Level fields are laid out as
//! `[profile][level]`, everything else as `[profile]`.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{DateTime, Utc};
use model_input::state::{LEVEL_FIELDS, SURFACE_FIELDS};
use model_input::{AtmosphericState, LEVEL_DIM};
use synsat_common::{Dataset, Field};
use tracing::debug;

use crate::config::DimSlice;
use crate::error::{Result, SynsatError};

/// A state flattened along its profile dimensions.
#[derive(Debug, Clone)]
pub struct ProfileStack {
    dims: Vec<String>,
    shape: Vec<usize>,
    nlevels: usize,
    level: BTreeMap<String, Vec<f64>>,
    surface: BTreeMap<String, Vec<f64>>,
    lon: Vec<f64>,
    lat: Vec<f64>,
    times: Vec<DateTime<Utc>>,
    labels: Dataset,
}

impl ProfileStack {
    /// Pre-select with `isel`, then stack `state` along `dims`.
    pub fn new(state: &AtmosphericState, dims: &[String], isel: &BTreeMap<String, DimSlice>) -> Result<Self> {
        if dims.is_empty() {
            return Err(SynsatError::config("no profile dimensions given"));
        }
        if dims.iter().any(|d| d == LEVEL_DIM) {
            return Err(SynsatError::config(format!("'{}' cannot be a profile dimension", LEVEL_DIM)));
        }

        let mut ds = state.dataset().clone();
        for (dim, slice) in isel {
            let len = ds
                .dim_len(dim)
                .ok_or_else(|| SynsatError::config(format!("pre-selection on unknown dimension '{}'", dim)))?;
            let indices = slice.indices(len);
            if indices.is_empty() {
                return Err(SynsatError::EmptySelection(format!("{:?} keeps nothing of '{}'", slice, dim)));
            }
            ds = ds.isel(dim, &indices)?;
        }

        let shape = dims
            .iter()
            .map(|d| {
                ds.dim_len(d)
                    .ok_or_else(|| SynsatError::shape(format!("profile dimension '{}' not in the state", d)))
            })
            .collect::<Result<Vec<_>>>()?;
        let nprofiles: usize = shape.iter().product();
        let nlevels = ds.dim_len(LEVEL_DIM).unwrap_or(0);

        let mut level = BTreeMap::new();
        for name in LEVEL_FIELDS {
            level.insert(name.to_string(), gather(ds.field(name)?, name, dims, &shape, Some(LEVEL_DIM))?);
        }
        let mut surface = BTreeMap::new();
        for name in SURFACE_FIELDS {
            surface.insert(name.to_string(), gather(ds.field(name)?, name, dims, &shape, None)?);
        }

        let coord = |name: &str| {
            ds.coord(name)
                .ok_or_else(|| SynsatError::shape(format!("no '{}' coordinate", name)))
        };
        let lon = gather(coord("lon")?, "lon", dims, &shape, None)?;
        let lat = gather(coord("lat")?, "lat", dims, &shape, None)?;

        let times = profile_times(&ds, dims, &shape)?;
        let labels = label_template(&ds, dims);

        debug!(dims = ?dims, shape = ?shape, nprofiles, nlevels, "Stacked profiles");

        Ok(Self {
            dims: dims.to_vec(),
            shape,
            nlevels,
            level,
            surface,
            lon,
            lat,
            times,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.lon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lon.is_empty()
    }

    pub fn nlevels(&self) -> usize {
        self.nlevels
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// `[profile][level]` values of a level field for a range of profiles.
    pub fn level(&self, name: &str, range: Range<usize>) -> Result<&[f64]> {
        let values = self
            .level
            .get(name)
            .ok_or_else(|| SynsatError::shape(format!("'{}' is not a level field", name)))?;
        values
            .get(range.start * self.nlevels..range.end * self.nlevels)
            .ok_or_else(|| SynsatError::shape(format!("profiles {:?} out of range", range)))
    }

    /// Per-profile values of a surface field for a range of profiles.
    pub fn surface(&self, name: &str, range: Range<usize>) -> Result<&[f64]> {
        let values = self
            .surface
            .get(name)
            .ok_or_else(|| SynsatError::shape(format!("'{}' is not a surface field", name)))?;
        values
            .get(range.clone())
            .ok_or_else(|| SynsatError::shape(format!("profiles {:?} out of range", range)))
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    /// Timestamp of every profile.
    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    /// Time axis and coordinates of the stacked dimensions, without fields.
    pub fn labels(&self) -> &Dataset {
        &self.labels
    }

    /// Restore the profile dimensions for one value per profile.
    pub fn unflatten(&self, values: Vec<f64>) -> Result<Field> {
        if values.len() != self.len() {
            return Err(SynsatError::shape(format!(
                "{} values for {} profiles",
                values.len(),
                self.len()
            )));
        }
        Ok(Field::from_shape_vec(self.dims.iter().cloned(), &self.shape, values)?)
    }
}

/// Values of `field` in profile order, with an optional inner dimension kept
/// contiguous per profile.
///
/// Every other dimension of the field must be a profile dimension; fields
/// lacking some profile dimensions are broadcast along them.
fn gather(field: &Field, name: &str, dims: &[String], shape: &[usize], inner: Option<&str>) -> Result<Vec<f64>> {
    let fshape = field.shape();
    let mut profile_axis = Vec::with_capacity(fshape.len());
    let mut inner_axis = None;

    for (ax, d) in field.dims().iter().enumerate() {
        if Some(d.as_str()) == inner {
            inner_axis = Some(ax);
            profile_axis.push(None);
            continue;
        }
        let p = dims.iter().position(|x| x == d).ok_or_else(|| {
            SynsatError::shape(format!(
                "'{}' has dimension '{}' outside the profile dimensions {:?}",
                name, d, dims
            ))
        })?;
        if shape[p] != fshape[ax] {
            return Err(SynsatError::shape(format!(
                "'{}' has {} entries along '{}', expected {}",
                name, fshape[ax], d, shape[p]
            )));
        }
        profile_axis.push(Some(p));
    }

    if inner.is_some() && inner_axis.is_none() {
        return Err(SynsatError::shape(format!("'{}' has no '{}' dimension", name, inner.unwrap_or_default())));
    }

    let mut strides = vec![1usize; fshape.len()];
    for ax in (0..fshape.len().saturating_sub(1)).rev() {
        strides[ax] = strides[ax + 1] * fshape[ax + 1];
    }
    let (ninner, inner_stride) = match inner_axis {
        Some(ax) => (fshape[ax], strides[ax]),
        None => (1, 0),
    };

    let values = field.values();
    let nprofiles: usize = shape.iter().product();
    let mut out = Vec::with_capacity(nprofiles * ninner);
    let mut idx = vec![0usize; shape.len()];

    for _ in 0..nprofiles {
        let base: usize = profile_axis
            .iter()
            .zip(&strides)
            .filter_map(|(p, s)| p.map(|p| idx[p] * s))
            .sum();
        out.extend((0..ninner).map(|k| values[base + k * inner_stride]));

        for axis in (0..idx.len()).rev() {
            idx[axis] += 1;
            if idx[axis] < shape[axis] {
                break;
            }
            idx[axis] = 0;
        }
    }

    Ok(out)
}

fn profile_times(ds: &Dataset, dims: &[String], shape: &[usize]) -> Result<Vec<DateTime<Utc>>> {
    let nprofiles: usize = shape.iter().product();

    match dims.iter().position(|d| d == "time") {
        Some(p) => {
            let inner: usize = shape[p + 1..].iter().product();
            Ok((0..nprofiles).map(|i| ds.time[(i / inner) % shape[p]]).collect())
        }
        None => match ds.time.as_slice() {
            [t] => Ok(vec![*t; nprofiles]),
            [] => Err(SynsatError::shape("state has no time axis")),
            _ => Err(SynsatError::shape(format!(
                "{} time steps but 'time' is not a profile dimension",
                ds.time.len()
            ))),
        },
    }
}

fn label_template(ds: &Dataset, dims: &[String]) -> Dataset {
    let mut labels = Dataset::new();
    if dims.iter().any(|d| d == "time") {
        labels.time = ds.time.clone();
    }
    for (name, coord) in ds.coords() {
        if coord.dims().iter().all(|d| dims.contains(d)) {
            labels.insert_coord(name.clone(), coord.clone());
        }
    }
    labels
}
