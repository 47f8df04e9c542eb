//! Canonical atmospheric state.
//!
//! Whatever the source, adapters hand over a [`Dataset`] with the fields in
//! [`REQUIRED_FIELDS`] under their canonical names, the vertical dimension
//! named [`LEVEL_DIM`] and `lon`/`lat` coordinates. [`AtmosphericState::new`]
//! checks that contract, rejects missing (NaN) values, floors `q` and clamps
//! `cc`; after that the state is read-only.

use synsat_common::{Dataset, Field};
use tracing::debug;

use crate::config::ModelKind;
use crate::error::{InputError, Result};

/// Vertical dimension name shared by all profile fields.
pub const LEVEL_DIM: &str = "lev";

/// Unstructured horizontal dimension.
pub const CELL_DIM: &str = "cell";

/// Fields carried on model levels.
pub const LEVEL_FIELDS: [&str; 7] = ["p", "t", "q", "clwc", "ciwc", "cswc", "cc"];

/// Single-level fields.
pub const SURFACE_FIELDS: [&str; 3] = ["SKT", "SP", "T2M"];

/// Every field a source must provide.
pub const REQUIRED_FIELDS: [&str; 10] =
    ["p", "t", "q", "clwc", "ciwc", "cswc", "cc", "SKT", "SP", "T2M"];

/// Horizontal layout of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalGrid {
    /// Separate `lon` and `lat` dimensions.
    Regular,
    /// One `cell` dimension with per-cell `lon(cell)` / `lat(cell)`.
    Unstructured,
}

/// Validated model state ready for profile building.
#[derive(Debug, Clone)]
pub struct AtmosphericState {
    dataset: Dataset,
    grid: HorizontalGrid,
    source: ModelKind,
    source_ref: String,
}

impl AtmosphericState {
    /// Validate a renamed dataset, floor `q` at `qmin` and clamp `cc` into [0, 1].
    pub fn new(
        mut dataset: Dataset,
        source: ModelKind,
        source_ref: impl Into<String>,
        qmin: f64,
    ) -> Result<Self> {
        let source_ref = source_ref.into();

        for name in REQUIRED_FIELDS {
            if !dataset.has_field(name) {
                return Err(InputError::missing_field(name, &source_ref));
            }
        }

        let (lon, lat) = match (dataset.coord("lon"), dataset.coord("lat")) {
            (Some(lon), Some(lat)) => (lon, lat),
            (None, _) => return Err(InputError::missing_field("lon", &source_ref)),
            (_, None) => return Err(InputError::missing_field("lat", &source_ref)),
        };

        let grid = if lon.dims() == [CELL_DIM] && lat.dims() == [CELL_DIM] {
            HorizontalGrid::Unstructured
        } else if lon.dims() == ["lon"] && lat.dims() == ["lat"] {
            HorizontalGrid::Regular
        } else {
            return Err(InputError::Shape(format!(
                "lon {:?} / lat {:?} are neither regular nor cell coordinates",
                lon.dims(),
                lat.dims()
            )));
        };

        let mut nlev = None;
        for name in LEVEL_FIELDS {
            let field = dataset.field(name)?;
            let len = field.len_of(LEVEL_DIM).map_err(|_| {
                InputError::Shape(format!("'{}' has no '{}' dimension: {:?}", name, LEVEL_DIM, field.dims()))
            })?;
            match nlev {
                None => nlev = Some(len),
                Some(n) if n != len => {
                    return Err(InputError::Shape(format!(
                        "'{}' has {} levels, expected {}",
                        name, len, n
                    )));
                }
                Some(_) => {}
            }
        }

        for name in SURFACE_FIELDS {
            if dataset.field(name)?.has_dim(LEVEL_DIM) {
                return Err(InputError::Shape(format!("surface field '{}' has levels", name)));
            }
        }

        // Clipping passes NaN through, so fill values are rejected here.
        for name in REQUIRED_FIELDS {
            let count = dataset.field(name)?.count_non_finite();
            if count > 0 {
                return Err(InputError::NonFinite {
                    field: name.to_string(),
                    count,
                    source_ref: source_ref.clone(),
                });
            }
        }

        let q = dataset.field("q")?.clip_min(qmin);
        dataset.insert_field("q", q);
        let cc = dataset.field("cc")?.clip(0.0, 1.0);
        dataset.insert_field("cc", cc);

        debug!(
            source = %source,
            source_ref = %source_ref,
            levels = nlev.unwrap_or(0),
            times = dataset.time.len(),
            "Built atmospheric state"
        );

        Ok(Self {
            dataset,
            grid,
            source,
            source_ref,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }

    pub fn field(&self, name: &str) -> Result<&Field> {
        self.dataset
            .get_field(name)
            .ok_or_else(|| InputError::missing_field(name, &self.source_ref))
    }

    pub fn grid(&self) -> HorizontalGrid {
        self.grid
    }

    pub fn source(&self) -> ModelKind {
        self.source
    }

    /// File or catalog reference the state was built from.
    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    pub fn n_levels(&self) -> usize {
        self.dataset.dim_len(LEVEL_DIM).unwrap_or(0)
    }

    /// Profile axis used when the configuration doesn't name one.
    pub fn default_profile_dims(&self) -> Vec<String> {
        let dims: &[&str] = match self.grid {
            HorizontalGrid::Regular => &["time", "lon", "lat"],
            HorizontalGrid::Unstructured => &["time", CELL_DIM],
        };
        dims.iter().map(|d| d.to_string()).collect()
    }
}

/// Copy `from` to `to` for each pair of a rename table, dropping the rest.
///
/// Coordinates and the time axis carry over unchanged.
pub(crate) fn remap_fields(ds: Dataset, table: &[(&str, &str)], source_ref: &str) -> Result<Dataset> {
    let mut out = Dataset::new();
    out.time = ds.time.clone();
    for (name, c) in ds.coords() {
        out.insert_coord(name.clone(), c.clone());
    }
    for (name, v) in ds.attrs() {
        out.set_attr(name.clone(), v.clone());
    }

    for (from, to) in table {
        let field = ds
            .get_field(from)
            .ok_or_else(|| InputError::missing_field(*from, source_ref))?;
        out.insert_field(*to, field.clone());
    }

    Ok(out)
}

/// Move fields such as `lon(cell)` into the coordinates.
pub(crate) fn promote_coords(mut ds: Dataset, names: &[&str]) -> Dataset {
    for name in names {
        if let Some(field) = ds.remove_field(name) {
            ds.insert_coord(*name, field);
        }
    }
    ds
}

/// Binary cloud mask: 1 where the summed condensate reaches `threshold`.
pub(crate) fn condensate_mask(parts: &[&Field], threshold: f64) -> Result<Field> {
    let (first, rest) = parts
        .split_first()
        .ok_or_else(|| InputError::Shape("no condensate fields given".to_string()))?;

    let mut total = (*first).clone();
    for part in rest {
        total = total.zip_with(part, |a, b| a + b)?;
    }

    Ok(total.map(|v| if v >= threshold { 1.0 } else { 0.0 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::generators::synthetic_regular_dataset;

    #[test]
    fn test_state_clips_q_and_cc() {
        let mut ds = synthetic_regular_dataset(1, 2, 2, 3);
        let q = ds.field("q").unwrap().map(|_| -1.0);
        ds.insert_field("q", q);
        let cc = ds.field("cc").unwrap().map(|_| 1.7);
        ds.insert_field("cc", cc);

        let state = AtmosphericState::new(ds, ModelKind::Era, "mem", 1.1e-9).unwrap();
        assert!(state.field("q").unwrap().values().iter().all(|&v| v == 1.1e-9));
        assert!(state.field("cc").unwrap().values().iter().all(|&v| v == 1.0));
        assert_eq!(state.grid(), HorizontalGrid::Regular);
        assert_eq!(state.n_levels(), 3);
    }

    #[test]
    fn test_missing_field_is_reported() {
        let mut ds = synthetic_regular_dataset(1, 2, 2, 3);
        ds.remove_field("T2M");
        let err = AtmosphericState::new(ds, ModelKind::Era, "era5.nc", 1.1e-9).unwrap_err();
        assert!(matches!(err, InputError::MissingField { ref field, .. } if field == "T2M"));
    }

    #[test]
    fn test_fill_values_are_rejected() {
        let mut ds = synthetic_regular_dataset(1, 2, 2, 3);
        let mut with_gap = ds.field("q").unwrap().values();
        with_gap[4] = f64::NAN;
        let q = Field::from_shape_vec(
            ds.field("q").unwrap().dims().to_vec(),
            ds.field("q").unwrap().shape(),
            with_gap,
        )
        .unwrap();
        ds.insert_field("q", q);

        let err = AtmosphericState::new(ds, ModelKind::Era, "era5.nc", 1.1e-9).unwrap_err();
        assert!(matches!(err, InputError::NonFinite { ref field, count: 1, .. } if field == "q"));
    }

    #[test]
    fn test_missing_coordinates_are_reported() {
        let mut ds = synthetic_regular_dataset(1, 2, 2, 3);
        ds.remove_coord("lat");
        assert!(AtmosphericState::new(ds, ModelKind::Era, "mem", 1.1e-9).is_err());
    }

    #[test]
    fn test_level_mismatch_is_rejected() {
        let mut ds = synthetic_regular_dataset(1, 2, 2, 3);
        let p = ds.field("p").unwrap().select(LEVEL_DIM, &[0, 1]).unwrap();
        ds.insert_field("p", p);
        assert!(matches!(
            AtmosphericState::new(ds, ModelKind::Era, "mem", 1.1e-9),
            Err(InputError::Shape(_))
        ));
    }

    #[test]
    fn test_condensate_mask() {
        let a = Field::vector("lev", vec![0.0, 5e-10, 1e-6]);
        let b = Field::vector("lev", vec![0.0, 5e-10, 0.0]);
        let mask = condensate_mask(&[&a, &b], 1e-9).unwrap();
        assert_eq!(mask.values(), vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_default_profile_dims() {
        let ds = synthetic_regular_dataset(1, 2, 2, 3);
        let state = AtmosphericState::new(ds, ModelKind::Era, "mem", 1.1e-9).unwrap();
        assert_eq!(state.default_profile_dims(), vec!["time", "lon", "lat"]);
    }
}
