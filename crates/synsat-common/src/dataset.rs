//! Named-dimension arrays.
//!
//! A [`Field`] is an n-dimensional `f64` array whose axes carry names
//! (`"time"`, `"lon"`, `"lev"`, ...). Operations address axes by name, so the
//! on-disk dimension order of a source file never leaks into downstream code.
//! A [`Dataset`] groups fields, coordinate fields and a decoded time axis.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ndarray::{ArrayD, Axis, IxDyn, Zip};

use crate::error::{CommonError, CommonResult};

/// An array with named dimensions and string attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    dims: Vec<String>,
    data: ArrayD<f64>,
    attrs: BTreeMap<String, String>,
}

impl Field {
    /// Wrap an array, checking that every axis has exactly one unique name.
    pub fn new<S: Into<String>>(
        dims: impl IntoIterator<Item = S>,
        data: ArrayD<f64>,
    ) -> CommonResult<Self> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();

        if dims.len() != data.ndim() {
            return Err(CommonError::Shape(format!(
                "{} dimension names for a {}-dimensional array",
                dims.len(),
                data.ndim()
            )));
        }
        for (i, d) in dims.iter().enumerate() {
            if dims[..i].contains(d) {
                return Err(CommonError::Shape(format!("duplicate dimension '{}'", d)));
            }
        }

        Ok(Self {
            dims,
            data,
            attrs: BTreeMap::new(),
        })
    }

    /// Build a field from row-major values.
    pub fn from_shape_vec<S: Into<String>>(
        dims: impl IntoIterator<Item = S>,
        shape: &[usize],
        values: Vec<f64>,
    ) -> CommonResult<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|e| CommonError::Shape(e.to_string()))?;
        Self::new(dims, data)
    }

    /// A one-dimensional field.
    pub fn vector(dim: &str, values: Vec<f64>) -> Self {
        let n = values.len();
        Self {
            dims: vec![dim.to_string()],
            data: ArrayD::from_shape_vec(IxDyn(&[n]), values).unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0]))),
            attrs: BTreeMap::new(),
        }
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|d| d == dim)
    }

    /// Axis position of a named dimension.
    pub fn axis(&self, dim: &str) -> CommonResult<usize> {
        self.dims
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| CommonError::MissingDimension(format!("{} in {:?}", dim, self.dims)))
    }

    pub fn len_of(&self, dim: &str) -> CommonResult<usize> {
        Ok(self.data.len_of(Axis(self.axis(dim)?)))
    }

    pub fn rename_dim(&mut self, from: &str, to: &str) {
        for d in self.dims.iter_mut().filter(|d| d.as_str() == from) {
            *d = to.to_string();
        }
    }

    /// Values in row-major (logical) order.
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Positional selection along one dimension; the dimension is kept.
    pub fn select(&self, dim: &str, indices: &[usize]) -> CommonResult<Field> {
        let ax = self.axis(dim)?;
        let len = self.data.len_of(Axis(ax));
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(CommonError::Shape(format!(
                "index {} out of range for dimension '{}' of length {}",
                bad, dim, len
            )));
        }

        Ok(Self {
            dims: self.dims.clone(),
            data: self.data.select(Axis(ax), indices),
            attrs: self.attrs.clone(),
        })
    }

    /// Take a single index along a dimension, dropping that dimension.
    pub fn index_dim(&self, dim: &str, index: usize) -> CommonResult<Field> {
        let ax = self.axis(dim)?;
        let len = self.data.len_of(Axis(ax));
        if index >= len {
            return Err(CommonError::Shape(format!(
                "index {} out of range for dimension '{}' of length {}",
                index, dim, len
            )));
        }

        let mut dims = self.dims.clone();
        dims.remove(ax);
        Ok(Self {
            dims,
            data: self.data.index_axis(Axis(ax), index).to_owned(),
            attrs: self.attrs.clone(),
        })
    }

    /// Take the last index along a dimension.
    pub fn last_along(&self, dim: &str) -> CommonResult<Field> {
        let len = self.len_of(dim)?;
        if len == 0 {
            return Err(CommonError::Shape(format!("dimension '{}' is empty", dim)));
        }
        self.index_dim(dim, len - 1)
    }

    /// Drop a length-one dimension.
    pub fn squeeze(&self, dim: &str) -> CommonResult<Field> {
        let len = self.len_of(dim)?;
        if len != 1 {
            return Err(CommonError::Shape(format!(
                "cannot squeeze dimension '{}' of length {}",
                dim, len
            )));
        }
        self.index_dim(dim, 0)
    }

    /// Reorder axes to the given dimension order (all dimensions must be named).
    pub fn transpose<S: AsRef<str>>(&self, order: &[S]) -> CommonResult<Field> {
        if order.len() != self.dims.len() {
            return Err(CommonError::Shape(format!(
                "transpose order {:?} does not cover dimensions {:?}",
                order.iter().map(|s| s.as_ref()).collect::<Vec<_>>(),
                self.dims
            )));
        }

        let perm = order
            .iter()
            .map(|d| self.axis(d.as_ref()))
            .collect::<CommonResult<Vec<_>>>()?;

        let data = self
            .data
            .clone()
            .permuted_axes(IxDyn(&perm))
            .as_standard_layout()
            .into_owned();

        Ok(Self {
            dims: order.iter().map(|d| d.as_ref().to_string()).collect(),
            data,
            attrs: self.attrs.clone(),
        })
    }

    /// Element-wise map, keeping dimensions and attributes.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Field {
        Self {
            dims: self.dims.clone(),
            data: self.data.mapv(f),
            attrs: self.attrs.clone(),
        }
    }

    /// Number of NaN or infinite values.
    pub fn count_non_finite(&self) -> usize {
        self.data.iter().filter(|v| !v.is_finite()).count()
    }

    /// Clip into `[min, max]`; NaN stays NaN.
    pub fn clip(&self, min: f64, max: f64) -> Field {
        self.map(|v| if v.is_nan() { v } else { v.max(min).min(max) })
    }

    /// Clip from below; NaN stays NaN.
    pub fn clip_min(&self, min: f64) -> Field {
        self.map(|v| if v.is_nan() { v } else { v.max(min) })
    }

    /// Combine two fields over the same dimensions (in any order).
    pub fn zip_with(&self, other: &Field, f: impl Fn(f64, f64) -> f64) -> CommonResult<Field> {
        let other = other.transpose(&self.dims[..])?;
        if other.shape() != self.shape() {
            return Err(CommonError::Shape(format!(
                "shape {:?} does not match {:?}",
                other.shape(),
                self.shape()
            )));
        }

        let data = Zip::from(&self.data)
            .and(&other.data)
            .map_collect(|&a, &b| f(a, b));

        Ok(Self {
            dims: self.dims.clone(),
            data,
            attrs: BTreeMap::new(),
        })
    }
}

/// A collection of fields sharing dimensions, with a decoded time axis.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Decoded values of the `time` dimension (empty if the source has none).
    pub time: Vec<DateTime<Utc>>,
    coords: BTreeMap<String, Field>,
    fields: BTreeMap<String, Field>,
    attrs: BTreeMap<String, String>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> CommonResult<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| CommonError::MissingVariable(name.to_string()))
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn insert_field(&mut self, name: impl Into<String>, field: Field) {
        self.fields.insert(name.into(), field);
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Field)> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn coord(&self, name: &str) -> Option<&Field> {
        self.coords.get(name)
    }

    pub fn insert_coord(&mut self, name: impl Into<String>, field: Field) {
        self.coords.insert(name.into(), field);
    }

    pub fn remove_coord(&mut self, name: &str) -> Option<Field> {
        self.coords.remove(name)
    }

    pub fn coords(&self) -> impl Iterator<Item = (&String, &Field)> {
        self.coords.iter()
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Length of a dimension, looked up across time, coordinates and fields.
    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        if dim == "time" && !self.time.is_empty() {
            return Some(self.time.len());
        }
        self.coords
            .values()
            .chain(self.fields.values())
            .find_map(|f| f.len_of(dim).ok())
    }

    /// Rename a dimension everywhere, including a coordinate of the same name.
    pub fn rename_dim(&mut self, from: &str, to: &str) {
        for f in self.fields.values_mut().chain(self.coords.values_mut()) {
            f.rename_dim(from, to);
        }
        if let Some(c) = self.coords.remove(from) {
            self.coords.insert(to.to_string(), c);
        }
    }

    /// Positional selection along a dimension for every member that has it.
    pub fn isel(&self, dim: &str, indices: &[usize]) -> CommonResult<Dataset> {
        let mut out = Dataset {
            time: self.time.clone(),
            coords: BTreeMap::new(),
            fields: BTreeMap::new(),
            attrs: self.attrs.clone(),
        };

        for (name, f) in &self.coords {
            let f = if f.has_dim(dim) { f.select(dim, indices)? } else { f.clone() };
            out.coords.insert(name.clone(), f);
        }
        for (name, f) in &self.fields {
            let f = if f.has_dim(dim) { f.select(dim, indices)? } else { f.clone() };
            out.fields.insert(name.clone(), f);
        }

        if dim == "time" && !self.time.is_empty() {
            out.time = indices
                .iter()
                .map(|&i| {
                    self.time.get(i).copied().ok_or_else(|| {
                        CommonError::Shape(format!("time index {} out of range", i))
                    })
                })
                .collect::<CommonResult<_>>()?;
        }

        Ok(out)
    }

    /// Positions of the requested timestamps on the time axis.
    pub fn time_indices(&self, times: &[DateTime<Utc>]) -> CommonResult<Vec<usize>> {
        times
            .iter()
            .map(|t| {
                self.time
                    .iter()
                    .position(|x| x == t)
                    .ok_or_else(|| CommonError::MissingTime(t.to_rfc3339()))
            })
            .collect()
    }

    /// Label-based selection on the time axis.
    pub fn sel_time(&self, times: &[DateTime<Utc>]) -> CommonResult<Dataset> {
        let indices = self.time_indices(times)?;
        self.isel("time", &indices)
    }

    /// Union of two datasets. Members already present in `self` win.
    ///
    /// Both time axes must be equal unless one of them is empty.
    pub fn merge(mut self, other: Dataset) -> CommonResult<Dataset> {
        if self.time.is_empty() {
            self.time = other.time;
        } else if !other.time.is_empty() && other.time != self.time {
            return Err(CommonError::TimeAxisMismatch(format!(
                "{} vs {}",
                describe_times(&self.time),
                describe_times(&other.time)
            )));
        }
        for (name, f) in other.coords {
            self.coords.entry(name).or_insert(f);
        }
        for (name, f) in other.fields {
            self.fields.entry(name).or_insert(f);
        }
        for (name, v) in other.attrs {
            self.attrs.entry(name).or_insert(v);
        }
        Ok(self)
    }
}

fn describe_times(times: &[DateTime<Utc>]) -> String {
    match (times.first(), times.last()) {
        (Some(first), Some(last)) if times.len() > 1 => {
            format!("[{} .. {}] ({} steps)", first.to_rfc3339(), last.to_rfc3339(), times.len())
        }
        (Some(first), _) => format!("[{}]", first.to_rfc3339()),
        _ => "[]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cube() -> Field {
        // value = 100*t + 10*y + x
        let mut values = Vec::new();
        for t in 0..2 {
            for y in 0..3 {
                for x in 0..4 {
                    values.push((100 * t + 10 * y + x) as f64);
                }
            }
        }
        Field::from_shape_vec(["time", "lat", "lon"], &[2, 3, 4], values).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_dims() {
        let data = ArrayD::zeros(IxDyn(&[2, 2]));
        assert!(Field::new(["a"], data.clone()).is_err());
        assert!(Field::new(["a", "a"], data).is_err());
    }

    #[test]
    fn test_transpose_by_name() {
        let f = cube().transpose(&["lon", "lat", "time"]).unwrap();
        assert_eq!(f.shape(), &[4, 3, 2]);
        assert_eq!(f.data()[[3, 2, 1]], 123.0);
        assert_eq!(f.dims(), &["lon", "lat", "time"]);
    }

    #[test]
    fn test_select_and_index() {
        let f = cube();
        let s = f.select("lon", &[3, 0]).unwrap();
        assert_eq!(s.shape(), &[2, 3, 2]);
        assert_eq!(s.data()[[1, 1, 0]], 113.0);

        let last = f.last_along("time").unwrap();
        assert_eq!(last.dims(), &["lat", "lon"]);
        assert_eq!(last.data()[[2, 3]], 123.0);

        assert!(f.select("lon", &[4]).is_err());
        assert!(f.index_dim("lev", 0).is_err());
    }

    #[test]
    fn test_squeeze() {
        let f = Field::from_shape_vec(["time", "height"], &[2, 1], vec![1.0, 2.0]).unwrap();
        let s = f.squeeze("height").unwrap();
        assert_eq!(s.dims(), &["time"]);
        assert!(f.squeeze("time").is_err());
    }

    #[test]
    fn test_clip_keeps_nan() {
        let f = Field::vector("x", vec![-1.0, 0.5, 2.0, f64::NAN]);
        let c = f.clip(0.0, 1.0).values();
        assert_eq!(&c[..3], &[0.0, 0.5, 1.0]);
        assert!(c[3].is_nan());
    }

    #[test]
    fn test_zip_with_transposes_other() {
        let a = cube();
        let b = a.transpose(&["lon", "time", "lat"]).unwrap();
        let sum = a.zip_with(&b, |x, y| x + y).unwrap();
        assert_eq!(sum.data()[[1, 2, 3]], 246.0);
    }

    #[test]
    fn test_dataset_isel_and_sel_time() {
        let t0 = Utc.with_ymd_and_hms(2020, 9, 15, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2020, 9, 15, 1, 0, 0).unwrap();

        let mut ds = Dataset::new();
        ds.time = vec![t0, t1];
        ds.insert_field("t", cube());
        ds.insert_coord("lon", Field::vector("lon", vec![0.0, 1.0, 2.0, 3.0]));

        let sub = ds.sel_time(&[t1]).unwrap();
        assert_eq!(sub.time, vec![t1]);
        assert_eq!(sub.field("t").unwrap().data()[[0, 0, 0]], 100.0);

        let missing = Utc.with_ymd_and_hms(2020, 9, 16, 0, 0, 0).unwrap();
        assert!(matches!(ds.sel_time(&[missing]), Err(CommonError::MissingTime(_))));

        let cells = ds.isel("lon", &[1, 2]).unwrap();
        assert_eq!(cells.coord("lon").unwrap().values(), vec![1.0, 2.0]);
        assert_eq!(cells.dim_len("lon"), Some(2));
    }

    #[test]
    fn test_merge_prefers_self() {
        let mut a = Dataset::new();
        a.insert_field("x", Field::vector("n", vec![1.0]));
        let mut b = Dataset::new();
        b.insert_field("x", Field::vector("n", vec![2.0]));
        b.insert_field("y", Field::vector("n", vec![3.0]));

        let m = a.merge(b).unwrap();
        assert_eq!(m.field("x").unwrap().values(), vec![1.0]);
        assert!(m.has_field("y"));
    }

    #[test]
    fn test_merge_rejects_different_time_axes() {
        let mut a = Dataset::new();
        a.time = vec![Utc.with_ymd_and_hms(2020, 9, 12, 0, 0, 0).unwrap()];
        a.insert_field("temp", Field::vector("n", vec![280.0]));
        let mut b = Dataset::new();
        b.time = vec![Utc.with_ymd_and_hms(2020, 9, 13, 0, 0, 0).unwrap()];
        b.insert_field("qc", Field::vector("n", vec![1e-5]));

        assert!(matches!(a.merge(b), Err(CommonError::TimeAxisMismatch(_))));
    }

    #[test]
    fn test_merge_adopts_time_when_one_side_has_none() {
        let t = vec![Utc.with_ymd_and_hms(2020, 9, 12, 0, 0, 0).unwrap()];
        let mut timed = Dataset::new();
        timed.time = t.clone();
        let untimed = Dataset::new();

        assert_eq!(untimed.clone().merge(timed.clone()).unwrap().time, t);
        assert_eq!(timed.merge(untimed).unwrap().time, t);
    }

    #[test]
    fn test_rename_dim() {
        let mut ds = Dataset::new();
        ds.insert_field("p", Field::vector("nhym", vec![1.0, 2.0]));
        ds.insert_coord("nhym", Field::vector("nhym", vec![0.0, 1.0]));
        ds.rename_dim("nhym", "lev");
        assert_eq!(ds.field("p").unwrap().dims(), &["lev"]);
        assert!(ds.coord("lev").is_some());
    }
}
