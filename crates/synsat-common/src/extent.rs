//! Geographic selection box.

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// A longitude/latitude box in degrees, bounds inclusive.
///
/// Serialized as `[lon_min, lon_max, lat_min, lat_max]`, the order used in
/// configuration files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl Extent {
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        }
    }

    /// Parse `"lon_min,lon_max,lat_min,lat_max"`.
    pub fn parse(s: &str) -> CommonResult<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(CommonError::InvalidExtent(format!(
                "{}. Expected 'lon_min,lon_max,lat_min,lat_max'",
                s
            )));
        }

        let mut values = [0.0; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| CommonError::InvalidExtent(format!("invalid number '{}'", part)))?;
        }

        let extent = Self::from(values);
        extent.validate()?;
        Ok(extent)
    }

    /// Check that the bounds are ordered and latitudes are physical.
    pub fn validate(&self) -> CommonResult<()> {
        if !(self.lon_min < self.lon_max) {
            return Err(CommonError::InvalidExtent(format!(
                "lon_min {} must be < lon_max {}",
                self.lon_min, self.lon_max
            )));
        }
        if !(self.lat_min < self.lat_max) {
            return Err(CommonError::InvalidExtent(format!(
                "lat_min {} must be < lat_max {}",
                self.lat_min, self.lat_max
            )));
        }
        if self.lat_min < -90.0 || self.lat_max > 90.0 {
            return Err(CommonError::InvalidExtent(
                "latitudes must lie within [-90, 90]".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if a point lies inside the box (edges included).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.lon_min && lon <= self.lon_max && lat >= self.lat_min && lat <= self.lat_max
    }

    /// Indices of the points inside the box, in input order.
    pub fn select_indices(&self, lon: &[f64], lat: &[f64]) -> Vec<usize> {
        lon.iter()
            .zip(lat)
            .enumerate()
            .filter(|(_, (&x, &y))| self.contains(x, y))
            .map(|(i, _)| i)
            .collect()
    }
}

impl From<[f64; 4]> for Extent {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Extent> for [f64; 4] {
    fn from(e: Extent) -> Self {
        [e.lon_min, e.lon_max, e.lat_min, e.lat_max]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extent() {
        let e = Extent::parse("-8, 45, 30, 45").unwrap();
        assert_eq!(e, Extent::new(-8.0, 45.0, 30.0, 45.0));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Extent::parse("1,2,3").is_err());
        assert!(Extent::parse("a,2,3,4").is_err());
        assert!(Extent::parse("10,0,30,45").is_err());
        assert!(Extent::parse("0,10,-95,45").is_err());
    }

    #[test]
    fn test_contains_is_inclusive() {
        let e = Extent::new(-8.0, 45.0, 30.0, 45.0);
        assert!(e.contains(-8.0, 30.0));
        assert!(e.contains(45.0, 45.0));
        assert!(!e.contains(45.1, 40.0));
        assert!(!e.contains(0.0, 29.9));
    }

    #[test]
    fn test_select_indices() {
        let e = Extent::new(0.0, 10.0, 0.0, 10.0);
        let lon = [5.0, 20.0, 1.0, -3.0];
        let lat = [5.0, 5.0, 9.0, 5.0];
        assert_eq!(e.select_indices(&lon, &lat), vec![0, 2]);
    }
}
