//! Geostationary viewing angles.
//!
//! The satellite sits above the equator at a fixed sub-satellite longitude.
//! For a surface point at great-circle distance `delta` from the
//! sub-satellite point, the triangle (Earth centre, surface point, satellite)
//! has sides `R`, `H` and the slant range
//! `D = sqrt(R² + H² − 2HR·cos(delta))`; the zenith angle follows from the
//! law of sines.
//!
//! Two edge cases are handled explicitly:
//!
//! - beyond the visible horizon (`cos(delta) < R/H`) the zenith is 90°
//! - at the sub-satellite point the azimuth is undefined; NaNs become 0°

use num_traits::Float;

/// Earth radius (km).
pub const EARTH_RADIUS_KM: f64 = 6378.0;

/// Distance of a geostationary orbit from the Earth's centre (km).
pub const GEOSTATIONARY_ORBIT_KM: f64 = 42164.0;

#[inline]
fn lit<T: Float>(v: f64) -> T {
    T::from(v).unwrap_or_else(T::nan)
}

#[inline]
fn nan_to_zero<T: Float>(v: T) -> T {
    if v.is_nan() {
        T::zero()
    } else {
        v
    }
}

/// Satellite azimuth and zenith (degrees) for a point at `lon`/`lat` (degrees).
///
/// `sub_lon` is the sub-satellite longitude in degrees. See
/// [`Geostationary::azimuth_zenith`] for a configurable Earth radius and orbit.
pub fn lonlat_to_azizen<T: Float>(lon: T, lat: T, sub_lon: T) -> (T, T) {
    Geostationary::new(sub_lon.to_f64().unwrap_or(0.0)).azimuth_zenith(lon, lat)
}

/// A geostationary imager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geostationary {
    /// Sub-satellite longitude (degrees east)
    pub sub_lon: f64,
    /// Earth radius (km)
    pub earth_radius: f64,
    /// Orbit radius measured from the Earth's centre (km)
    pub orbit_radius: f64,
}

impl Default for Geostationary {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Geostationary {
    /// Imager at the given sub-satellite longitude with the standard radii.
    pub fn new(sub_lon: f64) -> Self {
        Self {
            sub_lon,
            earth_radius: EARTH_RADIUS_KM,
            orbit_radius: GEOSTATIONARY_ORBIT_KM,
        }
    }

    /// Great-circle angle cosine between a point and the sub-satellite point.
    #[inline]
    fn cos_delta<T: Float>(&self, lon: T, lat: T) -> T {
        let lam = (lon - lit(self.sub_lon)).to_radians();
        let phi = lat.to_radians();
        phi.cos() * lam.cos()
    }

    /// True if the point lies on the satellite-facing side of the horizon.
    pub fn is_visible<T: Float>(&self, lon: T, lat: T) -> bool {
        self.cos_delta(lon, lat) - lit::<T>(self.earth_radius / self.orbit_radius) >= T::zero()
    }

    /// Satellite azimuth and zenith angles (degrees) for a surface point.
    pub fn azimuth_zenith<T: Float>(&self, lon: T, lat: T) -> (T, T) {
        let r: T = lit(self.earth_radius);
        let h: T = lit(self.orbit_radius);
        let pi: T = lit(std::f64::consts::PI);
        let one = T::one();

        let phi = lat.to_radians();
        let cos_delta = self.cos_delta(lon, lat);
        let delta = cos_delta.acos();

        // ratio may leave [-1, 1] by rounding along the sub-satellite meridian
        let ratio = phi.sin() / delta.sin();
        let ratio = if ratio.is_finite() { ratio.max(-one).min(one) } else { ratio };
        let azi = ratio.acos();

        let azi = nan_to_zero(azi).to_degrees();

        if cos_delta - r / h < T::zero() {
            return (azi, lit(90.0));
        }

        let d = (r * r + h * h - lit::<T>(2.0) * h * r * cos_delta).sqrt();
        let s = h / d * delta.sin();
        // rounding can push the sine past 1 right at the horizon
        let s = if s > one { one } else { s };
        let gamma = pi - s.asin();
        let zen = nan_to_zero(pi - gamma).to_degrees();

        (azi, zen.min(lit(90.0)))
    }

    /// Azimuth and zenith for paired coordinate slices.
    pub fn azimuth_zenith_many(&self, lon: &[f64], lat: &[f64]) -> (Vec<f64>, Vec<f64>) {
        lon.iter()
            .zip(lat)
            .map(|(&x, &y)| self.azimuth_zenith(x, y))
            .unzip()
    }

    /// Indices of points whose zenith does not exceed `max_zenith` degrees.
    pub fn zenith_mask_indices(&self, lon: &[f64], lat: &[f64], max_zenith: f64) -> Vec<usize> {
        lon.iter()
            .zip(lat)
            .enumerate()
            .filter(|(_, (&x, &y))| self.azimuth_zenith(x, y).1 <= max_zenith)
            .map(|(i, _)| i)
            .collect()
    }
}
