//! Satellite viewing geometry.
//!
//! Computes the azimuth and zenith angles under which a geostationary imager
//! sees a point on the Earth's surface. Pure functions, no I/O.

pub mod geostationary;

pub use geostationary::{
    lonlat_to_azizen, Geostationary, EARTH_RADIUS_KM, GEOSTATIONARY_ORBIT_KM,
};
