//! Synthetic atmospheric states with predictable values.
//!
//! Level profiles are the same in every column; the surface skin temperature
//! encodes the column's indices (see [`skin_temperature`]) so tests can check
//! that flattening, chunking and reassembly put every column back in place.

use chrono::{DateTime, Duration, TimeZone, Utc};
use synsat_common::{Dataset, Field};

/// First timestamp of every synthetic state.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 9, 12, 0, 0, 0)
        .single()
        .expect("valid start time")
}

/// `n` timestamps one hour apart.
pub fn hourly_times(n: usize) -> Vec<DateTime<Utc>> {
    (0..n).map(|i| start_time() + Duration::hours(i as i64)).collect()
}

/// Pressure of level `k` in Pa, increasing towards the surface.
pub fn level_pressure(k: usize, nlev: usize) -> f64 {
    100_000.0 * (k + 1) as f64 / nlev as f64
}

/// Temperature of level `k` in K at time index `t`.
pub fn level_temperature(t: usize, k: usize, nlev: usize) -> f64 {
    200.0 + 90.0 * (k + 1) as f64 / nlev as f64 + 0.1 * t as f64
}

/// Skin temperature of a column: `250 + 10*t + y + 0.01*x`.
pub fn skin_temperature(t: usize, y: usize, x: usize) -> f64 {
    250.0 + 10.0 * t as f64 + y as f64 + 0.01 * x as f64
}

pub fn level_q(k: usize) -> f64 {
    1e-4 * (k + 1) as f64
}

pub fn level_clwc(k: usize, nlev: usize) -> f64 {
    if k == nlev / 2 {
        1e-5
    } else {
        0.0
    }
}

pub const CIWC: f64 = 2e-6;
pub const CSWC: f64 = 1e-6;
pub const CC: f64 = 0.5;
pub const SURFACE_PRESSURE: f64 = 101_325.0;

/// Row-major values over `shape`, computed from each multi-index.
pub fn grid_values<const N: usize>(shape: [usize; N], f: impl Fn([usize; N]) -> f64) -> Vec<f64> {
    let total: usize = shape.iter().product();
    let mut values = Vec::with_capacity(total);
    let mut idx = [0usize; N];
    for _ in 0..total {
        values.push(f(idx));
        for axis in (0..N).rev() {
            idx[axis] += 1;
            if idx[axis] < shape[axis] {
                break;
            }
            idx[axis] = 0;
        }
    }
    values
}

fn cube<const N: usize>(dims: [&str; N], shape: [usize; N], f: impl Fn([usize; N]) -> f64) -> Field {
    Field::from_shape_vec(dims, &shape, grid_values(shape, f)).expect("consistent test shape")
}

/// Canonical state on a regular grid.
///
/// Level fields are on `(time, lev, lat, lon)`, surface fields on
/// `(time, lat, lon)`; `lon = 10 + x`, `lat = 40 + y`.
pub fn synthetic_regular_dataset(ntime: usize, nlon: usize, nlat: usize, nlev: usize) -> Dataset {
    let mut ds = Dataset::new();
    ds.time = hourly_times(ntime);
    ds.insert_coord("lon", Field::vector("lon", (0..nlon).map(|x| 10.0 + x as f64).collect()));
    ds.insert_coord("lat", Field::vector("lat", (0..nlat).map(|y| 40.0 + y as f64).collect()));

    let level = ["time", "lev", "lat", "lon"];
    let lshape = [ntime, nlev, nlat, nlon];
    ds.insert_field("p", cube(level, lshape, |[_, k, _, _]| level_pressure(k, nlev)));
    ds.insert_field("t", cube(level, lshape, |[t, k, _, _]| level_temperature(t, k, nlev)));
    ds.insert_field("q", cube(level, lshape, |[_, k, _, _]| level_q(k)));
    ds.insert_field("clwc", cube(level, lshape, |[_, k, _, _]| level_clwc(k, nlev)));
    ds.insert_field("ciwc", cube(level, lshape, |_| CIWC));
    ds.insert_field("cswc", cube(level, lshape, |_| CSWC));
    ds.insert_field("cc", cube(level, lshape, |_| CC));

    let surface = ["time", "lat", "lon"];
    let sshape = [ntime, nlat, nlon];
    ds.insert_field("SKT", cube(surface, sshape, |[t, y, x]| skin_temperature(t, y, x)));
    ds.insert_field("SP", cube(surface, sshape, |_| SURFACE_PRESSURE));
    ds.insert_field("T2M", cube(surface, sshape, |[t, y, x]| skin_temperature(t, y, x) - 2.0));
    ds
}

/// Canonical state on `cell`, with `lon = -30 + 10*i` and `lat = -20 + 5*i`.
///
/// The skin temperature uses the cell index as `x` (and `y = 0`).
pub fn synthetic_unstructured_dataset(ntime: usize, ncell: usize, nlev: usize) -> Dataset {
    let mut ds = Dataset::new();
    ds.time = hourly_times(ntime);
    ds.insert_coord("lon", Field::vector("cell", (0..ncell).map(|i| -30.0 + 10.0 * i as f64).collect()));
    ds.insert_coord("lat", Field::vector("cell", (0..ncell).map(|i| -20.0 + 5.0 * i as f64).collect()));

    let level = ["time", "lev", "cell"];
    let lshape = [ntime, nlev, ncell];
    ds.insert_field("p", cube(level, lshape, |[_, k, _]| level_pressure(k, nlev)));
    ds.insert_field("t", cube(level, lshape, |[t, k, _]| level_temperature(t, k, nlev)));
    ds.insert_field("q", cube(level, lshape, |[_, k, _]| level_q(k)));
    ds.insert_field("clwc", cube(level, lshape, |[_, k, _]| level_clwc(k, nlev)));
    ds.insert_field("ciwc", cube(level, lshape, |_| CIWC));
    ds.insert_field("cswc", cube(level, lshape, |_| CSWC));
    ds.insert_field("cc", cube(level, lshape, |_| CC));

    let surface = ["time", "cell"];
    let sshape = [ntime, ncell];
    ds.insert_field("SKT", cube(surface, sshape, |[t, i]| skin_temperature(t, 0, i)));
    ds.insert_field("SP", cube(surface, sshape, |_| SURFACE_PRESSURE));
    ds.insert_field("T2M", cube(surface, sshape, |[t, i]| skin_temperature(t, 0, i) - 2.0));
    ds
}
