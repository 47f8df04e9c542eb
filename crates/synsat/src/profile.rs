//! Solver-ready profile batches.
//!
//! A [`ProfileBatch`] holds one contiguous range of stacked profiles in the
//! layout the solver consumes: level arrays as `[profile][level]`, per-profile
//! parameter vectors, and the four cloud/gas channels as `[gas][profile][level]`.

use std::ops::Range;

use chrono::{DateTime, Datelike, Utc};
use projection::Geostationary;
use synsat_common::time::calendar_vector;
use synsat_common::{Dataset, Field};
use tracing::debug;

use crate::config::SynsatConfig;
use crate::error::{Result, SynsatError};
use crate::stack::ProfileStack;

/// Valid temperature range of the solver, K.
///
/// The clamp leaves NaN alone; [`AtmosphericState`](model_input::AtmosphericState)
/// refuses non-finite fields, so none reach the builder.
pub const T_MIN: f64 = 100.0;
pub const T_MAX: f64 = 400.0;

/// Largest zenith angle handed to the solver, degrees.
pub const ZENITH_MAX: f64 = 80.0;

/// Ice cloud scheme and ice particle parameterisation.
pub const ICE_CLOUD: [i32; 2] = [1, 4];

/// FASTEM ocean surface parameters appended to the skin vector.
pub const FASTEM: [f64; 5] = [3.0, 5.0, 15.0, 0.1, 0.3];

/// Gas channels in solver order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gas {
    WaterVapour,
    CloudFraction,
    CloudLiquid,
    /// Ice, optionally blended with snow.
    FrozenCondensate,
}

impl Gas {
    pub const ALL: [Gas; 4] = [
        Gas::WaterVapour,
        Gas::CloudFraction,
        Gas::CloudLiquid,
        Gas::FrozenCondensate,
    ];

    /// Solver gas id.
    pub fn id(self) -> u32 {
        match self {
            Gas::WaterVapour => 1,
            Gas::CloudFraction => 20,
            Gas::CloudLiquid => 21,
            Gas::FrozenCondensate => 30,
        }
    }

    fn index(self) -> usize {
        match self {
            Gas::WaterVapour => 0,
            Gas::CloudFraction => 1,
            Gas::CloudLiquid => 2,
            Gas::FrozenCondensate => 3,
        }
    }
}

/// Profiles for one solver call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileBatch {
    /// Position of the batch on the stacked profile axis.
    pub range: Range<usize>,
    pub nlevels: usize,
    /// Pressure, hPa.
    pub pressure: Vec<f64>,
    /// Temperature, K.
    pub temperature: Vec<f64>,
    /// Water vapour mixing ratio, kg/kg.
    pub q: Vec<f64>,
    /// Zenith, azimuth, solar zenith, solar azimuth.
    pub angles: Vec<[f64; 4]>,
    /// Latitude, longitude, elevation.
    pub surf_geom: Vec<[f64; 3]>,
    /// Surface type and water type.
    pub surf_type: Vec<[i32; 2]>,
    /// Skin temperature, salinity, snow fraction, foam fraction, FASTEM.
    pub skin: Vec<[f64; 9]>,
    /// Surface pressure (hPa), 2 m temperature, 2 m humidity, 10 m wind and fetch.
    pub s2m: Vec<[f64; 6]>,
    /// Year, month, day, hour, minute, second.
    pub date_times: Vec<[i32; 6]>,
    /// `[gas][profile][level]` in [`Gas::ALL`] order.
    pub gases: Vec<f64>,
    pub ice_cloud: Vec<[i32; 2]>,
    /// Timestamp every profile of the batch is tagged with.
    pub time: DateTime<Utc>,
}

impl ProfileBatch {
    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    /// `[profile][level]` values of one gas channel.
    pub fn gas(&self, gas: Gas) -> &[f64] {
        let n = self.len() * self.nlevels;
        &self.gases[gas.index() * n..(gas.index() + 1) * n]
    }

    pub fn gas_ids(&self) -> [u32; 4] {
        Gas::ALL.map(Gas::id)
    }

    /// Calendar month of the batch timestamp.
    pub fn month(&self) -> u32 {
        self.time.month()
    }

    /// The batch as a dataset over `profile`/`level` dimensions, for file exchange.
    pub fn to_dataset(&self) -> Result<Dataset> {
        let n = self.len();
        let nlev = self.nlevels;
        let mut ds = Dataset::new();
        ds.time = vec![self.time];

        let level = |values: &[f64]| Field::from_shape_vec(["profile", "level"], &[n, nlev], values.to_vec());
        ds.insert_field("P", level(&self.pressure)?.with_attr("units", "hPa"));
        ds.insert_field("T", level(&self.temperature)?.with_attr("units", "K"));
        ds.insert_field("Q", level(&self.q)?.with_attr("units", "kg/kg"));

        ds.insert_field("Angles", rows("angle", &self.angles)?);
        ds.insert_field("SurfGeom", rows("surfgeom", &self.surf_geom)?);
        ds.insert_field("SurfType", rows("surftype", &int_rows(&self.surf_type))?);
        ds.insert_field("Skin", rows("skin", &self.skin)?);
        ds.insert_field("S2m", rows("s2m", &self.s2m)?);
        ds.insert_field("DateTimes", rows("datetime", &int_rows(&self.date_times))?);
        ds.insert_field("IceCloud", rows("icecloud", &int_rows(&self.ice_cloud))?);

        ds.insert_field(
            "Gases",
            Field::from_shape_vec(["gas", "profile", "level"], &[Gas::ALL.len(), n, nlev], self.gases.clone())?,
        );
        ds.insert_field(
            "GasId",
            Field::vector("gas", self.gas_ids().iter().map(|&id| f64::from(id)).collect()),
        );

        ds.set_attr("MmrCldAer", "1");
        ds.set_attr("profile_offset", self.range.start.to_string());
        Ok(ds)
    }
}

fn rows<const N: usize>(dim: &str, rows: &[[f64; N]]) -> Result<Field> {
    let values = rows.iter().flatten().copied().collect();
    Ok(Field::from_shape_vec(["profile", dim], &[rows.len(), N], values)?)
}

fn int_rows<const N: usize>(rows: &[[i32; N]]) -> Vec<[f64; N]> {
    rows.iter().map(|r| r.map(f64::from)).collect()
}

/// Builds [`ProfileBatch`]es from a [`ProfileStack`].
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    geometry: Geostationary,
    snow_factor: Option<f64>,
}

impl ProfileBuilder {
    pub fn new(sub_lon: f64, snow_factor: Option<f64>) -> Self {
        Self {
            geometry: Geostationary::new(sub_lon),
            snow_factor,
        }
    }

    pub fn from_config(config: &SynsatConfig) -> Self {
        Self::new(config.instrument.sub_lon, config.solver.snow_factor)
    }

    pub fn snow_factor(&self) -> Option<f64> {
        self.snow_factor
    }

    /// One batch over the stacked profiles in `range`.
    pub fn build(&self, stack: &ProfileStack, range: Range<usize>) -> Result<ProfileBatch> {
        if range.is_empty() {
            return Err(SynsatError::EmptySelection(format!("profile range {:?}", range)));
        }
        if range.end > stack.len() {
            return Err(SynsatError::shape(format!(
                "profile range {:?} exceeds {} stacked profiles",
                range,
                stack.len()
            )));
        }

        let n = range.len();
        let nlev = stack.nlevels();

        let pressure_pa = stack.level("p", range.clone())?;
        let pressure = pressure_pa.iter().map(|p| p / 100.0).collect();
        let temperature = stack
            .level("t", range.clone())?
            .iter()
            .map(|t| t.clamp(T_MIN, T_MAX))
            .collect();
        let q = stack.level("q", range.clone())?;

        let lon = &stack.lon()[range.clone()];
        let lat = &stack.lat()[range.clone()];
        let (azi, zen) = self.geometry.azimuth_zenith_many(lon, lat);
        let angles = zen
            .iter()
            .zip(&azi)
            .map(|(z, a)| [z.clamp(0.0, ZENITH_MAX), *a, 0.0, 0.0])
            .collect();
        let surf_geom = lat.iter().zip(lon).map(|(&y, &x)| [y, x, 0.0]).collect();

        let skt = stack.surface("SKT", range.clone())?;
        let skin = skt
            .iter()
            .map(|&t| [t, 0.0, 0.0, 0.0, FASTEM[0], FASTEM[1], FASTEM[2], FASTEM[3], FASTEM[4]])
            .collect();

        let sp = stack.surface("SP", range.clone())?;
        let t2m = stack.surface("T2M", range.clone())?;
        let s2m = (0..n)
            .map(|i| {
                let column = i * nlev..(i + 1) * nlev;
                let q_sfc = surface_level(&pressure_pa[column.clone()])
                    .map_or(f64::NAN, |k| q[column.start + k]);
                [sp[i] / 100.0, t2m[i], q_sfc, 0.0, 0.0, 0.0]
            })
            .collect();

        let time = stack.times()[range.start];
        let cal = calendar_vector(&time);
        let stamp = [cal[0], cal[1], cal[2], cal[3], cal[4], cal[5]].map(|v| v as i32);

        let mut gases = Vec::with_capacity(Gas::ALL.len() * n * nlev);
        gases.extend_from_slice(q);
        gases.extend_from_slice(stack.level("cc", range.clone())?);
        gases.extend_from_slice(stack.level("clwc", range.clone())?);
        let ciwc = stack.level("ciwc", range.clone())?;
        match self.snow_factor {
            Some(s) => {
                let cswc = stack.level("cswc", range.clone())?;
                gases.extend(ciwc.iter().zip(cswc).map(|(i, c)| i + s * c));
            }
            None => gases.extend_from_slice(ciwc),
        }

        debug!(
            start = range.start,
            nprofiles = n,
            nlevels = nlev,
            time = %time,
            "Built profile batch"
        );

        Ok(ProfileBatch {
            nlevels: nlev,
            pressure,
            temperature,
            q: q.to_vec(),
            angles,
            surf_geom,
            surf_type: vec![[0, 0]; n],
            skin,
            s2m,
            date_times: vec![stamp; n],
            gases,
            ice_cloud: vec![ICE_CLOUD; n],
            time,
            range,
        })
    }
}

/// Index of the highest-pressure level of one column.
fn surface_level(pressure: &[f64]) -> Option<usize> {
    pressure
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(k, _)| k)
}
