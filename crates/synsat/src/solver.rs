//! Contracts of the radiative-transfer solver and the surface atlases.
//!
//! A [`Solver`] is one stateful instance: it holds loaded coefficients, the
//! current profile buffer and the last result. Methods take `&mut self`, so a
//! second caller cannot drive the same instance concurrently.

use std::path::Path;

use crate::config::SolverConfig;
use crate::error::{Result, SynsatError};
use crate::profile::ProfileBatch;

/// Options pushed to the solver before the first run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverOptions {
    pub add_interp: bool,
    pub add_solar: bool,
    /// Cloud input as mass mixing ratios on the gas channels.
    pub cloud: bool,
    pub verbose: bool,
    pub nprofs_per_call: usize,
    pub nthreads: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self::from_config(&SolverConfig::default())
    }
}

impl SolverOptions {
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            add_interp: config.add_interp,
            add_solar: config.add_solar,
            cloud: config.cloud,
            verbose: config.verbose,
            nprofs_per_call: config.nprofs_per_call,
            nthreads: config.nthreads,
        }
    }

    /// Command-line style option flags, e.g. `--add-interp`.
    pub fn flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        for (on, name) in [
            (self.add_interp, "--add-interp"),
            (self.add_solar, "--add-solar"),
            (self.cloud, "--mmr-cld-aer"),
            (self.verbose, "--verbose"),
        ] {
            if on {
                flags.push(name.to_string());
            }
        }
        flags.push(format!("--nprofs-per-call={}", self.nprofs_per_call));
        flags.push(format!("--nthreads={}", self.nthreads));
        flags
    }
}

/// A radiative-transfer solver instance.
pub trait Solver {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load instrument coefficients for the given channels.
    fn load_instrument(&mut self, coef_file: &Path, channels: &[u16], options: &SolverOptions)
        -> std::result::Result<(), Self::Error>;

    /// Replace the profile buffer.
    fn set_profiles(&mut self, batch: &ProfileBatch) -> std::result::Result<(), Self::Error>;

    /// Emissivity/reflectance overrides for the next run.
    fn set_surf_emis_refl(&mut self, surf: &SurfEmisRefl) -> std::result::Result<(), Self::Error>;

    /// Run the forward model on the current profiles.
    fn run_direct(&mut self) -> std::result::Result<(), Self::Error>;

    /// Flat `(profile, channel)` result of the last run.
    fn bt_refl(&self) -> std::result::Result<Vec<f64>, Self::Error>;
}

/// The two surface atlases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtlasKind {
    /// Infrared emissivity.
    Emissivity,
    /// Visible/near-infrared BRDF.
    Brdf,
}

impl AtlasKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AtlasKind::Emissivity => "emis",
            AtlasKind::Brdf => "brdf",
        }
    }

    /// Row of [`SurfEmisRefl`] the atlas fills.
    pub fn row(&self) -> usize {
        match self {
            AtlasKind::Emissivity => 0,
            AtlasKind::Brdf => 1,
        }
    }
}

impl std::fmt::Display for AtlasKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A surface emissivity or BRDF climatology.
pub trait Atlas {
    type Error: std::error::Error + Send + Sync + 'static;

    fn kind(&self) -> AtlasKind;

    /// Initialise for a month and profile count.
    fn load(&mut self, month: u32, nprofiles: usize) -> std::result::Result<(), Self::Error>;

    /// Flat `(profile, channel)` values for a batch.
    fn emis_brdf(&mut self, batch: &ProfileBatch, channels: &[u16]) -> std::result::Result<Vec<f64>, Self::Error>;
}

/// Rows of the emissivity/reflectance override array.
pub const SURF_EMIS_REFL_ROWS: usize = 4;

/// `(4, nprofiles, nchannels)` overrides; negative values leave the
/// computation to the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfEmisRefl {
    nprofiles: usize,
    nchannels: usize,
    values: Vec<f64>,
}

impl SurfEmisRefl {
    /// All entries set to -1.
    pub fn new(nprofiles: usize, nchannels: usize) -> Self {
        Self {
            nprofiles,
            nchannels,
            values: vec![-1.0; SURF_EMIS_REFL_ROWS * nprofiles * nchannels],
        }
    }

    pub fn nprofiles(&self) -> usize {
        self.nprofiles
    }

    pub fn nchannels(&self) -> usize {
        self.nchannels
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn shape(&self) -> [usize; 3] {
        [SURF_EMIS_REFL_ROWS, self.nprofiles, self.nchannels]
    }

    /// `(profile, channel)` block of one row.
    pub fn row(&self, row: usize) -> &[f64] {
        let n = self.nprofiles * self.nchannels;
        &self.values[row * n..(row + 1) * n]
    }

    pub fn set_row(&mut self, row: usize, values: &[f64]) -> Result<()> {
        let n = self.nprofiles * self.nchannels;
        if row >= SURF_EMIS_REFL_ROWS {
            return Err(SynsatError::shape(format!("row {} of {}", row, SURF_EMIS_REFL_ROWS)));
        }
        if values.len() != n {
            return Err(SynsatError::shape(format!(
                "{} emissivity values for {} profiles x {} channels",
                values.len(),
                self.nprofiles,
                self.nchannels
            )));
        }
        self.values[row * n..(row + 1) * n].copy_from_slice(values);
        Ok(())
    }
}
