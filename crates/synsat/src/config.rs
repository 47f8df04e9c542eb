//! Simulation configuration.
//!
//! One YAML document configures the whole run. The adapter sections
//! (`source`, `icon`, `nextgems`) are [`InputConfig`]; the rest is defined
//! here:
//!
//! ```yaml
//! source:
//!   model: era
//! instrument:
//!   name: seviri
//!   satellite: 3
//!   channels: [9, 10]
//! solver:
//!   coef_dir: ${RTTOV_DIR:-/opt/rttov}
//!   nprofs_per_call: 4000
//!   snow_factor: 1.0
//! stack:
//!   isel:
//!     cell: { step: 4 }
//! ```
//!
//! `${VAR}` and `${VAR:-default}` are expanded before parsing; `SYNSAT_*`
//! environment variables override individual fields afterwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use model_input::InputConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynsatError};
use crate::instrument::{Instrument, InstrumentKind};

/// Instrument selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub name: InstrumentKind,
    /// MSG / GOES number; instrument default when unset.
    pub satellite: Option<u8>,
    /// Channel numbers; instrument default when unset.
    pub channels: Option<Vec<u16>>,
    /// Sub-satellite longitude (degrees east).
    pub sub_lon: f64,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            name: InstrumentKind::Seviri,
            satellite: None,
            channels: None,
            sub_lon: 0.0,
        }
    }
}

impl InstrumentConfig {
    pub fn instrument(&self) -> Result<Instrument> {
        Instrument::new(self.name, self.satellite, self.channels.as_deref())
    }
}

/// Radiative-transfer solver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Solver installation holding coefficients and atlas data.
    pub coef_dir: PathBuf,
    pub add_interp: bool,
    pub add_solar: bool,
    /// Cloudy simulations from mass mixing ratios.
    pub cloud: bool,
    pub verbose: bool,
    /// Profiles per solver call.
    pub nprofs_per_call: usize,
    pub nthreads: usize,
    /// Split runs into batches of `nprofs_per_call` profiles.
    pub chunked: bool,
    /// Weight of snow in the frozen condensate (`ice + snow_factor * snow`).
    pub snow_factor: Option<f64>,
    /// Atlas month used before any profiles are loaded.
    pub default_month: u32,
    /// IR emissivity atlas data; `{coef_dir}/emis_data` when unset.
    pub emis_atlas_dir: Option<PathBuf>,
    /// BRDF atlas data; `{coef_dir}/brdf_data` when unset.
    pub brdf_atlas_dir: Option<PathBuf>,
    /// External solver program.
    pub program: PathBuf,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            coef_dir: PathBuf::from("/opt/rttov"),
            add_interp: true,
            add_solar: true,
            cloud: true,
            verbose: false,
            nprofs_per_call: 4000,
            nthreads: 1,
            chunked: true,
            snow_factor: None,
            default_month: 8,
            emis_atlas_dir: None,
            brdf_atlas_dir: None,
            program: PathBuf::from("rttov_wrapper"),
        }
    }
}

impl SolverConfig {
    pub fn emis_atlas_dir(&self) -> PathBuf {
        self.emis_atlas_dir
            .clone()
            .unwrap_or_else(|| self.coef_dir.join("emis_data"))
    }

    pub fn brdf_atlas_dir(&self) -> PathBuf {
        self.brdf_atlas_dir
            .clone()
            .unwrap_or_else(|| self.coef_dir.join("brdf_data"))
    }
}

/// Global attributes written to results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceConfig {
    pub author: String,
    pub contact: String,
    pub institution: String,
    pub license: String,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            author: String::new(),
            contact: String::new(),
            institution: String::new(),
            license: "CC-BY SA 3.0".to_string(),
        }
    }
}

/// Positional slice `start..stop` with `step`, applied before stacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimSlice {
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub stop: Option<usize>,
    #[serde(default = "default_step")]
    pub step: usize,
}

fn default_step() -> usize {
    1
}

impl DimSlice {
    /// Indices selected from a dimension of length `len`.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let stop = self.stop.map_or(len, |s| s.min(len));
        (self.start..stop).step_by(self.step.max(1)).collect()
    }
}

/// Profile axis construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Per-dimension pre-selection.
    pub isel: BTreeMap<String, DimSlice>,
}

/// Complete run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SynsatConfig {
    #[serde(flatten)]
    pub input: InputConfig,
    pub instrument: InstrumentConfig,
    pub solver: SolverConfig,
    pub stack: StackConfig,
    pub provenance: ProvenanceConfig,
}

impl SynsatConfig {
    /// Parse YAML after `${VAR}` expansion.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let expanded = shellexpand::env(text)
            .map_err(|e| SynsatError::config(format!("variable substitution failed: {}", e)))?;
        serde_yaml::from_str(&expanded).map_err(|e| SynsatError::config(format!("invalid YAML: {}", e)))
    }

    /// Load a YAML file, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SynsatError::config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_yaml(&text)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `SYNSAT_*` environment variables.
    pub fn apply_env(&mut self) {
        self.input.apply_env();

        if let Ok(val) = std::env::var("SYNSAT_INSTRUMENT") {
            if let Ok(kind) = val.parse() {
                self.instrument.name = kind;
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_SATELLITE") {
            if let Ok(n) = val.parse() {
                self.instrument.satellite = Some(n);
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_CHANNELS") {
            let channels: std::result::Result<Vec<u16>, _> =
                val.split(',').map(|s| s.trim().parse()).collect();
            if let Ok(channels) = channels {
                self.instrument.channels = Some(channels);
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_SUB_LON") {
            if let Ok(lon) = val.parse() {
                self.instrument.sub_lon = lon;
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_COEF_DIR") {
            self.solver.coef_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("SYNSAT_NPROFS_PER_CALL") {
            if let Ok(n) = val.parse() {
                self.solver.nprofs_per_call = n;
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_NTHREADS") {
            if let Ok(n) = val.parse() {
                self.solver.nthreads = n;
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_CHUNKED") {
            self.solver.chunked = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("SYNSAT_SNOW_FACTOR") {
            if let Ok(s) = val.parse() {
                self.solver.snow_factor = Some(s);
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_DEFAULT_MONTH") {
            if let Ok(m) = val.parse() {
                self.solver.default_month = m;
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_SOLVER_PROGRAM") {
            self.solver.program = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("SYNSAT_AUTHOR") {
            self.provenance.author = val;
        }

        if let Ok(val) = std::env::var("SYNSAT_CONTACT") {
            self.provenance.contact = val;
        }

        if let Ok(val) = std::env::var("SYNSAT_INSTITUTION") {
            self.provenance.institution = val;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.input.validate()?;
        self.instrument.instrument()?;

        if self.solver.nprofs_per_call == 0 {
            return Err(SynsatError::config("nprofs_per_call must be > 0"));
        }

        if self.solver.nthreads == 0 {
            return Err(SynsatError::config("nthreads must be > 0"));
        }

        if let Some(s) = self.solver.snow_factor {
            if !(s >= 0.0) {
                return Err(SynsatError::config("snow_factor must be >= 0"));
            }
        }

        if !(1..=12).contains(&self.solver.default_month) {
            return Err(SynsatError::config("default_month must be 1-12"));
        }

        if !(-180.0..=180.0).contains(&self.instrument.sub_lon) {
            return Err(SynsatError::config("sub_lon must be within [-180, 180]"));
        }

        for (dim, slice) in &self.stack.isel {
            if slice.step == 0 {
                return Err(SynsatError::config(format!("stack.isel.{}: step must be > 0", dim)));
            }
        }

        Ok(())
    }

    /// Adapter configuration; zenith selection uses the instrument's sub-satellite longitude.
    pub fn input(&self) -> InputConfig {
        let mut input = self.input.clone();
        input.nextgems.sub_lon = self.instrument.sub_lon;
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_input::{ModelKind, Selection};

    #[test]
    fn test_defaults_are_valid() {
        let config = SynsatConfig::default();
        config.validate().unwrap();
        assert_eq!(config.solver.nprofs_per_call, 4000);
        assert_eq!(config.solver.default_month, 8);
        assert_eq!(config.provenance.license, "CC-BY SA 3.0");
        assert_eq!(config.solver.emis_atlas_dir(), PathBuf::from("/opt/rttov/emis_data"));
    }

    #[test]
    fn test_yaml_with_input_sections() {
        let yaml = r#"
source:
  model: nextgems
nextgems:
  zoom: 5
  selection: regional
  extent: [-8, 45, 30, 45]
instrument:
  name: abi
  channels: [13, 14]
  sub_lon: -75.2
solver:
  coef_dir: /data/rttov
  snow_factor: 1.0
  chunked: false
stack:
  isel:
    cell: { step: 4 }
"#;
        let config = SynsatConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.input.source.model, Some(ModelKind::NextGems));
        assert_eq!(config.input.nextgems.zoom, 5);
        assert_eq!(config.input.nextgems.selection, Selection::Regional);
        assert_eq!(config.instrument.name, InstrumentKind::Abi);
        assert_eq!(config.solver.snow_factor, Some(1.0));
        assert!(!config.solver.chunked);
        assert_eq!(config.stack.isel["cell"].indices(10), vec![0, 4, 8]);
        assert_eq!(config.input().nextgems.sub_lon, -75.2);
    }

    #[test]
    fn test_variable_substitution() {
        let yaml = "solver:\n  coef_dir: ${SYNSAT_TEST_UNSET_DIR_1:-/fallback/rttov}\n";
        let config = SynsatConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.solver.coef_dir, PathBuf::from("/fallback/rttov"));
    }

    #[test]
    fn test_invalid_combinations() {
        let mut config = SynsatConfig::default();
        config.solver.nprofs_per_call = 0;
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = SynsatConfig::default();
        config.solver.snow_factor = Some(-0.5);
        assert!(config.validate().is_err());

        let mut config = SynsatConfig::default();
        config.instrument.channels = Some(vec![12]);
        assert!(matches!(config.validate(), Err(SynsatError::UnknownChannel { .. })));

        let mut config = SynsatConfig::default();
        config.input.nextgems.selection = Selection::Regional;
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_dim_slice() {
        let s = DimSlice { start: 1, stop: Some(100), step: 3 };
        assert_eq!(s.indices(8), vec![1, 4, 7]);
    }
}
