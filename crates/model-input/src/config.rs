//! Configuration for the source adapters.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use synsat_common::Extent;

use crate::error::InputError;

/// Source families understood by the adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// ERA5-style reanalysis on hybrid model levels.
    Era,
    /// ICON limited-area runs.
    Icon,
    /// nextGEMS storm-resolving output behind a catalog.
    #[serde(rename = "nextgems")]
    NextGems,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Era => "era",
            Self::Icon => "icon",
            Self::NextGems => "nextgems",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "era" | "era5" => Ok(Self::Era),
            "icon" => Ok(Self::Icon),
            "nextgems" | "ngc" => Ok(Self::NextGems),
            other => Err(InputError::UnknownSource(other.to_string())),
        }
    }
}

/// General settings applying to every source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Explicit source family; autodetected from the input name when unset.
    pub model: Option<ModelKind>,

    /// Floor applied to the water-vapour mixing ratio (kg/kg).
    pub qmin: f64,

    /// Rounding interval for packed timestamps (seconds).
    pub time_round_secs: f64,

    /// Dimensions flattened into the profile axis. Chosen from the grid when unset.
    pub profile_dims: Option<Vec<String>>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            model: None,
            qmin: 1.1e-9,
            time_round_secs: 60.0,
            profile_dims: None,
        }
    }
}

/// File-naming flavors of ICON runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IconFlavor {
    /// `{data_type}_{stack}_{domain}_{level_type}_{time}_{suffix}.nc`, single
    /// hydrometeor file, cloud cover as a percentage.
    #[default]
    Ifces2,
    /// `{prefix}_{stack}_{domain}_{level_type}_{time}.nc` on the native grid,
    /// hydrometeors split in two files, no cloud cover output.
    Native,
}

impl FromStr for IconFlavor {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ifces2" => Ok(Self::Ifces2),
            "native" => Ok(Self::Native),
            other => Err(InputError::UnsupportedFlavor(other.to_string())),
        }
    }
}

/// ICON adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IconConfig {
    /// Flavor override; otherwise inferred from the path.
    pub flavor: Option<IconFlavor>,

    /// Georeference file with `clon`/`clat` in radians for native-grid runs.
    pub georef: Option<PathBuf>,

    /// Condensate threshold (kg/kg) for the binary cloud mask.
    pub condensate_threshold: f64,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            flavor: None,
            georef: None,
            condensate_threshold: 1e-9,
        }
    }
}

/// Horizontal pre-selection of unstructured cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    #[default]
    None,
    /// Inside [`NextGemsConfig::extent`].
    Regional,
    /// Viewing zenith at most [`NextGemsConfig::max_zenith`].
    Zenith,
}

impl FromStr for Selection {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "regional" => Ok(Self::Regional),
            "zenith" => Ok(Self::Zenith),
            other => Err(InputError::InvalidConfig(format!("unknown selection '{}'", other))),
        }
    }
}

/// nextGEMS adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NextGemsConfig {
    /// HEALPix zoom level.
    pub zoom: u32,

    /// Output time resolution selector, e.g. `PT15M`.
    pub time_resolution: String,

    /// Catalog entry name.
    pub experiment: String,

    /// Single timestamp to extract; all times when unset.
    pub time: Option<String>,

    pub selection: Selection,

    /// `[lon_min, lon_max, lat_min, lat_max]` for regional selection.
    pub extent: Option<Extent>,

    /// Maximum viewing zenith (degrees) for zenith selection.
    pub max_zenith: f64,

    /// Sub-satellite longitude used by zenith selection.
    pub sub_lon: f64,

    /// Condensate threshold (kg/kg) for the binary cloud mask.
    pub condensate_threshold: f64,
}

impl Default for NextGemsConfig {
    fn default() -> Self {
        Self {
            zoom: 9,
            time_resolution: "PT15M".to_string(),
            experiment: "ngc4008a".to_string(),
            time: None,
            selection: Selection::None,
            extent: None,
            max_zenith: 80.0,
            sub_lon: 0.0,
            condensate_threshold: 1e-9,
        }
    }
}

/// All adapter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub source: SourceConfig,
    pub icon: IconConfig,
    pub nextgems: NextGemsConfig,
}

impl InputConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `SYNSAT_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("SYNSAT_MODEL") {
            if let Ok(kind) = val.parse() {
                self.source.model = Some(kind);
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_QMIN") {
            if let Ok(qmin) = val.parse() {
                self.source.qmin = qmin;
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_TIME_ROUND_SECS") {
            if let Ok(secs) = val.parse() {
                self.source.time_round_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_PROFILE_DIMS") {
            self.source.profile_dims = Some(val.split(',').map(|s| s.trim().to_string()).collect());
        }

        if let Ok(val) = std::env::var("SYNSAT_ICON_FLAVOR") {
            if let Ok(flavor) = val.parse() {
                self.icon.flavor = Some(flavor);
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_ICON_GEOREF") {
            self.icon.georef = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("SYNSAT_ICON_CONDENSATE_THRESHOLD") {
            if let Ok(t) = val.parse() {
                self.icon.condensate_threshold = t;
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_NEXTGEMS_ZOOM") {
            if let Ok(zoom) = val.parse() {
                self.nextgems.zoom = zoom;
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_NEXTGEMS_TIME_RESOLUTION") {
            self.nextgems.time_resolution = val;
        }

        if let Ok(val) = std::env::var("SYNSAT_NEXTGEMS_EXPERIMENT") {
            self.nextgems.experiment = val;
        }

        if let Ok(val) = std::env::var("SYNSAT_NEXTGEMS_TIME") {
            self.nextgems.time = Some(val);
        }

        if let Ok(val) = std::env::var("SYNSAT_NEXTGEMS_SELECTION") {
            if let Ok(sel) = val.parse() {
                self.nextgems.selection = sel;
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_NEXTGEMS_EXTENT") {
            if let Ok(extent) = Extent::parse(&val) {
                self.nextgems.extent = Some(extent);
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_NEXTGEMS_MAX_ZENITH") {
            if let Ok(z) = val.parse() {
                self.nextgems.max_zenith = z;
            }
        }

        if let Ok(val) = std::env::var("SYNSAT_NEXTGEMS_CONDENSATE_THRESHOLD") {
            if let Ok(t) = val.parse() {
                self.nextgems.condensate_threshold = t;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), InputError> {
        if !(self.source.qmin > 0.0) {
            return Err(InputError::InvalidConfig("qmin must be > 0".to_string()));
        }

        if !(self.source.time_round_secs > 0.0) {
            return Err(InputError::InvalidConfig("time_round_secs must be > 0".to_string()));
        }

        if let Some(dims) = &self.source.profile_dims {
            if dims.is_empty() {
                return Err(InputError::InvalidConfig("profile_dims must not be empty".to_string()));
            }
        }

        if self.icon.condensate_threshold < 0.0 || self.nextgems.condensate_threshold < 0.0 {
            return Err(InputError::InvalidConfig(
                "condensate thresholds must be >= 0".to_string(),
            ));
        }

        match (self.nextgems.selection, &self.nextgems.extent) {
            (Selection::Regional, None) => {
                return Err(InputError::MissingConfig(
                    "nextgems.extent is required for regional selection".to_string(),
                ));
            }
            (_, Some(extent)) => extent.validate()?,
            _ => {}
        }

        if !(0.0..=90.0).contains(&self.nextgems.max_zenith) {
            return Err(InputError::InvalidConfig("max_zenith must be within [0, 90]".to_string()));
        }

        Ok(())
    }
}
