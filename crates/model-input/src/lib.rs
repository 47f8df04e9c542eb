//! Model input for synthetic satellite imagery.
//!
//! Each source family has an adapter producing the same
//! [`AtmosphericState`]:
//!
//! - [`era::EraAdapter`]: reanalysis on hybrid levels with a monthly surface companion
//! - [`icon::IconAdapter`]: ICON limited-area runs in several naming flavors
//! - [`nextgems::NextGemsAdapter`]: catalog-indexed storm-resolving output
//!
//! [`Source`] picks the adapter once, from configuration or from the input
//! name (see [`detect::detect_model`]).

pub mod catalog;
pub mod config;
pub mod detect;
pub mod era;
pub mod error;
pub mod icon;
pub mod nextgems;
pub mod state;
pub mod zarr;

use std::path::Path;

use tracing::info;

pub use config::{IconConfig, IconFlavor, InputConfig, ModelKind, NextGemsConfig, Selection, SourceConfig};
pub use detect::detect_model;
pub use error::{InputError, Result};
pub use state::{AtmosphericState, HorizontalGrid, CELL_DIM, LEVEL_DIM, REQUIRED_FIELDS};

use era::EraAdapter;
use icon::IconAdapter;
use nextgems::NextGemsAdapter;

/// An adapter resolved for one input.
#[derive(Debug, Clone)]
pub enum Source {
    Era(EraAdapter),
    Icon(IconAdapter),
    NextGems(NextGemsAdapter),
}

impl Source {
    /// Adapter for an explicit family.
    pub fn new(kind: ModelKind, config: InputConfig) -> Self {
        match kind {
            ModelKind::Era => Self::Era(EraAdapter::new(config)),
            ModelKind::Icon => Self::Icon(IconAdapter::new(config)),
            ModelKind::NextGems => Self::NextGems(NextGemsAdapter::new(config)),
        }
    }

    /// Adapter from `config.source.model`, falling back to autodetection.
    pub fn resolve(path: &Path, config: InputConfig) -> Result<Self> {
        config.validate()?;
        let kind = match config.source.model {
            Some(kind) => kind,
            None => {
                let kind = detect_model(path)?;
                info!(input = %path.display(), model = %kind, "Autodetected source family");
                kind
            }
        };
        Ok(Self::new(kind, config))
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Era(_) => ModelKind::Era,
            Self::Icon(_) => ModelKind::Icon,
            Self::NextGems(_) => ModelKind::NextGems,
        }
    }

    /// Open the input and build the canonical state.
    pub fn open(&self, path: &Path) -> Result<AtmosphericState> {
        match self {
            Self::Era(a) => a.open(path),
            Self::Icon(a) => a.open(path),
            Self::NextGems(a) => a.open(path),
        }
    }
}

/// Resolve the adapter for `path` and open it.
pub fn open_input(path: &Path, config: InputConfig) -> Result<AtmosphericState> {
    Source::resolve(path, config)?.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_model_skips_detection() {
        let mut config = InputConfig::default();
        config.source.model = Some(ModelKind::Era);
        let source = Source::resolve(Path::new("/data/anything.nc"), config).unwrap();
        assert_eq!(source.kind(), ModelKind::Era);
    }

    #[test]
    fn test_detection_failure_happens_before_io() {
        let err = Source::resolve(Path::new("/nonexistent/wrfout.nc"), InputConfig::default())
            .unwrap_err();
        assert!(matches!(err, InputError::UnknownSource(_)));
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = InputConfig::default();
        config.source.qmin = -1.0;
        assert!(Source::resolve(Path::new("/x/era5-3d-a-2020-01-01.nc"), config).is_err());
    }
}
