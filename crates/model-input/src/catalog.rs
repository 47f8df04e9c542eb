//! Local data catalogs for storm-resolving model output.
//!
//! A catalog is a YAML file mapping experiment names to stores:
//!
//! ```yaml
//! sources:
//!   ngc4008a:
//!     description: nextGEMS cycle 4 coupled run
//!     urlpath: "ngc4008a_{time}_{zoom}.zarr"
//!     format: zarr
//! ```
//!
//! `{zoom}` and `{time}` in `urlpath` are replaced by the requested zoom level
//! and time resolution. Relative paths resolve against the catalog's directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InputError, Result};

/// On-disk format of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    #[default]
    Zarr,
    Netcdf,
}

/// One catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub urlpath: String,
    #[serde(default)]
    pub format: StoreFormat,
    #[serde(default)]
    pub description: Option<String>,
}

/// A store resolved for a zoom level and time resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStore {
    pub path: PathBuf,
    pub format: StoreFormat,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    sources: BTreeMap<String, CatalogEntry>,
}

/// A parsed catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    sources: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    /// Load a catalog file.
    pub fn open(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_yaml(&text, root)
    }

    /// Parse catalog YAML; relative store paths resolve against `root`.
    pub fn from_yaml(text: &str, root: PathBuf) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(text)
            .map_err(|e| InputError::Catalog(format!("invalid catalog: {}", e)))?;
        Ok(Self {
            root,
            sources: file.sources,
        })
    }

    pub fn experiments(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn entry(&self, experiment: &str) -> Result<&CatalogEntry> {
        self.sources.get(experiment).ok_or_else(|| {
            InputError::Catalog(format!(
                "experiment '{}' not in catalog (available: {})",
                experiment,
                self.experiments().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// Resolve an experiment's store path.
    pub fn resolve(&self, experiment: &str, zoom: u32, time_resolution: &str) -> Result<ResolvedStore> {
        let entry = self.entry(experiment)?;
        let urlpath = entry
            .urlpath
            .replace("{zoom}", &zoom.to_string())
            .replace("{time}", time_resolution);

        if urlpath.contains('{') {
            return Err(InputError::Catalog(format!(
                "unresolved placeholder in urlpath '{}'",
                entry.urlpath
            )));
        }

        let path = PathBuf::from(&urlpath);
        let path = if path.is_absolute() { path } else { self.root.join(path) };

        debug!(experiment, zoom, path = %path.display(), "Resolved catalog entry");

        Ok(ResolvedStore {
            path,
            format: entry.format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
sources:
  ngc4008a:
    description: coupled run
    urlpath: "ngc4008a_{time}_{zoom}.zarr"
  fixed:
    urlpath: "/abs/fixed.nc"
    format: netcdf
  broken:
    urlpath: "x_{member}.zarr"
"#;

    #[test]
    fn test_resolve_template() {
        let cat = Catalog::from_yaml(CATALOG, PathBuf::from("/cat")).unwrap();
        let store = cat.resolve("ngc4008a", 9, "PT15M").unwrap();
        assert_eq!(store.path, PathBuf::from("/cat/ngc4008a_PT15M_9.zarr"));
        assert_eq!(store.format, StoreFormat::Zarr);
    }

    #[test]
    fn test_absolute_path_and_format() {
        let cat = Catalog::from_yaml(CATALOG, PathBuf::from("/cat")).unwrap();
        let store = cat.resolve("fixed", 9, "PT15M").unwrap();
        assert_eq!(store.path, PathBuf::from("/abs/fixed.nc"));
        assert_eq!(store.format, StoreFormat::Netcdf);
    }

    #[test]
    fn test_unknown_experiment_and_placeholder() {
        let cat = Catalog::from_yaml(CATALOG, PathBuf::from("/cat")).unwrap();
        assert!(matches!(cat.resolve("ngc9999", 9, "PT15M"), Err(InputError::Catalog(_))));
        assert!(matches!(cat.resolve("broken", 9, "PT15M"), Err(InputError::Catalog(_))));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(Catalog::from_yaml("sources: [1, 2", PathBuf::new()).is_err());
    }
}
