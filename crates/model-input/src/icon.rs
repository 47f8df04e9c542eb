//! ICON limited-area model input.
//!
//! A run is split over several files that share one naming grammar per
//! [`IconFlavor`]: the main 3-D stack, one or two hydrometeor stacks and a
//! surface stack. Starting from the main file, the companions are located by
//! rewriting the variable-stack (and data-type) segment of its name.
//!
//! | flavor | grammar | hydrometeors | cloud cover |
//! |---|---|---|---|
//! | `ifces2` | `{data_type}_{stack}_{domain}_{level_type}_{time}_{suffix}.nc` | `full_qmix` | `clc` in % |
//! | `native` | `{prefix}_{stack}_{domain}_{level_type}_{time}.nc` | `cloud` + `precip` | condensate mask |

use std::path::{Path, PathBuf};

use netcdf_parser::{read_dataset, read_dataset_with, ReadOptions};
use synsat_common::Dataset;
use tracing::{debug, info};

use crate::config::{IconConfig, IconFlavor, InputConfig, ModelKind};
use crate::error::{InputError, Result};
use crate::state::{condensate_mask, remap_fields, AtmosphericState, CELL_DIM, LEVEL_DIM};

/// Vertical dimension in ICON output.
const HEIGHT_DIM: &str = "height";

/// Cell dimension of native-grid output.
const NATIVE_CELL_DIM: &str = "ncells";

/// How cloud fraction is obtained for a flavor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CloudCover {
    /// Read from a variable given in percent.
    Percentage(&'static str),
    /// Binary mask over the listed condensate variables (missing ones are skipped).
    CondensateMask(&'static [&'static str]),
}

impl IconFlavor {
    /// Infer the flavor from a path.
    pub fn detect(path: &Path) -> Option<Self> {
        let full = path.to_string_lossy().to_lowercase();
        if full.contains("ifces2") {
            Some(Self::Ifces2)
        } else if full.contains("native") {
            Some(Self::Native)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ifces2 => "ifces2",
            Self::Native => "native",
        }
    }

    /// Variable stacks holding the hydrometeors, merged in this order.
    pub fn hydrometeor_stacks(&self) -> &'static [&'static str] {
        match self {
            Self::Ifces2 => &["full_qmix"],
            Self::Native => &["cloud", "precip"],
        }
    }

    /// `(data_type, stack)` of the surface file; `None` keeps the data type.
    pub fn surface_stack(&self) -> (Option<&'static str>, &'static str) {
        match self {
            Self::Ifces2 => (Some("2d"), "surface"),
            Self::Native => (None, "surface"),
        }
    }

    /// Source name to canonical name.
    pub fn name_table(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Ifces2 => &[
                ("pres", "p"),
                ("temp", "t"),
                ("qv", "q"),
                ("qc", "clwc"),
                ("qi", "ciwc"),
                ("qs", "cswc"),
                ("t_s", "SKT"),
                ("t_2m", "T2M"),
                ("pres_sfc", "SP"),
                ("clc", "cc"),
            ],
            Self::Native => &[
                ("pres", "p"),
                ("temp", "t"),
                ("qv", "q"),
                ("qc", "clwc"),
                ("qi", "ciwc"),
                ("qs", "cswc"),
                ("t_g", "SKT"),
                ("t_2m", "T2M"),
                ("pres_sfc", "SP"),
                ("clc", "cc"),
            ],
        }
    }

    pub fn cloud_cover(&self) -> CloudCover {
        match self {
            Self::Ifces2 => CloudCover::Percentage("clc"),
            Self::Native => CloudCover::CondensateMask(&["qc", "qi", "qs", "qr"]),
        }
    }
}

/// Decomposed ICON file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconFileName {
    pub directory: PathBuf,
    pub flavor: IconFlavor,
    /// `data_type` for ifces2, free prefix for native files.
    pub data_type: String,
    pub variable_stack: String,
    pub domain: String,
    pub level_type: String,
    pub time_str: String,
    /// Post-processing suffix (ifces2 only).
    pub postproc_suffix: Option<String>,
}

impl IconFileName {
    pub fn parse(path: &Path, flavor: IconFlavor) -> Result<Self> {
        let display = path.display().to_string();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| InputError::file_name(&display, "no file name"))?;
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();

        match flavor {
            IconFlavor::Ifces2 => {
                // `full_qmix` is the only stack containing an underscore
                let protected = stem.replace("full_", "full-");
                let parts: Vec<&str> = protected.split('_').collect();
                let [data_type, stack, domain, level_type, time_str, suffix] = parts.as_slice()
                else {
                    return Err(InputError::file_name(
                        &display,
                        format!("expected 6 '_'-separated parts for ifces2, found {}", parts.len()),
                    ));
                };
                Ok(Self {
                    directory,
                    flavor,
                    data_type: data_type.to_string(),
                    variable_stack: stack.replace("full-", "full_"),
                    domain: domain.to_string(),
                    level_type: level_type.to_string(),
                    time_str: time_str.to_string(),
                    postproc_suffix: Some(suffix.to_string()),
                })
            }
            IconFlavor::Native => {
                let parts: Vec<&str> = stem.split('_').collect();
                let [prefix, stack, domain, level_type, time_str] = parts.as_slice() else {
                    return Err(InputError::file_name(
                        &display,
                        format!("expected 5 '_'-separated parts for native, found {}", parts.len()),
                    ));
                };
                Ok(Self {
                    directory,
                    flavor,
                    data_type: prefix.to_string(),
                    variable_stack: stack.to_string(),
                    domain: domain.to_string(),
                    level_type: level_type.to_string(),
                    time_str: time_str.to_string(),
                    postproc_suffix: None,
                })
            }
        }
    }

    /// Same name with another variable stack (and optionally data type).
    pub fn with_stack(&self, data_type: Option<&str>, stack: &str) -> Self {
        let mut name = self.clone();
        if let Some(dt) = data_type {
            name.data_type = dt.to_string();
        }
        name.variable_stack = stack.to_string();
        name
    }

    pub fn file_name(&self) -> String {
        match &self.postproc_suffix {
            Some(suffix) => format!(
                "{}_{}_{}_{}_{}_{}.nc",
                self.data_type, self.variable_stack, self.domain, self.level_type, self.time_str, suffix
            ),
            None => format!(
                "{}_{}_{}_{}_{}.nc",
                self.data_type, self.variable_stack, self.domain, self.level_type, self.time_str
            ),
        }
    }

    pub fn to_path(&self) -> PathBuf {
        self.directory.join(self.file_name())
    }

    /// Default georeference file for native-grid runs.
    pub fn georef_path(&self) -> PathBuf {
        self.directory.join(format!("grid_{}.nc", self.domain))
    }
}

/// Read a companion file restricted to the time slots of `main`.
fn companion_at(path: &Path, main: &Dataset, options: &ReadOptions) -> Result<Dataset> {
    read_dataset_with(path, options)?
        .sel_time(&main.time)
        .map_err(|_| InputError::TimeMismatch(path.display().to_string()))
}

/// ICON adapter.
#[derive(Debug, Clone)]
pub struct IconAdapter {
    config: InputConfig,
}

impl IconAdapter {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    fn icon(&self) -> &IconConfig {
        &self.config.icon
    }

    /// Resolve the flavor: explicit configuration first, then the path.
    pub fn flavor_for(&self, path: &Path) -> Result<IconFlavor> {
        self.icon()
            .flavor
            .or_else(|| IconFlavor::detect(path))
            .ok_or_else(|| {
                InputError::UnsupportedFlavor(format!(
                    "cannot infer ICON flavor from '{}', set icon.flavor",
                    path.display()
                ))
            })
    }

    /// Open the main 3-D file with its companions and build the canonical state.
    pub fn open(&self, path: &Path) -> Result<AtmosphericState> {
        let flavor = self.flavor_for(path)?;
        let name = IconFileName::parse(path, flavor)?;
        let options = ReadOptions::default().time_round_secs(self.config.source.time_round_secs);
        let source_ref = path.display().to_string();

        info!(file = %source_ref, flavor = flavor.as_str(), "Opening ICON input");

        let mut ds = read_dataset_with(path, &options)?;

        for stack in flavor.hydrometeor_stacks() {
            let part = name.with_stack(None, stack).to_path();
            debug!(file = %part.display(), "Merging hydrometeor file");
            let hydrometeors = companion_at(&part, &ds, &options)?;
            ds = ds.merge(hydrometeors)?;
        }

        let (data_type, stack) = flavor.surface_stack();
        let surface_path = name.with_stack(data_type, stack).to_path();
        let surface = squeeze_dim(companion_at(&surface_path, &ds, &options)?, HEIGHT_DIM)?;
        let mut ds = surface.merge(ds)?;

        ds.rename_dim(NATIVE_CELL_DIM, CELL_DIM);
        if ds.coord("lon").is_none() || ds.coord("lat").is_none() {
            self.attach_georef(&mut ds, &name)?;
        }

        let ds = self.derive_cloud_cover(ds, flavor, &source_ref)?;
        let mut ds = remap_fields(ds, flavor.name_table(), &source_ref)?;
        ds.rename_dim(HEIGHT_DIM, LEVEL_DIM);

        AtmosphericState::new(ds, ModelKind::Icon, source_ref, self.config.source.qmin)
    }

    /// Put `clc` in [0, 1], from percent or from a condensate mask.
    pub fn derive_cloud_cover(&self, mut ds: Dataset, flavor: IconFlavor, source_ref: &str) -> Result<Dataset> {
        match flavor.cloud_cover() {
            CloudCover::Percentage(name) => {
                let clc = ds
                    .get_field(name)
                    .ok_or_else(|| InputError::missing_field(name, source_ref))?
                    .map(|v| v / 100.0)
                    .with_attr("units", "1");
                ds.insert_field("clc", clc);
            }
            CloudCover::CondensateMask(names) => {
                let parts: Vec<_> = names.iter().filter_map(|n| ds.get_field(n)).collect();
                if parts.is_empty() {
                    return Err(InputError::missing_field(names.join("+"), source_ref));
                }
                debug!(parts = parts.len(), "Deriving cloud cover from condensate");
                let clc = condensate_mask(&parts, self.icon().condensate_threshold)?.with_attr("units", "1");
                ds.insert_field("clc", clc);
            }
        }
        Ok(ds)
    }

    /// Add degree `lon`/`lat` cell coordinates from `clon`/`clat` (radians).
    fn attach_georef(&self, ds: &mut Dataset, name: &IconFileName) -> Result<()> {
        let geo = if ds.has_field("clon") && ds.has_field("clat") {
            None
        } else {
            let path = self
                .icon()
                .georef
                .clone()
                .unwrap_or_else(|| name.georef_path());
            debug!(file = %path.display(), "Reading georeference");
            let mut geo = read_dataset(&path)?;
            geo.rename_dim(NATIVE_CELL_DIM, CELL_DIM);
            Some(geo)
        };
        let geo_ds = geo.as_ref().unwrap_or(&*ds);

        let clon = geo_ds
            .get_field("clon")
            .ok_or_else(|| InputError::missing_field("clon", "georeference"))?
            .map(f64::to_degrees)
            .with_attr("units", "degrees_east");
        let clat = geo_ds
            .get_field("clat")
            .ok_or_else(|| InputError::missing_field("clat", "georeference"))?
            .map(f64::to_degrees)
            .with_attr("units", "degrees_north");

        if let Some(ncell) = ds.dim_len(CELL_DIM) {
            if clon.len() != ncell {
                return Err(InputError::Shape(format!(
                    "georeference has {} cells, data has {}",
                    clon.len(),
                    ncell
                )));
            }
        }

        ds.insert_coord("lon", clon);
        ds.insert_coord("lat", clat);
        Ok(())
    }
}

/// Drop a length-one dimension from every field and remove its coordinate.
fn squeeze_dim(mut ds: Dataset, dim: &str) -> Result<Dataset> {
    ds.remove_coord(dim);
    for name in ds.field_names() {
        let field = ds.field(&name)?;
        if field.has_dim(dim) {
            let squeezed = field.squeeze(dim)?;
            ds.insert_field(name, squeezed);
        }
    }
    Ok(ds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synsat_common::Field;

    #[test]
    fn test_parse_ifces2_name() {
        let path = Path::new("/data/ifces2/3d_full_DOM01_ML_20200912T000000Z_regrid7km.nc");
        let name = IconFileName::parse(path, IconFlavor::Ifces2).unwrap();
        assert_eq!(name.data_type, "3d");
        assert_eq!(name.variable_stack, "full");
        assert_eq!(name.domain, "DOM01");
        assert_eq!(name.time_str, "20200912T000000Z");
        assert_eq!(name.postproc_suffix.as_deref(), Some("regrid7km"));

        assert_eq!(
            name.with_stack(None, "full_qmix").to_path(),
            PathBuf::from("/data/ifces2/3d_full_qmix_DOM01_ML_20200912T000000Z_regrid7km.nc")
        );
        assert_eq!(
            name.with_stack(Some("2d"), "surface").file_name(),
            "2d_surface_DOM01_ML_20200912T000000Z_regrid7km.nc"
        );
    }

    #[test]
    fn test_parse_ifces2_qmix_name() {
        let path = Path::new("3d_full_qmix_DOM01_ML_20200912T000000Z_regrid7km.nc");
        let name = IconFileName::parse(path, IconFlavor::Ifces2).unwrap();
        assert_eq!(name.variable_stack, "full_qmix");
        assert_eq!(name.file_name(), path.to_str().unwrap());
    }

    #[test]
    fn test_parse_native_name() {
        let path = Path::new("/runs/native/icon_main_DOM02_ML_20210701T000000Z.nc");
        let name = IconFileName::parse(path, IconFlavor::Native).unwrap();
        assert_eq!(name.variable_stack, "main");
        assert_eq!(name.postproc_suffix, None);
        assert_eq!(name.georef_path(), PathBuf::from("/runs/native/grid_DOM02.nc"));
        assert_eq!(
            name.with_stack(None, "precip").file_name(),
            "icon_precip_DOM02_ML_20210701T000000Z.nc"
        );
    }

    #[test]
    fn test_bad_names_are_rejected() {
        let path = Path::new("3d_full_DOM01.nc");
        assert!(IconFileName::parse(path, IconFlavor::Ifces2).is_err());
        assert!(IconFileName::parse(path, IconFlavor::Native).is_err());
    }

    #[test]
    fn test_flavor_resolution() {
        let adapter = IconAdapter::new(InputConfig::default());
        assert_eq!(
            adapter.flavor_for(Path::new("/x/ifces2/a.nc")).unwrap(),
            IconFlavor::Ifces2
        );
        assert!(matches!(
            adapter.flavor_for(Path::new("/x/other/a.nc")),
            Err(InputError::UnsupportedFlavor(_))
        ));

        let mut config = InputConfig::default();
        config.icon.flavor = Some(IconFlavor::Native);
        let adapter = IconAdapter::new(config);
        assert_eq!(adapter.flavor_for(Path::new("/x/ifces2/a.nc")).unwrap(), IconFlavor::Native);
    }

    #[test]
    fn test_percentage_cloud_cover() {
        let mut ds = Dataset::new();
        ds.insert_field("clc", Field::vector("height", vec![0.0, 50.0, 100.0]));
        let adapter = IconAdapter::new(InputConfig::default());
        let ds = adapter.derive_cloud_cover(ds, IconFlavor::Ifces2, "mem").unwrap();
        assert_eq!(ds.field("clc").unwrap().values(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_mask_cloud_cover_skips_missing_species() {
        let mut ds = Dataset::new();
        ds.insert_field("qc", Field::vector("height", vec![0.0, 2e-9, 0.0]));
        ds.insert_field("qi", Field::vector("height", vec![0.0, 0.0, 0.0]));
        ds.insert_field("qs", Field::vector("height", vec![0.0, 0.0, 5e-9]));
        let adapter = IconAdapter::new(InputConfig::default());
        let ds = adapter.derive_cloud_cover(ds, IconFlavor::Native, "mem").unwrap();
        assert_eq!(ds.field("clc").unwrap().values(), vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_squeeze_surface_height() {
        let mut ds = Dataset::new();
        ds.insert_coord("height", Field::vector("height", vec![2.0]));
        ds.insert_field(
            "t_2m",
            Field::from_shape_vec(["time", "height", "lat"], &[1, 1, 2], vec![280.0, 281.0]).unwrap(),
        );
        let ds = squeeze_dim(ds, "height").unwrap();
        assert_eq!(ds.field("t_2m").unwrap().dims(), &["time", "lat"]);
        assert!(ds.coord("height").is_none());
    }
}
