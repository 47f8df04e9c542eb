//! Solver and atlas bindings that drive an external program.
//!
//! Profiles and emissivity overrides are exchanged as NetCDF files in a
//! private scratch directory. The program is invoked as
//!
//! ```text
//! {program} run --coef FILE --channels 9,10 --profiles in.nc \
//!     --surf-emis-refl emis.nc --output out.nc [option flags]
//! {program} atlas --kind emis|brdf --month M --path DIR --channels 9,10 \
//!     --profiles in.nc --output out.nc
//! ```
//!
//! and writes `bt_refl(profile, channel)` or `emis_brdf(profile, channel)`.

use std::path::{Path, PathBuf};
use std::process::Command;

use netcdf_parser::{read_dataset, write_dataset, NetCdfError};
use synsat_common::{Dataset, Field};
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use crate::error::SynsatError;
use crate::profile::ProfileBatch;
use crate::solver::{Atlas, AtlasKind, Solver, SolverOptions, SurfEmisRefl};

const PROFILES_FILE: &str = "profiles.nc";
const SURF_FILE: &str = "surf_emis_refl.nc";
const OUTPUT_FILE: &str = "output.nc";

/// Failures of the external program or the file exchange.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("coefficient file {0} not found")]
    MissingCoefficients(PathBuf),

    #[error("atlas directory {0} not found")]
    MissingAtlas(PathBuf),

    #[error("not ready: {0}")]
    NotReady(&'static str),

    #[error("unexpected output: {0}")]
    Output(String),

    #[error(transparent)]
    Batch(#[from] SynsatError),

    #[error(transparent)]
    NetCdf(#[from] NetCdfError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn scratch_dir() -> Result<TempDir, CommandError> {
    Ok(tempfile::Builder::new().prefix("synsat_").tempdir()?)
}

fn channel_list(channels: &[u16]) -> String {
    channels
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Drop a previous call's output so a silent program cannot hand it back.
fn clear_output(path: &Path) -> Result<(), CommandError> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

fn invoke(mut command: Command) -> Result<(), CommandError> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!(command = ?command, "Invoking external program");

    let output = command.output().map_err(|source| CommandError::Spawn {
        program: program.clone(),
        source,
    })?;

    if !output.status.success() {
        return Err(CommandError::Failed {
            program,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Read a `(profile, channel)` variable and check its size.
fn read_matrix(path: &Path, name: &str, nprofiles: usize, nchannels: usize) -> Result<Vec<f64>, CommandError> {
    if !path.is_file() {
        return Err(CommandError::Output(format!("no output written to {}", path.display())));
    }
    let ds = read_dataset(path)?;
    let field = ds
        .get_field(name)
        .ok_or_else(|| CommandError::Output(format!("{} has no '{}'", path.display(), name)))?;
    let field = field
        .transpose(&["profile", "channel"])
        .map_err(|e| CommandError::Output(format!("{}: {}", name, e)))?;

    if field.shape() != [nprofiles, nchannels] {
        return Err(CommandError::Output(format!(
            "'{}' has shape {:?}, expected [{}, {}]",
            name,
            field.shape(),
            nprofiles,
            nchannels
        )));
    }
    Ok(field.values())
}

struct LoadedInstrument {
    coef_file: PathBuf,
    channels: Vec<u16>,
    options: SolverOptions,
}

/// [`Solver`] backed by an external program.
pub struct CommandSolver {
    program: PathBuf,
    scratch: TempDir,
    instrument: Option<LoadedInstrument>,
    nprofiles: Option<usize>,
    has_surf: bool,
    result: Option<Vec<f64>>,
}

impl CommandSolver {
    pub fn new(program: impl Into<PathBuf>) -> Result<Self, CommandError> {
        Ok(Self {
            program: program.into(),
            scratch: scratch_dir()?,
            instrument: None,
            nprofiles: None,
            has_surf: false,
            result: None,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn file(&self, name: &str) -> PathBuf {
        self.scratch.path().join(name)
    }
}

impl Solver for CommandSolver {
    type Error = CommandError;

    fn load_instrument(&mut self, coef_file: &Path, channels: &[u16], options: &SolverOptions) -> Result<(), CommandError> {
        if !coef_file.is_file() {
            return Err(CommandError::MissingCoefficients(coef_file.to_path_buf()));
        }
        self.instrument = Some(LoadedInstrument {
            coef_file: coef_file.to_path_buf(),
            channels: channels.to_vec(),
            options: options.clone(),
        });
        Ok(())
    }

    fn set_profiles(&mut self, batch: &ProfileBatch) -> Result<(), CommandError> {
        write_dataset(&self.file(PROFILES_FILE), &batch.to_dataset()?)?;
        self.nprofiles = Some(batch.len());
        self.has_surf = false;
        self.result = None;
        Ok(())
    }

    fn set_surf_emis_refl(&mut self, surf: &SurfEmisRefl) -> Result<(), CommandError> {
        let [rows, nprofiles, nchannels] = surf.shape();
        let field = Field::from_shape_vec(["row", "profile", "channel"], &[rows, nprofiles, nchannels], surf.values().to_vec())
            .map_err(SynsatError::from)?;
        let mut ds = Dataset::new();
        ds.insert_field("SurfEmisRefl", field);
        write_dataset(&self.file(SURF_FILE), &ds)?;
        self.has_surf = true;
        Ok(())
    }

    fn run_direct(&mut self) -> Result<(), CommandError> {
        let loaded = self
            .instrument
            .as_ref()
            .ok_or(CommandError::NotReady("no instrument loaded"))?;
        let nprofiles = self.nprofiles.ok_or(CommandError::NotReady("no profiles set"))?;

        let output = self.file(OUTPUT_FILE);
        let mut command = Command::new(&self.program);
        command
            .arg("run")
            .arg("--coef")
            .arg(&loaded.coef_file)
            .arg("--channels")
            .arg(channel_list(&loaded.channels))
            .arg("--profiles")
            .arg(self.file(PROFILES_FILE));
        if self.has_surf {
            command.arg("--surf-emis-refl").arg(self.file(SURF_FILE));
        }
        command.arg("--output").arg(&output).args(loaded.options.flags());

        self.result = None;
        clear_output(&output)?;
        invoke(command)?;
        self.result = Some(read_matrix(&output, "bt_refl", nprofiles, loaded.channels.len())?);
        Ok(())
    }

    fn bt_refl(&self) -> Result<Vec<f64>, CommandError> {
        self.result.clone().ok_or(CommandError::NotReady("no completed run"))
    }
}

/// [`Atlas`] backed by an external program.
pub struct CommandAtlas {
    kind: AtlasKind,
    program: PathBuf,
    path: PathBuf,
    scratch: TempDir,
    month: Option<u32>,
}

impl CommandAtlas {
    pub fn new(kind: AtlasKind, program: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Result<Self, CommandError> {
        Ok(Self {
            kind,
            program: program.into(),
            path: path.into(),
            scratch: scratch_dir()?,
            month: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Atlas for CommandAtlas {
    type Error = CommandError;

    fn kind(&self) -> AtlasKind {
        self.kind
    }

    fn load(&mut self, month: u32, _nprofiles: usize) -> Result<(), CommandError> {
        if !self.path.is_dir() {
            self.month = None;
            return Err(CommandError::MissingAtlas(self.path.clone()));
        }
        self.month = Some(month);
        Ok(())
    }

    fn emis_brdf(&mut self, batch: &ProfileBatch, channels: &[u16]) -> Result<Vec<f64>, CommandError> {
        let month = self.month.ok_or(CommandError::NotReady("atlas not loaded"))?;
        let profiles = self.scratch.path().join(PROFILES_FILE);
        let output = self.scratch.path().join(OUTPUT_FILE);
        write_dataset(&profiles, &batch.to_dataset()?)?;

        let mut command = Command::new(&self.program);
        command
            .arg("atlas")
            .arg("--kind")
            .arg(self.kind.as_str())
            .arg("--month")
            .arg(month.to_string())
            .arg("--path")
            .arg(&self.path)
            .arg("--channels")
            .arg(channel_list(channels))
            .arg("--profiles")
            .arg(&profiles)
            .arg("--output")
            .arg(&output);

        clear_output(&output)?;
        invoke(command)?;
        read_matrix(&output, "emis_brdf", batch.len(), channels.len())
    }
}
