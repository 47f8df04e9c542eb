//! Sequential, chunked execution of a solver over a profile stack.
//!
//! ```text
//! Idle -> BatchReady -> Running -> Accumulating -> BatchReady ... -> Done
//!                          \-> Failed
//! ```
//!
//! Chunks run strictly in order against one solver instance. Results are
//! appended in chunk order; a failed chunk contributes nothing and the run
//! stops with the solver's own error.

use tracing::{debug, error, info, warn};

use crate::chunk::ChunkIndex;
use crate::config::SynsatConfig;
use crate::error::{RunError, SynsatError};
use crate::instrument::Instrument;
use crate::profile::{ProfileBatch, ProfileBuilder};
use crate::solver::{Atlas, AtlasKind, Solver, SolverOptions, SurfEmisRefl};
use crate::stack::ProfileStack;

/// Orchestrator progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    BatchReady { chunk: usize },
    Running { chunk: usize },
    Accumulating { chunk: usize },
    Done,
    Failed,
}

/// What the currently loaded atlases were initialised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasKey {
    pub month: u32,
    pub nprofiles: usize,
}

/// Placeholder atlas type for runs without atlases.
#[derive(Debug)]
pub enum NoAtlas {}

impl Atlas for NoAtlas {
    type Error = std::convert::Infallible;

    fn kind(&self) -> AtlasKind {
        match *self {}
    }

    fn load(&mut self, _month: u32, _nprofiles: usize) -> Result<(), Self::Error> {
        match *self {}
    }

    fn emis_brdf(&mut self, _batch: &ProfileBatch, _channels: &[u16]) -> Result<Vec<f64>, Self::Error> {
        match *self {}
    }
}

/// Concatenated `(profile, channel)` result of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    pub nprofiles: usize,
    pub nchannels: usize,
    pub values: Vec<f64>,
}

impl SimulationOutput {
    /// Values of channel column `c` in profile order.
    pub fn channel(&self, c: usize) -> Vec<f64> {
        self.values
            .iter()
            .skip(c)
            .step_by(self.nchannels.max(1))
            .copied()
            .collect()
    }
}

/// Drives one solver instance over a profile stack.
pub struct Orchestrator<S: Solver, A: Atlas = NoAtlas> {
    solver: S,
    atlases: Vec<A>,
    atlas_key: Option<AtlasKey>,
    atlas_loads: usize,
    instrument: Instrument,
    channels: Vec<u16>,
    builder: ProfileBuilder,
    capacity: usize,
    chunked: bool,
    default_month: u32,
    state: RunState,
}

impl<S: Solver, A: Atlas> Orchestrator<S, A> {
    /// Load the instrument coefficients into `solver`.
    pub fn new(mut solver: S, config: &SynsatConfig) -> Result<Self, RunError<S::Error>> {
        let instrument = config.instrument.instrument()?;
        let channels = instrument.channel_numbers();
        let coef_file = instrument.coef_path(&config.solver.coef_dir);
        let options = SolverOptions::from_config(&config.solver);

        info!(
            instrument = %instrument.kind,
            satellite = instrument.satellite,
            channels = ?channels,
            coef_file = %coef_file.display(),
            "Loading instrument coefficients"
        );
        solver
            .load_instrument(&coef_file, &channels, &options)
            .map_err(|e| {
                error!(error = %e, "Failed to load instrument coefficients");
                RunError::Solver(e)
            })?;

        Ok(Self {
            solver,
            atlases: Vec::new(),
            atlas_key: None,
            atlas_loads: 0,
            instrument,
            channels,
            builder: ProfileBuilder::from_config(config),
            capacity: config.solver.nprofs_per_call,
            chunked: config.solver.chunked,
            default_month: config.solver.default_month,
            state: RunState::Idle,
        })
    }

    pub fn with_atlas(mut self, atlas: A) -> Self {
        self.atlases.push(atlas);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn into_solver(self) -> S {
        self.solver
    }

    /// Number of atlas initialisations so far.
    pub fn atlas_loads(&self) -> usize {
        self.atlas_loads
    }

    /// Atlas month for a batch, the configured default without one.
    pub fn atlas_month(&self, batch: Option<&ProfileBatch>) -> u32 {
        batch.map_or(self.default_month, ProfileBatch::month)
    }

    /// Chunks a run over `total` profiles is split into.
    pub fn chunk_index(&self, total: usize) -> Result<ChunkIndex, SynsatError> {
        if self.chunked {
            ChunkIndex::new(total, self.capacity)
        } else {
            ChunkIndex::single(total)
        }
    }

    /// Simulate every profile of `stack`.
    pub fn run(&mut self, stack: &ProfileStack) -> Result<SimulationOutput, RunError<S::Error>> {
        self.state = RunState::Idle;
        let index = self.fail_on(self.chunk_index(stack.len()))?;
        let nchannels = self.channels.len();

        info!(
            nprofiles = stack.len(),
            chunks = index.len(),
            capacity = index.capacity(),
            chunked = self.chunked,
            "Running simulation"
        );

        let mut values = Vec::with_capacity(stack.len() * nchannels);
        for (chunk, range) in index.iter().enumerate() {
            self.state = RunState::BatchReady { chunk };
            let batch = self.fail_on(self.builder.build(stack, range.clone()))?;
            let surf = self.surface_emis_refl(&batch);

            self.state = RunState::Running { chunk };
            let result = match self.call_solver(&batch, &surf) {
                Ok(result) => result,
                Err(e) => {
                    self.state = RunState::Failed;
                    error!(chunk, start = range.start, end = range.end, error = %e, "Solver call failed");
                    return Err(RunError::Solver(e));
                }
            };

            if result.len() != batch.len() * nchannels {
                self.state = RunState::Failed;
                return Err(SynsatError::shape(format!(
                    "solver returned {} values for {} profiles x {} channels",
                    result.len(),
                    batch.len(),
                    nchannels
                ))
                .into());
            }

            self.state = RunState::Accumulating { chunk };
            values.extend(result);
            debug!(chunk, start = range.start, end = range.end, "Chunk done");
        }

        self.state = RunState::Done;
        Ok(SimulationOutput {
            nprofiles: stack.len(),
            nchannels,
            values,
        })
    }

    fn fail_on<T>(&mut self, result: Result<T, SynsatError>) -> Result<T, RunError<S::Error>> {
        result.map_err(|e| {
            self.state = RunState::Failed;
            RunError::Pipeline(e)
        })
    }

    fn call_solver(&mut self, batch: &ProfileBatch, surf: &SurfEmisRefl) -> Result<Vec<f64>, S::Error> {
        self.solver.set_profiles(batch)?;
        self.solver.set_surf_emis_refl(surf)?;
        self.solver.run_direct()?;
        self.solver.bt_refl()
    }

    /// Emissivity/BRDF overrides for a batch; rows stay at -1 where an atlas fails.
    fn surface_emis_refl(&mut self, batch: &ProfileBatch) -> SurfEmisRefl {
        let mut surf = SurfEmisRefl::new(batch.len(), self.channels.len());
        if self.atlases.is_empty() {
            return surf;
        }

        let key = AtlasKey {
            month: self.atlas_month(Some(batch)),
            nprofiles: batch.len(),
        };
        if self.atlas_key != Some(key) {
            debug!(month = key.month, nprofiles = key.nprofiles, "Loading atlases");
            self.atlas_loads += 1;
            let mut loaded = true;
            for atlas in &mut self.atlases {
                if let Err(e) = atlas.load(key.month, key.nprofiles) {
                    warn!(atlas = %atlas.kind(), error = %e, "Atlas load failed, solver computes surface properties");
                    loaded = false;
                }
            }
            if !loaded {
                self.atlas_key = None;
                return surf;
            }
            self.atlas_key = Some(key);
        }

        for atlas in &mut self.atlases {
            let kind = atlas.kind();
            let filled = atlas
                .emis_brdf(batch, &self.channels)
                .map_err(|e| e.to_string())
                .and_then(|v| surf.set_row(kind.row(), &v).map_err(|e| e.to_string()));
            if let Err(e) = filled {
                warn!(atlas = %kind, error = %e, "Atlas lookup failed, solver computes surface properties");
            }
        }
        surf
    }
}
