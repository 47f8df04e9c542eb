//! Synthetic geostationary satellite imagery from model output.
//!
//! # Architecture
//!
//! ```text
//! AtmosphericState (model-input)
//!      │
//!      ▼
//! ProfileStack::new          flatten along the profile dimensions
//!      │
//!      ▼
//! Orchestrator::run
//!      │
//!      ├─► ChunkIndex        ⌈n / nprofs_per_call⌉ ranges
//!      ├─► ProfileBuilder    one ProfileBatch per range
//!      ├─► Atlas             emissivity / BRDF, reloaded on (month, nprofiles) change
//!      └─► Solver            set_profiles → run_direct → bt_refl
//!      │
//!      ▼
//! reassemble                 one field per channel on the original dimensions
//! ```
//!
//! # Example
//!
//! ```ignore
//! use synsat::{simulate, CommandSolver, Orchestrator, SynsatConfig};
//!
//! let config = SynsatConfig::load("synsat.yaml".as_ref())?;
//! let state = model_input::open_input("era5-3d-2020-09-12.nc".as_ref(), config.input())?;
//! let solver = CommandSolver::new(&config.solver.program)?;
//! let mut orchestrator: Orchestrator<_> = Orchestrator::new(solver, &config)?;
//! let result = simulate(&config, &state, &mut orchestrator)?;
//! ```

pub mod chunk;
pub mod config;
pub mod error;
pub mod external;
pub mod instrument;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod profile;
pub mod solver;
pub mod stack;

pub use chunk::ChunkIndex;
pub use config::{DimSlice, InstrumentConfig, ProvenanceConfig, SolverConfig, StackConfig, SynsatConfig};
pub use error::{Result, RunError, SynsatError};
pub use external::{CommandAtlas, CommandError, CommandSolver};
pub use instrument::{Channel, ChannelKind, Instrument, InstrumentKind};
pub use orchestrator::{AtlasKey, NoAtlas, Orchestrator, RunState, SimulationOutput};
pub use output::{reassemble, write_result, Provenance};
pub use pipeline::{simulate, stack_state};
pub use profile::{Gas, ProfileBatch, ProfileBuilder};
pub use solver::{Atlas, AtlasKind, Solver, SolverOptions, SurfEmisRefl};
pub use stack::ProfileStack;
