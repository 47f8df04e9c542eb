//! End-to-end simulation of one atmospheric state.

use model_input::AtmosphericState;
use synsat_common::Dataset;
use tracing::info;

use crate::config::SynsatConfig;
use crate::error::{Result, RunError};
use crate::orchestrator::Orchestrator;
use crate::output::{reassemble, Provenance};
use crate::solver::{Atlas, Solver};
use crate::stack::ProfileStack;

/// Stack `state` along the configured (or default) profile dimensions.
pub fn stack_state(config: &SynsatConfig, state: &AtmosphericState) -> Result<ProfileStack> {
    let dims = config
        .input
        .source
        .profile_dims
        .clone()
        .unwrap_or_else(|| state.default_profile_dims());
    ProfileStack::new(state, &dims, &config.stack.isel)
}

/// Stack, run and reassemble.
pub fn simulate<S: Solver, A: Atlas>(
    config: &SynsatConfig,
    state: &AtmosphericState,
    orchestrator: &mut Orchestrator<S, A>,
) -> std::result::Result<Dataset, RunError<S::Error>> {
    let stack = stack_state(config, state)?;
    info!(
        source = %state.source(),
        source_ref = %state.source_ref(),
        nprofiles = stack.len(),
        dims = ?stack.dims(),
        "Simulating"
    );

    let output = orchestrator.run(&stack)?;
    let provenance = Provenance::new(&config.provenance, state.source_ref());
    Ok(reassemble(&stack, &output, orchestrator.instrument(), &provenance)?)
}
