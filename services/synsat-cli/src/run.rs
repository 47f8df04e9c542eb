//! The `run` subcommand.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use model_input::ModelKind;
use synsat::{simulate, write_result, AtlasKind, CommandAtlas, CommandSolver, Orchestrator, SynsatConfig};
use tracing::info;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML configuration; defaults plus SYNSAT_* variables when omitted
    #[arg(short, long, env = "SYNSAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Model file or nextGEMS catalog
    #[arg(short, long)]
    pub input: PathBuf,

    /// Result NetCDF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Source family (era, icon, nextgems); detected from the file name when omitted
    #[arg(short, long)]
    pub model: Option<String>,

    /// Run all profiles in one solver call
    #[arg(long)]
    pub no_chunked: bool,

    /// Add this fraction of snow to the ice channel
    #[arg(long)]
    pub snow_factor: Option<f64>,
}

/// Configuration file plus command-line overrides, validated.
pub fn load_config(args: &RunArgs) -> Result<SynsatConfig> {
    let mut config = match &args.config {
        Some(path) => SynsatConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => SynsatConfig::from_env(),
    };

    if let Some(model) = &args.model {
        let kind: ModelKind = model.parse()?;
        config.input.source.model = Some(kind);
    }
    if args.no_chunked {
        config.solver.chunked = false;
    }
    if let Some(s) = args.snow_factor {
        config.solver.snow_factor = Some(s);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        instrument = %config.instrument.name,
        chunked = config.solver.chunked,
        "Starting simulation"
    );

    let state = model_input::open_input(&args.input, config.input())
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    let program = &config.solver.program;
    let solver = CommandSolver::new(program)?;
    let mut orchestrator = Orchestrator::new(solver, &config)?
        .with_atlas(CommandAtlas::new(AtlasKind::Emissivity, program, config.solver.emis_atlas_dir())?)
        .with_atlas(CommandAtlas::new(AtlasKind::Brdf, program, config.solver.brdf_atlas_dir())?);

    let result = simulate(&config, &state, &mut orchestrator).context("Simulation failed")?;
    write_result(&args.output, &result)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(output = %args.output.display(), channels = result.field_names().len(), "Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(model: Option<&str>) -> RunArgs {
        RunArgs {
            config: None,
            input: PathBuf::from("era5-3d-2020-09-12.nc"),
            output: PathBuf::from("out.nc"),
            model: model.map(str::to_string),
            no_chunked: true,
            snow_factor: Some(0.25),
        }
    }

    #[test]
    fn test_overrides() {
        let config = load_config(&args(Some("icon"))).unwrap();
        assert_eq!(config.input.source.model, Some(ModelKind::Icon));
        assert!(!config.solver.chunked);
        assert_eq!(config.solver.snow_factor, Some(0.25));
    }

    #[test]
    fn test_unknown_model() {
        assert!(load_config(&args(Some("wrf"))).is_err());
    }

    #[test]
    fn test_negative_snow_factor() {
        let mut a = args(None);
        a.snow_factor = Some(-1.0);
        assert!(load_config(&a).is_err());
    }
}
