//! `synsat` command-line tool.
//!
//! Opens model output, runs the external radiative-transfer program over
//! every profile and writes one NetCDF file with a field per channel.

mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use model_input::detect_model;
use projection::Geostationary;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "synsat")]
#[command(about = "Synthetic geostationary satellite images from model output")]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "info", env = "SYNSAT_LOG_LEVEL")]
    log_level: String,

    /// JSON log output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate an instrument for one model input
    Run(run::RunArgs),

    /// Print satellite azimuth and zenith for a surface point
    Geometry {
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Sub-satellite longitude
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        sub_lon: f64,
    },

    /// Print the source family inferred from a file name
    Detect { path: PathBuf },
}

fn log_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn init_logging(level: Level, json: bool) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(log_level(&cli.log_level), cli.json)?;
    netcdf_parser::silence_hdf5_errors();

    match cli.command {
        Commands::Run(args) => run::run(args),
        Commands::Geometry { lon, lat, sub_lon } => {
            let (azi, zen) = Geostationary::new(sub_lon).azimuth_zenith(lon, lat);
            println!("azimuth={:.4} zenith={:.4}", azi, zen);
            Ok(())
        }
        Commands::Detect { path } => {
            let kind = detect_model(&path).with_context(|| format!("Cannot detect source of {}", path.display()))?;
            println!("{}", kind);
            Ok(())
        }
    }
}
