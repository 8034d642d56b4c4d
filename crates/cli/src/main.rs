//! # CARLA Capture CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Input validation without a simulator
//! - Multi-pass capture of recorder logs
//! - Free-driving log recording and small simulator utilities
//! - Graceful shutdown on Ctrl-C / SIGTERM

mod cli;
mod commands;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_align, run_capture, run_info, run_record, run_spawn_hero, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: (cli.metrics_port != 0).then_some(cli.metrics_port),
        ..ObservabilityConfig::for_verbosity(cli.verbose, cli.quiet)
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "CARLA Capture CLI starting"
    );

    let result = match &cli.command {
        Commands::Capture(args) => run_capture(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args).await,
        Commands::Record(args) => run_record(args).await,
        Commands::SpawnHero(args) => run_spawn_hero(args).await,
        Commands::Align(args) => run_align(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
