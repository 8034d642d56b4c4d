//! `record` command implementation.

use anyhow::{Context, Result};
use capture::FleetRecorder;
use tracing::{info, warn};

use crate::cli::RecordArgs;
use crate::pipeline::{connect, install_shutdown_handler, load_settings, print_fleet_report};

/// Execute the `record` command
pub async fn run_record(args: &RecordArgs) -> Result<()> {
    let settings = load_settings(&args.connection)?;
    let mut fleet = settings.fleet.clone();

    if let Some(ref map) = args.map {
        info!(map = %map, "Overriding map from CLI");
        fleet.map = map.clone();
    }
    if let Some(seconds) = args.seconds {
        fleet.recorder_seconds = seconds;
    }
    if args.seed.is_some() {
        fleet.seed = args.seed;
    }

    info!(
        map = %fleet.map,
        cars = fleet.cars,
        motorbikes = fleet.motorbikes,
        bicycles = fleet.bicycles,
        walkers = fleet.walkers,
        seconds = fleet.recorder_seconds,
        "Recording free-driving log"
    );

    let client = connect(&settings.carla).await?;
    let shutdown = install_shutdown_handler();
    let mut recorder =
        FleetRecorder::new(client, fleet, settings.capture.hero_role_name.clone(), shutdown);

    let report = recorder
        .record(&args.recorder_path)
        .await
        .context("Recording failed")?;

    if report.interrupted {
        warn!(recorded_secs = report.recorded_secs, "Recording cut short by shutdown signal");
    }

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        print_fleet_report(&report);
    }

    Ok(())
}
