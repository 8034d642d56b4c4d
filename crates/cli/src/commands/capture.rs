//! `capture` command implementation.

use anyhow::{Context, Result};
use capture::ScenarioRunner;
use config_loader::ConfigLoader;
use tracing::{info, warn};

use crate::cli::CaptureArgs;
use crate::pipeline::{connect, install_shutdown_handler, load_settings, print_scenario_report};

/// Execute the `capture` command
pub async fn run_capture(args: &CaptureArgs) -> Result<()> {
    let mut settings = load_settings(&args.connection)?;

    if let Some(ref output) = args.output {
        info!(output = %output.display(), "Overriding output root from CLI");
        settings.output.root = output.display().to_string();
    }
    if let Some(max_workers) = args.max_workers {
        info!(max_workers, "Overriding max workers from CLI");
        settings.capture.max_workers = max_workers;
    }
    if let Some(margin) = args.trailing_margin {
        info!(trailing_margin = margin, "Overriding trailing margin from CLI");
        settings.capture.trailing_margin_frames = margin;
    }
    if args.no_align {
        settings.output.align_after_run = false;
    }
    ConfigLoader::validate_settings(&settings).context("Invalid settings after CLI overrides")?;

    // Both files are validated before the simulator is touched
    let cameras = ConfigLoader::load_cameras(&args.cameras).with_context(|| {
        format!("Failed to load cameras from {}", args.cameras.display())
    })?;
    let conditions = ConfigLoader::load_conditions(&args.conditions).with_context(|| {
        format!("Failed to load conditions from {}", args.conditions.display())
    })?;

    info!(
        log = %args.log,
        cameras = cameras.len(),
        conditions = conditions.len(),
        ground_truth = ?settings.ground_truth,
        output = %settings.output.root,
        "Inputs loaded"
    );

    let client = connect(&settings.carla).await?;
    let shutdown = install_shutdown_handler();
    let runner = ScenarioRunner::new(client, settings, shutdown);

    match runner.run(&args.log, &cameras, &conditions).await {
        Ok(report) => {
            info!(
                sessions = report.sessions.len(),
                frames = report.summary.total_frames,
                files = report.summary.files_written,
                "Capture completed successfully"
            );
            print_scenario_report(&report);
            Ok(())
        }
        Err(e) if e.is_interrupted() => {
            warn!("Capture interrupted, simulator restored to asynchronous mode");
            Ok(())
        }
        Err(e) => Err(e).context("Capture failed"),
    }
}
