//! `info` command implementation.

use actor_factory::CarlaClient;
use anyhow::{Context, Result};
use contracts::{log_base_name, RecorderInfo};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::pipeline::{connect, load_settings};

/// Recorder info for JSON output
#[derive(Serialize)]
struct LogInfo {
    log_name: String,
    map: String,
    duration_secs: f64,
    fixed_delta_seconds: f64,
    log_frames: u64,
    frames_to_capture: u64,
}

/// Execute the `info` command
pub async fn run_info(args: &InfoArgs) -> Result<()> {
    let settings = load_settings(&args.connection)?;
    let client = connect(&settings.carla).await?;

    info!(log = %args.log, "Querying recorder info");
    let text = client
        .recorder_info(&args.log)
        .await
        .with_context(|| format!("Failed to read recorder info for {}", args.log))?;
    let recorder = RecorderInfo::parse(&text).context("Unexpected recorder info format")?;

    let delta = settings.capture.fixed_delta_seconds;
    let log_frames = recorder.frame_count(delta);
    let log_info = LogInfo {
        log_name: log_base_name(&args.log),
        map: recorder.map_name,
        duration_secs: recorder.duration_secs,
        fixed_delta_seconds: delta,
        log_frames,
        frames_to_capture: log_frames.saturating_sub(settings.capture.trailing_margin_frames),
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&log_info).context("Failed to serialize log info")?;
        println!("{}", json);
    } else {
        print_log_info(&log_info);
    }

    Ok(())
}

fn print_log_info(log: &LogInfo) {
    println!("\n📼 {}", log.log_name);
    println!("   ├─ Map: {}", log.map);
    println!("   ├─ Duration: {:.2}s", log.duration_secs);
    println!(
        "   ├─ Frames: {} at {}s per tick",
        log.log_frames, log.fixed_delta_seconds
    );
    println!("   └─ Frames captured per pass: {}", log.frames_to_capture);
    println!();
}
