//! `align` command implementation.

use anyhow::{Context, Result};
use dispatcher::align_log_dir;
use serde::Serialize;
use tracing::info;

use crate::cli::AlignArgs;

#[derive(Serialize)]
struct AlignOutput {
    log_dir: String,
    folders: Vec<String>,
    frame_count: usize,
    removed: usize,
}

/// Execute the `align` command
pub fn run_align(args: &AlignArgs) -> Result<()> {
    if !args.dir.is_dir() {
        anyhow::bail!("Log directory not found: {}", args.dir.display());
    }

    info!(dir = %args.dir.display(), "Aligning captured frames");
    let report = align_log_dir(&args.dir)
        .with_context(|| format!("Failed to align {}", args.dir.display()))?;

    let output = AlignOutput {
        log_dir: args.dir.display().to_string(),
        folders: report
            .folders
            .iter()
            .map(|f| f.display().to_string())
            .collect(),
        frame_count: report.frame_count,
        removed: report.removed,
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&output).context("Failed to serialize align report")?;
        println!("{}", json);
    } else {
        println!("✓ Aligned {} folders in {}", output.folders.len(), output.log_dir);
        println!("  Frames kept per folder: {}", output.frame_count);
        println!("  Files removed: {}", output.removed);
    }

    Ok(())
}
