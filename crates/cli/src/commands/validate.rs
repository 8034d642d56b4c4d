//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{CameraMount, CaptureSettings, WeatherCondition};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<InputSummary>,
}

#[derive(Serialize)]
struct InputSummary {
    cameras: Vec<String>,
    conditions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    passes_per_log: Option<usize>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(
        cameras = %args.cameras.display(),
        conditions = %args.conditions.display(),
        "Validating inputs"
    );

    let result = validate_inputs(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Input validation failed")
    }
}

fn validate_inputs(args: &ValidateArgs) -> ValidationResult {
    let mut errors = Vec::new();

    let cameras = ConfigLoader::load_cameras(&args.cameras)
        .map_err(|e| errors.push(format!("{}: {}", args.cameras.display(), e)))
        .ok();
    let conditions = ConfigLoader::load_conditions(&args.conditions)
        .map_err(|e| errors.push(format!("{}: {}", args.conditions.display(), e)))
        .ok();
    let settings = match &args.config {
        Some(path) => ConfigLoader::load_settings(path)
            .map_err(|e| errors.push(format!("{}: {}", path.display(), e)))
            .ok(),
        None => None,
    };

    let (Some(cameras), Some(conditions)) = (cameras, conditions) else {
        return ValidationResult {
            valid: false,
            errors,
            warnings: Vec::new(),
            summary: None,
        };
    };

    let warnings = collect_warnings(&cameras, &conditions, settings.as_ref());
    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
        summary: Some(InputSummary {
            cameras: cameras.iter().map(|c| c.name.clone()).collect(),
            conditions: conditions.iter().map(|c| c.name.clone()).collect(),
            passes_per_log: settings
                .as_ref()
                .map(|s| s.ground_truth.len() + conditions.len()),
        }),
    }
}

/// Non-fatal issues
fn collect_warnings(
    cameras: &[CameraMount],
    conditions: &[WeatherCondition],
    settings: Option<&CaptureSettings>,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if cameras.is_empty() {
        warnings.push("No cameras defined - only telemetry will be captured".to_string());
    }
    if conditions.is_empty() {
        warnings.push("No weather conditions - only ground-truth passes will run".to_string());
    }

    let mut seen = std::collections::HashSet::new();
    for condition in conditions {
        if !seen.insert(condition.name.as_str()) {
            warnings.push(format!(
                "Condition '{}' appears more than once; later passes overwrite its folder",
                condition.name
            ));
        }
    }

    if let Some(settings) = settings {
        if settings.capture.trailing_margin_frames == 0 {
            warnings.push("capture.trailing_margin_frames is 0 - the last frames of a log may be incomplete".to_string());
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Inputs are valid");

        if let Some(ref summary) = result.summary {
            println!("\n  Cameras: {}", summary.cameras.join(", "));
            println!("  Conditions: {}", summary.conditions.join(", "));
            if let Some(passes) = summary.passes_per_log {
                println!("  Passes per log: {}", passes);
            }
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Inputs are invalid");
        for error in &result.errors {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn args(dir: &std::path::Path, weather: &str) -> ValidateArgs {
        let cameras = dir.join("rig.cam");
        let conditions = dir.join("weather.csv");
        fs::write(&cameras, "front 0 0 2 0\nrear 0 0 2 180\n").unwrap();
        fs::write(&conditions, weather).unwrap();
        ValidateArgs {
            cameras,
            conditions,
            config: None,
            json: true,
        }
    }

    #[test]
    fn test_valid_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(
            dir.path(),
            "ClearNoon,0,0,0,10,0,0,0,60,0,0\nClearNoon,0,0,0,10,0,0,0,60,0,0\n",
        );

        let result = validate_inputs(&args);
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.cameras, vec!["front", "rear"]);
        assert_eq!(summary.passes_per_log, None);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_out_of_range_condition() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(
            dir.path(),
            "ClearNoon,0,0,0,10,0,0,0,60,0,0\nRainy,50,120,50,10,0,0,0,180,45,0\n",
        );

        let result = validate_inputs(&args);
        assert!(!result.valid);
        assert!(result.summary.is_none());
        assert!(result.errors[0].contains("precipitation"));
    }
}
