//! Settings validation
//!
//! Field ranges come from the `validator` derives on the contract types; the
//! checks here cover what a per-field range cannot express:
//! - ground-truth passes are unique
//! - every non-empty fleet group has at least one blueprint
//! - walker speeds are positive
//! - output root is set

use std::collections::HashSet;

use contracts::{CaptureSettings, ContractError};
use validator::Validate;

/// Validate parsed settings
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(settings: &CaptureSettings) -> Result<(), ContractError> {
    settings
        .validate()
        .map_err(|e| ContractError::config_validation("settings", e.to_string()))?;
    validate_ground_truth(settings)?;
    validate_catalog(settings)?;
    validate_output(settings)?;
    Ok(())
}

fn validate_ground_truth(settings: &CaptureSettings) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for pass in &settings.ground_truth {
        if !seen.insert(*pass) {
            return Err(ContractError::config_validation(
                "ground_truth",
                format!("duplicate pass {pass:?}"),
            ));
        }
    }
    Ok(())
}

fn validate_catalog(settings: &CaptureSettings) -> Result<(), ContractError> {
    let fleet = &settings.fleet;
    let catalog = &fleet.catalog;

    let groups = [
        ("cars", fleet.cars, catalog.cars.len()),
        ("motorbikes", fleet.motorbikes, catalog.motorbikes.len()),
        ("bicycles", fleet.bicycles, catalog.bicycles.len()),
    ];
    for (group, count, blueprints) in groups {
        if count > 0 && blueprints == 0 {
            return Err(ContractError::config_validation(
                format!("fleet.catalog.{group}"),
                format!("{count} {group} requested but no blueprints listed"),
            ));
        }
    }

    if catalog.hero.is_empty() {
        return Err(ContractError::config_validation(
            "fleet.catalog.hero",
            "hero blueprint must not be empty",
        ));
    }

    for (field, speed) in [
        ("walking_speed", catalog.walking_speed),
        ("running_speed", catalog.running_speed),
    ] {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(ContractError::config_validation(
                format!("fleet.catalog.{field}"),
                format!("must be > 0, got {speed}"),
            ));
        }
    }
    Ok(())
}

fn validate_output(settings: &CaptureSettings) -> Result<(), ContractError> {
    if settings.output.root.trim().is_empty() {
        return Err(ContractError::config_validation(
            "output.root",
            "output root must not be empty",
        ));
    }
    Ok(())
}
