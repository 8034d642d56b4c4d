//! Camera-definition file
//!
//! One camera per line: `name x y z yaw`. Lines starting with `#` and blank
//! lines are ignored.

use std::collections::HashSet;

use contracts::{CameraMount, ContractError, Location};

/// Parse every camera line; the first malformed line fails the whole file
pub fn parse_cameras(content: &str, source: &str) -> Result<Vec<CameraMount>, ContractError> {
    let mut mounts = Vec::new();
    let mut names = HashSet::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = idx + 1;
        let mount = parse_line(line, source, line_no)?;

        if !names.insert(mount.name.clone()) {
            return Err(ContractError::config_validation(
                format!("{source}:{line_no}"),
                format!("duplicate camera name '{}'", mount.name),
            ));
        }
        mounts.push(mount);
    }

    Ok(mounts)
}

fn parse_line(line: &str, source: &str, line_no: usize) -> Result<CameraMount, ContractError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 5 {
        return Err(ContractError::config_parse(format!(
            "{source}:{line_no}: expected 5 fields (name x y z yaw), got {}",
            tokens.len()
        )));
    }

    let number = |field: &str, token: &str| -> Result<f64, ContractError> {
        token
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                ContractError::config_parse(format!(
                    "{source}:{line_no}: {field} must be a number, got '{token}'"
                ))
            })
    };

    let location = Location {
        x: number("x", tokens[1])?,
        y: number("y", tokens[2])?,
        z: number("z", tokens[3])?,
    };
    let yaw = number("yaw", tokens[4])?;

    if !(0.0..360.0).contains(&yaw) {
        return Err(ContractError::config_validation(
            format!("{source}:{line_no}.yaw"),
            format!("yaw must be in [0, 360), got {yaw}"),
        ));
    }

    Ok(CameraMount {
        name: tokens[0].to_string(),
        location,
        yaw,
    })
}
