//! Recorder log metadata
//!
//! CARLA's `show_recorder_file_info` prints a text report. Only two fixed
//! positions are needed: the map on the second line and the duration on the
//! last-but-one line.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Parsed recorder file info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderInfo {
    /// Map the log was recorded on
    pub map_name: String,

    /// Recorded duration in seconds
    pub duration_secs: f64,
}

impl RecorderInfo {
    /// Parse the text report
    ///
    /// Lines are split on `\n` exactly, so a trailing newline leaves an empty
    /// final element and the duration line is the last-but-one.
    pub fn parse(text: &str) -> Result<Self, ContractError> {
        let lines: Vec<&str> = text.split('\n').collect();
        if lines.len() < 3 {
            return Err(ContractError::recorder_info(format!(
                "expected at least 3 lines, got {}",
                lines.len()
            )));
        }

        let map_name = second_token(lines[1])
            .ok_or_else(|| ContractError::recorder_info("map line has no second token"))?
            .to_string();

        let duration_line = lines[lines.len() - 2];
        let duration_token = second_token(duration_line).ok_or_else(|| {
            ContractError::recorder_info(format!(
                "duration line has no second token: '{duration_line}'"
            ))
        })?;
        let duration_secs: f64 = duration_token.parse().map_err(|_| {
            ContractError::recorder_info(format!("invalid duration '{duration_token}'"))
        })?;

        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(ContractError::recorder_info(format!(
                "duration must be a non-negative number, got {duration_secs}"
            )));
        }

        Ok(Self {
            map_name,
            duration_secs,
        })
    }

    /// Number of lockstep ticks covering the recording
    ///
    /// The epsilon keeps exact multiples (e.g. 10.0 / 0.1) from rounding down.
    pub fn frame_count(&self, fixed_delta_seconds: f64) -> u64 {
        if fixed_delta_seconds <= 0.0 {
            return 0;
        }
        (self.duration_secs / fixed_delta_seconds + 1e-6).floor() as u64
    }
}

/// Base name of a log file: the file stem without directories or extension
pub fn log_base_name(log_path: &str) -> String {
    Path::new(log_path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.split('.').next().unwrap_or(stem).to_string())
        .unwrap_or_else(|| log_path.to_string())
}

fn second_token(line: &str) -> Option<&str> {
    line.split(' ').filter(|t| !t.is_empty()).nth(1)
}
