//! # Config Loader
//!
//! Loads everything a capture run consumes before touching the simulator.
//!
//! Responsibilities:
//! - Parse TOML/JSON capture settings and validate them
//! - Parse the camera-definition file (`.cam`)
//! - Parse and eagerly validate the weather-condition file (`.csv`)
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let settings = ConfigLoader::load_settings(Path::new("capture.toml")).unwrap();
//! let cameras = ConfigLoader::load_cameras(Path::new("rig.cam")).unwrap();
//! let conditions = ConfigLoader::load_conditions(Path::new("weather.csv")).unwrap();
//! println!("{} cameras x {} conditions", cameras.len(), conditions.len());
//! # let _ = settings;
//! ```

mod camera;
mod parser;
mod validator;
mod weather;

pub use parser::ConfigFormat;

use contracts::{CameraMount, CaptureSettings, ContractError, WeatherCondition};
use std::path::Path;
use tracing::debug;

/// Configuration loader
///
/// Provides static methods to load inputs from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load capture settings from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_settings(path: &Path) -> Result<CaptureSettings, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::settings_from_str(&content, format)
    }

    /// Load capture settings from string
    pub fn settings_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CaptureSettings, ContractError> {
        let settings = parser::parse(content, format)?;
        validator::validate(&settings)?;
        Ok(settings)
    }

    /// Re-run validation after settings were changed in code (CLI overrides)
    pub fn validate_settings(settings: &CaptureSettings) -> Result<(), ContractError> {
        validator::validate(settings)
    }

    /// Load the camera-definition file
    pub fn load_cameras(path: &Path) -> Result<Vec<CameraMount>, ContractError> {
        let content = Self::read_file(path)?;
        let mounts = camera::parse_cameras(&content, &path.display().to_string())?;
        debug!(path = %path.display(), cameras = mounts.len(), "loaded camera definitions");
        Ok(mounts)
    }

    /// Parse camera definitions; `source` names the input in error messages
    pub fn cameras_from_str(content: &str, source: &str) -> Result<Vec<CameraMount>, ContractError> {
        camera::parse_cameras(content, source)
    }

    /// Load and validate the weather-condition file
    pub fn load_conditions(path: &Path) -> Result<Vec<WeatherCondition>, ContractError> {
        let content = Self::read_file(path)?;
        let conditions = weather::parse_conditions(&content, &path.display().to_string())?;
        debug!(path = %path.display(), conditions = conditions.len(), "loaded weather conditions");
        Ok(conditions)
    }

    /// Parse and validate weather conditions; `source` names the input in error messages
    pub fn conditions_from_str(
        content: &str,
        source: &str,
    ) -> Result<Vec<WeatherCondition>, ContractError> {
        weather::parse_conditions(content, source)
    }

    /// Serialize settings to TOML string
    pub fn to_toml(settings: &CaptureSettings) -> Result<String, ContractError> {
        toml::to_string_pretty(settings)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize settings to JSON string
    pub fn to_json(settings: &CaptureSettings) -> Result<String, ContractError> {
        serde_json::to_string_pretty(settings)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer settings format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_settings_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[capture]\nmax_workers = 3").unwrap();
        let settings = ConfigLoader::load_settings(file.path()).unwrap();
        assert_eq!(settings.capture.max_workers, 3);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_settings(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn test_settings_validation_runs() {
        let result = ConfigLoader::settings_from_str("[fleet]\nchunk_size = 0", ConfigFormat::Toml);
        assert!(matches!(result, Err(ContractError::ConfigValidation { .. })));
    }

    #[test]
    fn test_load_cameras_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "front 1.5 0.0 2.4 0\nrear -1.5 0.0 2.4 180").unwrap();
        let cameras = ConfigLoader::load_cameras(file.path()).unwrap();
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[1].name, "rear");
    }

    #[test]
    fn test_load_conditions_missing_file() {
        let err = ConfigLoader::load_conditions(Path::new("/nonexistent/weather.csv")).unwrap_err();
        assert!(matches!(err, ContractError::Io(_)));
    }

    #[test]
    fn test_settings_roundtrip_toml() {
        let settings = CaptureSettings::default();
        let text = ConfigLoader::to_toml(&settings).unwrap();
        let back = ConfigLoader::settings_from_str(&text, ConfigFormat::Toml).unwrap();
        assert_eq!(back.fleet.chunk_size, settings.fleet.chunk_size);
    }
}
