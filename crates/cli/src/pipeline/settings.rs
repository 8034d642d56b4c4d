//! Settings file loading with endpoint overrides.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::CaptureSettings;
use tracing::info;

use crate::cli::ConnectionArgs;

/// Load the settings file (or defaults) and apply host/port overrides
pub fn load_settings(args: &ConnectionArgs) -> Result<CaptureSettings> {
    let mut settings = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading settings");
            ConfigLoader::load_settings(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?
        }
        None => CaptureSettings::default(),
    };

    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding CARLA host from CLI");
        settings.carla.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding CARLA port from CLI");
        settings.carla.port = port;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let args = ConnectionArgs {
            config: None,
            host: None,
            port: Some(3000),
        };
        let settings = load_settings(&args).unwrap();
        assert_eq!(settings.carla.host, CaptureSettings::default().carla.host);
        assert_eq!(settings.carla.port, 3000);
    }

    #[test]
    fn test_file_then_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[carla]\nhost = \"sim-a\"\nport = 2010").unwrap();

        let args = ConnectionArgs {
            config: Some(file.path().to_path_buf()),
            host: Some("sim-b".into()),
            port: None,
        };
        let settings = load_settings(&args).unwrap();
        assert_eq!(settings.carla.host, "sim-b");
        assert_eq!(settings.carla.port, 2010);
    }
}
