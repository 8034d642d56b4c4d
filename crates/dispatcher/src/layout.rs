//! Output directory layout
//!
//! ```text
//! {root}/{log}/{condition}/{sensor}/{000000..}.{ext}
//! {root}/{log}/GPS/{000000..}.txt
//! ```

use std::path::{Path, PathBuf};

/// Folder holding the combined telemetry records
pub const TELEMETRY_DIR: &str = "GPS";

/// Output paths for one recorded log
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    log_name: String,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, log_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            log_name: log_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    /// `{root}/{log}`
    pub fn log_dir(&self) -> PathBuf {
        self.root.join(&self.log_name)
    }

    /// `{root}/{log}/{condition}/{sensor}`
    pub fn sensor_dir(&self, condition: &str, sensor: &str) -> PathBuf {
        self.log_dir().join(condition).join(sensor)
    }

    /// `{root}/{log}/GPS`
    pub fn telemetry_dir(&self) -> PathBuf {
        self.log_dir().join(TELEMETRY_DIR)
    }
}

/// Zero-padded frame file name
pub fn frame_file_name(frame: u64, extension: &str) -> String {
    format!("{frame:06}.{extension}")
}
