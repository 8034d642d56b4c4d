//! Dispatcher error types

use std::path::PathBuf;

use contracts::SensorKind;
use thiserror::Error;

/// Frame persistence errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Filesystem error with the path that caused it
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image encoding failed
    #[error("failed to encode image {path}: {message}")]
    Image { path: PathBuf, message: String },

    /// Record serialization failed
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// Payload variant does not fit the sensor kind
    #[error("sensor '{sensor_id}' ({kind}) cannot persist a {payload} payload")]
    PayloadMismatch {
        sensor_id: String,
        kind: SensorKind,
        payload: &'static str,
    },

    /// Image buffer length disagrees with its dimensions
    #[error("sensor '{sensor_id}' image buffer has {actual} bytes, expected {expected}")]
    MalformedImage {
        sensor_id: String,
        expected: usize,
        actual: usize,
    },
}

impl DispatcherError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatcherError>;
