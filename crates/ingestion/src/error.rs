//! Ingestion error types

use contracts::SensorKind;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Channel closed
    #[error("channel closed for sensor {sensor_id}")]
    ChannelClosed {
        /// Sensor ID
        sensor_id: String,
    },

    /// Sensor is already listening
    #[error("sensor {sensor_id} is already listening")]
    AlreadyListening {
        /// Sensor ID
        sensor_id: String,
    },

    /// Sample kind did not match the sensor it arrived on
    #[error("sensor {sensor_id} expected {expected} samples, got {actual}")]
    KindMismatch {
        sensor_id: String,
        expected: SensorKind,
        actual: SensorKind,
    },
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
