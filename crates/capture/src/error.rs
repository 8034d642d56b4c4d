//! Capture error types

use actor_factory::ActorFactoryError;
use contracts::ContractError;
use dispatcher::DispatcherError;
use ingestion::IngestionError;
use thiserror::Error;

/// Capture engine error
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A declared sensor could not be attached
    #[error("failed to attach sensor '{sensor}': {message}")]
    Attach { sensor: String, message: String },

    /// The replay did not produce the vehicle carrying the rig
    #[error("no vehicle with role '{role}' after replay start")]
    HeroNotFound { role: String },

    /// A sensor inbox closed while a sample was expected
    #[error("drain failed for sensor '{sensor_id}': {source}")]
    Drain {
        sensor_id: String,
        #[source]
        source: IngestionError,
    },

    /// Writing a frame failed; fatal because a gap breaks frame alignment
    #[error("persist failed for sensor '{sensor_id}' at frame {frame_index}: {source}")]
    Persist {
        sensor_id: String,
        frame_index: u64,
        #[source]
        source: DispatcherError,
    },

    /// A drain/persist worker panicked or was cancelled
    #[error("flush worker for '{label}' failed: {message}")]
    Worker { label: String, message: String },

    /// Operator interrupt observed
    #[error("capture interrupted")]
    Interrupted,

    #[error(transparent)]
    Simulator(#[from] ActorFactoryError),

    #[error(transparent)]
    Config(#[from] ContractError),

    #[error(transparent)]
    Output(#[from] DispatcherError),
}

impl CaptureError {
    pub fn attach(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Attach {
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    pub fn worker(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Worker {
            label: label.into(),
            message: message.into(),
        }
    }

    /// True for an operator interrupt rather than a fault
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, CaptureError>;
