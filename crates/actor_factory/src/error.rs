//! Actor Factory error types

use contracts::{ActorId, CommandOutcome, ContractError};
use thiserror::Error;

/// Actor Factory specific error
#[derive(Debug, Error)]
pub enum ActorFactoryError {
    /// CARLA connection error
    #[error("failed to connect to CARLA: {message}")]
    ConnectionFailed { message: String },

    /// Sensor spawn error
    #[error("failed to spawn sensor '{sensor_id}' on actor {parent_id}: {message}")]
    SensorSpawnFailed {
        sensor_id: String,
        parent_id: ActorId,
        message: String,
    },

    /// Destroy error
    #[error("failed to destroy actor {actor_id}: {message}")]
    DestroyFailed { actor_id: ActorId, message: String },

    /// The batch call itself failed; per-item errors travel in the outcomes instead
    ///
    /// `applied` holds the outcomes of the chunks that went through before the
    /// failing one, in request order.
    #[error("batch call failed on chunk {chunk} ({size} commands): {message}")]
    BatchFailed {
        chunk: usize,
        size: usize,
        message: String,
        applied: Vec<CommandOutcome>,
    },

    /// Actor lookup failed
    #[error("actor {actor_id} not found")]
    ActorNotFound { actor_id: ActorId },

    /// Any other simulator call failed
    #[error("simulator call '{operation}' failed: {message}")]
    Simulator { operation: String, message: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl ActorFactoryError {
    /// Create sensor spawn error
    pub fn sensor_spawn(
        sensor_id: impl Into<String>,
        parent_id: ActorId,
        message: impl Into<String>,
    ) -> Self {
        Self::SensorSpawnFailed {
            sensor_id: sensor_id.into(),
            parent_id,
            message: message.into(),
        }
    }

    /// Outcomes already applied when a chunked batch failed
    pub fn applied_outcomes(&self) -> &[CommandOutcome] {
        match self {
            Self::BatchFailed { applied, .. } => applied,
            _ => &[],
        }
    }

    /// Create generic simulator call error
    pub fn simulator(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Simulator {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, ActorFactoryError>;
