//! Batch command protocol
//!
//! A request is an ordered list of commands; a response is a same-length list of
//! per-item outcomes, correlated with the request by position.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ActorId, Transform};

/// One command of a batch call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BatchCommand {
    /// Spawn an actor, optionally attached to a parent, optionally on autopilot
    SpawnActor {
        blueprint: String,
        transform: Transform,
        #[serde(default)]
        parent: Option<ActorId>,
        #[serde(default)]
        attributes: Vec<(String, String)>,
        #[serde(default)]
        autopilot: bool,
    },

    /// Destroy an actor
    DestroyActor(ActorId),
}

impl BatchCommand {
    /// Spawn command without parent, attributes or autopilot
    pub fn spawn(blueprint: impl Into<String>, transform: Transform) -> Self {
        Self::SpawnActor {
            blueprint: blueprint.into(),
            transform,
            parent: None,
            attributes: Vec::new(),
            autopilot: false,
        }
    }

    /// Add an attribute (only meaningful on spawn commands)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::SpawnActor { attributes, .. } = &mut self {
            attributes.push((key.into(), value.into()));
        }
        self
    }

    /// Chain "then enable autopilot on the spawned actor"
    pub fn with_autopilot(mut self) -> Self {
        if let Self::SpawnActor { autopilot, .. } = &mut self {
            *autopilot = true;
        }
        self
    }

    /// Attach to a parent actor
    pub fn attached_to(mut self, parent_id: ActorId) -> Self {
        if let Self::SpawnActor { parent, .. } = &mut self {
            *parent = Some(parent_id);
        }
        self
    }

    pub fn blueprint(&self) -> Option<&str> {
        match self {
            Self::SpawnActor { blueprint, .. } => Some(blueprint),
            Self::DestroyActor(_) => None,
        }
    }
}

/// Per-item failure reported inside an otherwise successful batch
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of one command: the affected actor id, or the item's error
pub type CommandOutcome = Result<ActorId, CommandError>;
