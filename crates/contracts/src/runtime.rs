//! Runtime actor bookkeeping
//!
//! Ids of everything a fleet run created, so teardown can reach all of it.

use serde::{Deserialize, Serialize};

/// CARLA actor handle type
pub type ActorId = u32;

/// Snapshot of a live actor as returned by an actor query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorInfo {
    pub id: ActorId,

    /// Blueprint id, e.g. "vehicle.audi.tt"
    pub type_id: String,

    /// Value of the `role_name` attribute, if any
    pub role_name: Option<String>,
}

/// A pedestrian and the AI controller driving it
///
/// Only built when both spawns succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PedestrianUnit {
    pub walker: ActorId,
    pub controller: ActorId,

    /// Max speed handed to the controller (m/s)
    pub max_speed: f32,
}

/// Runtime fleet roster
///
/// `walkers` and `controllers` hold every id ever created, paired or not;
/// `units` only the complete pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetRoster {
    /// Hero vehicle, if its spawn succeeded
    pub hero: Option<ActorId>,

    /// All vehicles including the hero
    pub vehicles: Vec<ActorId>,

    /// Every spawned pedestrian
    pub walkers: Vec<ActorId>,

    /// Every spawned controller
    pub controllers: Vec<ActorId>,

    /// Complete pedestrian/controller pairs
    pub units: Vec<PedestrianUnit>,
}

impl FleetRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pedestrian-side ids to destroy: controllers first, then walkers
    pub fn pedestrian_actor_ids(&self) -> Vec<ActorId> {
        self.controllers
            .iter()
            .chain(self.walkers.iter())
            .copied()
            .collect()
    }

    /// Controllers that may receive start/navigate/stop calls
    pub fn paired_controllers(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.units.iter().map(|unit| unit.controller)
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty() && self.walkers.is_empty() && self.controllers.is_empty()
    }
}
