//! CARLA client abstraction
//!
//! Everything the capture engine and the fleet generator ask of the simulator.
//! Implemented by the real client (feature `real-carla`) and by the mock.

use std::collections::HashMap;
use std::future::Future;

use contracts::{
    ActorId, ActorInfo, BatchCommand, CommandOutcome, Location, SensorKind, SensorSource,
    Transform, VehicleLightState, WeatherParams,
};

use crate::error::Result;

/// World stepping mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationMode {
    /// Free running; the server advances on its own
    Asynchronous,
    /// Lockstep; the world only advances on an explicit tick
    Synchronous { fixed_delta_seconds: f64 },
}

impl SimulationMode {
    pub fn is_synchronous(&self) -> bool {
        matches!(self, Self::Synchronous { .. })
    }
}

/// Arguments of a recorder replay
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayRequest {
    /// Recorder log path as the server sees it
    pub path: String,
    /// Start offset in seconds
    pub start: f64,
    /// Replay duration in seconds, 0 for the whole log
    pub duration: f64,
    /// Actor the spectator follows, 0 for none
    pub follow_id: ActorId,
}

impl ReplayRequest {
    /// Replay a whole log from the start
    pub fn whole(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            start: 0.0,
            duration: 0.0,
            follow_id: 0,
        }
    }
}

/// CARLA client trait
///
/// Abstracts CARLA core operations for testing and future implementation replacement.
pub trait CarlaClient: Send + Sync {
    /// Connect to CARLA server
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout_secs: u64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Load a map, replacing the current world
    fn load_world(&self, map: &str) -> impl Future<Output = Result<()>> + Send;

    /// Raw recorder info text for a log
    fn recorder_info(&self, log_path: &str) -> impl Future<Output = Result<String>> + Send;

    /// Start replaying a recorded log
    fn replay_log(&self, request: &ReplayRequest) -> impl Future<Output = Result<()>> + Send;

    /// Start recording to `path`
    fn start_recorder(&self, path: &str) -> impl Future<Output = Result<()>> + Send;

    fn stop_recorder(&self) -> impl Future<Output = Result<()>> + Send;

    /// Switch between lockstep and free-running mode
    fn set_simulation_mode(&self, mode: SimulationMode) -> impl Future<Output = Result<()>> + Send;

    /// Advance one step; only valid in synchronous mode
    ///
    /// # Returns
    /// The simulator frame number reached
    fn tick(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Wait for the next server step in asynchronous mode
    fn wait_for_tick(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Live actors whose blueprint id matches a wildcard filter
    fn actors(&self, filter: &str) -> impl Future<Output = Result<Vec<ActorInfo>>> + Send;

    /// Recommended spawn points of the current map
    fn spawn_points(&self) -> impl Future<Output = Result<Vec<Transform>>> + Send;

    /// Random point on the pedestrian navigation mesh
    fn random_navigation_location(&self) -> impl Future<Output = Result<Option<Location>>> + Send;

    /// Blueprint ids matching a wildcard filter
    fn blueprint_ids(&self, filter: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Spawn sensor and attach to parent actor
    ///
    /// # Arguments
    /// * `blueprint` - Blueprint name, e.g., "sensor.camera.rgb"
    /// * `transform` - Pose relative to parent actor
    /// * `parent_id` - Parent actor ID
    /// * `attributes` - Sensor attributes
    fn spawn_sensor(
        &self,
        blueprint: &str,
        transform: Transform,
        parent_id: ActorId,
        attributes: &HashMap<String, String>,
    ) -> impl Future<Output = Result<ActorId>> + Send;

    /// Get sensor data source
    ///
    /// Returns None if the actor is not a sensor this client spawned.
    fn sensor_source(
        &self,
        actor_id: ActorId,
        sensor_id: String,
        kind: SensorKind,
    ) -> Option<Box<dyn SensorSource>>;

    /// Destroy actor
    ///
    /// Idempotent operation: returns Ok if actor doesn't exist
    fn destroy_actor(&self, actor_id: ActorId) -> impl Future<Output = Result<()>> + Send;

    /// Apply commands in one round trip
    ///
    /// The outer error means the call failed as a whole. Otherwise the outcomes
    /// have the same length and order as `commands`.
    fn apply_batch(
        &self,
        commands: &[BatchCommand],
    ) -> impl Future<Output = Result<Vec<CommandOutcome>>> + Send;

    fn set_weather(&self, params: &WeatherParams) -> impl Future<Output = Result<()>> + Send;

    fn set_vehicle_light_state(
        &self,
        vehicle_id: ActorId,
        state: VehicleLightState,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fraction of pedestrians allowed to cross roads
    fn set_pedestrians_cross_factor(&self, factor: f32) -> impl Future<Output = Result<()>> + Send;

    /// Start a walker controller and send it to `target`
    fn start_walker_controller(
        &self,
        controller_id: ActorId,
        target: Location,
        max_speed: f32,
    ) -> impl Future<Output = Result<()>> + Send;

    fn stop_walker_controller(&self, controller_id: ActorId)
        -> impl Future<Output = Result<()>> + Send;
}

/// CARLA-style wildcard match, `*` matches any run of characters
pub fn matches_filter(pattern: &str, id: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == id;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !id.starts_with(first) || !id.ends_with(last) || id.len() < first.len() + last.len() {
        return false;
    }

    // Both ends are char boundaries once the prefix and suffix matched
    let mut rest = &id[first.len()..id.len() - last.len()];
    for middle in &parts[1..parts.len() - 1] {
        match rest.find(middle) {
            Some(pos) => rest = &rest[pos + middle.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_filters() {
        assert!(matches_filter("vehicle.*", "vehicle.audi.tt"));
        assert!(matches_filter("*", "walker.pedestrian.0001"));
        assert!(matches_filter("walker.pedestrian.*", "walker.pedestrian.0001"));
        assert!(matches_filter("*.audi.*", "vehicle.audi.tt"));
        assert!(!matches_filter("vehicle.*", "walker.pedestrian.0001"));
        assert!(matches_filter("controller.ai.walker", "controller.ai.walker"));
        assert!(!matches_filter("vehicle.*.tt", "vehicle.t"));
    }

    #[test]
    fn wildcard_filters_non_ascii_ids() {
        assert!(!matches_filter("*x", "é"));
        assert!(!matches_filter("a*x", "aé"));
        assert!(matches_filter("*é", "café"));
        assert!(matches_filter("walker.*.é*", "walker.piéton.é01"));
    }
}
