//! Mock CARLA client
//!
//! In-memory simulator for tests and `--mock` runs, with failure injection.
//!
//! Behaviour mirrors what the capture engine relies on:
//! - `tick()` is only accepted in synchronous mode
//! - every listening sensor emits one sample per step
//! - a replay spawns the hero and background traffic on the next step
//! - batches above `max_batch_size` fail as a whole

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{
    ActorId, ActorInfo, BatchCommand, CommandError, CommandOutcome, Location, Rotation,
    SensorKind, SensorSource, Transform, VehicleLightState, WeatherParams,
};
use tracing::{debug, instrument};

use crate::client::{matches_filter, CarlaClient, ReplayRequest, SimulationMode};
use crate::error::{ActorFactoryError, Result};
use crate::mock_sensor::{MockSensor, MockSensorConfig, MockSensorCore};

/// Mock client configuration
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Map reported by recorder info
    pub map_name: String,
    /// Duration reported by recorder info (seconds)
    pub recorder_duration_secs: f64,
    /// Spawn a hero vehicle when a replay starts
    pub spawn_hero_on_replay: bool,
    pub hero_blueprint: String,
    pub hero_role_name: String,
    /// Non-hero vehicles spawned by a replay
    pub replay_vehicles: usize,
    /// Number of recommended spawn points
    pub spawn_point_count: usize,
    /// Server-side batch size limit
    pub max_batch_size: Option<usize>,
    /// These batch calls (1-based, in call order) fail as a whole
    pub fail_batch_calls: Vec<usize>,
    /// Spawn commands for these blueprints fail per item
    pub fail_blueprints: Vec<String>,
    /// Spawn commands attached to these parents fail per item
    pub fail_parents: Vec<ActorId>,
    /// `spawn_sensor` fails for these blueprints
    pub fail_sensor_blueprints: Vec<String>,
    /// Destroy fails for these actors
    pub fail_destroy: Vec<ActorId>,
    /// Sensor sample shape and delivery
    pub sensor: MockSensorConfig,
    /// Real-time length of one asynchronous step
    pub async_step: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            map_name: "Town03".to_string(),
            recorder_duration_secs: 10.0,
            spawn_hero_on_replay: true,
            hero_blueprint: "vehicle.audi.tt".to_string(),
            hero_role_name: "hero".to_string(),
            replay_vehicles: 2,
            spawn_point_count: 128,
            max_batch_size: None,
            fail_batch_calls: Vec::new(),
            fail_blueprints: Vec::new(),
            fail_parents: Vec::new(),
            fail_sensor_blueprints: Vec::new(),
            fail_destroy: Vec::new(),
            sensor: MockSensorConfig::default(),
            async_step: Duration::from_millis(1),
        }
    }
}

/// Simulator-side event, recorded in call order
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Connected,
    WorldLoaded(String),
    ReplayStarted(String),
    ModeChanged(SimulationMode),
    Tick(u64),
    SensorSpawned { actor_id: ActorId, blueprint: String },
    Destroyed(ActorId),
    Batch { size: usize },
    WeatherSet(WeatherParams),
    LightState { vehicle: ActorId, state: VehicleLightState },
    CrossFactor(f32),
    RecorderStarted(String),
    RecorderStopped,
    ControllerStarted(ActorId),
    ControllerStopped(ActorId),
}

#[derive(Debug, Clone)]
struct MockActor {
    type_id: String,
    role_name: Option<String>,
    parent: Option<ActorId>,
}

struct MockState {
    connected: bool,
    mode: SimulationMode,
    frame: u64,
    actors: BTreeMap<ActorId, MockActor>,
    sensors: HashMap<ActorId, Arc<MockSensorCore>>,
    pending_replay: Option<ReplayRequest>,
    replayed: Vec<ActorId>,
    recording: Option<String>,
    running_controllers: HashMap<ActorId, Location>,
    events: Vec<MockEvent>,
    batch_calls: usize,
    navigation_draws: u64,
}

/// Mock CARLA client
///
/// Cheap to clone; clones share one simulated world.
#[derive(Clone)]
pub struct MockCarlaClient {
    config: Arc<MockConfig>,
    next_actor_id: Arc<AtomicU32>,
    state: Arc<Mutex<MockState>>,
}

impl MockCarlaClient {
    /// Create default mock client
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Create mock client with configuration
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config: Arc::new(config),
            // Start at 1000 for easy identification
            next_actor_id: Arc::new(AtomicU32::new(1000)),
            state: Arc::new(Mutex::new(MockState {
                connected: false,
                mode: SimulationMode::Asynchronous,
                frame: 0,
                actors: BTreeMap::new(),
                sensors: HashMap::new(),
                pending_replay: None,
                replayed: Vec::new(),
                recording: None,
                running_controllers: HashMap::new(),
                events: Vec::new(),
                batch_calls: 0,
                navigation_draws: 0,
            })),
        }
    }

    /// Mock client already in the connected state
    pub fn connected(config: MockConfig) -> Self {
        let client = Self::with_config(config);
        client.state.lock().unwrap().connected = true;
        client
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// Get current live actor count (sensors included)
    pub fn actor_count(&self) -> usize {
        self.state.lock().unwrap().actors.len()
    }

    /// Ids of every live actor
    pub fn all_actor_ids(&self) -> Vec<ActorId> {
        self.state.lock().unwrap().actors.keys().copied().collect()
    }

    pub fn contains_actor(&self, actor_id: ActorId) -> bool {
        self.state.lock().unwrap().actors.contains_key(&actor_id)
    }

    pub fn simulation_mode(&self) -> SimulationMode {
        self.state.lock().unwrap().mode
    }

    pub fn current_frame(&self) -> u64 {
        self.state.lock().unwrap().frame
    }

    /// Number of `apply_batch` calls received, including failed ones
    pub fn batch_call_count(&self) -> usize {
        self.state.lock().unwrap().batch_calls
    }

    /// Snapshot of every recorded event
    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn running_controllers(&self) -> Vec<ActorId> {
        let state = self.state.lock().unwrap();
        let mut ids: Vec<_> = state.running_controllers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().unwrap().recording.is_some()
    }

    fn allocate_actor_id(&self) -> ActorId {
        self.next_actor_id.fetch_add(1, Ordering::SeqCst)
    }

    fn ensure_connected(state: &MockState) -> Result<()> {
        if state.connected {
            Ok(())
        } else {
            Err(ActorFactoryError::ConnectionFailed {
                message: "not connected".into(),
            })
        }
    }

    /// Spawn what a replayed log contains, replacing an earlier replay
    fn materialize_replay(&self, state: &mut MockState) {
        for id in std::mem::take(&mut state.replayed) {
            state.actors.remove(&id);
        }
        if self.config.spawn_hero_on_replay {
            let id = self.allocate_actor_id();
            state.replayed.push(id);
            state.actors.insert(
                id,
                MockActor {
                    type_id: self.config.hero_blueprint.clone(),
                    role_name: Some(self.config.hero_role_name.clone()),
                    parent: None,
                },
            );
        }
        for _ in 0..self.config.replay_vehicles {
            let id = self.allocate_actor_id();
            state.replayed.push(id);
            state.actors.insert(
                id,
                MockActor {
                    type_id: "vehicle.tesla.model3".to_string(),
                    role_name: Some("autopilot".to_string()),
                    parent: None,
                },
            );
        }
    }

    /// Advance one step and fire every listening sensor
    fn step(&self) -> u64 {
        let (frame, timestamp, sensors) = {
            let mut state = self.state.lock().unwrap();
            state.frame += 1;
            let frame = state.frame;
            if let Some(replay) = state.pending_replay.take() {
                debug!(path = %replay.path, "mock replay materialized");
                self.materialize_replay(&mut state);
            }
            let delta = match state.mode {
                SimulationMode::Synchronous {
                    fixed_delta_seconds,
                } => fixed_delta_seconds,
                SimulationMode::Asynchronous => self.config.async_step.as_secs_f64(),
            };
            state.events.push(MockEvent::Tick(frame));
            let sensors: Vec<_> = state.sensors.values().cloned().collect();
            (frame, frame as f64 * delta, sensors)
        };

        // Callbacks run without the world lock held
        for sensor in sensors {
            sensor.emit(frame, timestamp);
        }
        frame
    }

    fn apply_command(&self, state: &mut MockState, command: &BatchCommand) -> CommandOutcome {
        match command {
            BatchCommand::SpawnActor {
                blueprint,
                parent,
                attributes,
                ..
            } => {
                if self.config.fail_blueprints.contains(blueprint) {
                    return Err(CommandError::new(format!(
                        "spawn failed because of collision at spawn position ({blueprint})"
                    )));
                }
                if let Some(parent) = parent {
                    if self.config.fail_parents.contains(parent) {
                        return Err(CommandError::new(format!(
                            "spawn failed for parent {parent}"
                        )));
                    }
                    if !state.actors.contains_key(parent) {
                        return Err(CommandError::new(format!("parent {parent} not found")));
                    }
                }
                let role_name = attributes
                    .iter()
                    .find(|(key, _)| key == "role_name")
                    .map(|(_, value)| value.clone());
                let id = self.allocate_actor_id();
                state.actors.insert(
                    id,
                    MockActor {
                        type_id: blueprint.clone(),
                        role_name,
                        parent: *parent,
                    },
                );
                Ok(id)
            }
            BatchCommand::DestroyActor(actor_id) => {
                if self.config.fail_destroy.contains(actor_id) {
                    return Err(CommandError::new(format!("actor {actor_id} refused destroy")));
                }
                match state.actors.remove(actor_id) {
                    Some(_) => {
                        if let Some(sensor) = state.sensors.remove(actor_id) {
                            sensor.stop();
                        }
                        state.running_controllers.remove(actor_id);
                        state.events.push(MockEvent::Destroyed(*actor_id));
                        Ok(*actor_id)
                    }
                    None => Err(CommandError::new(format!("actor {actor_id} not found"))),
                }
            }
        }
    }
}

impl Default for MockCarlaClient {
    fn default() -> Self {
        Self::new()
    }
}

const MOCK_BLUEPRINTS: &[&str] = &[
    "vehicle.audi.tt",
    "vehicle.audi.a2",
    "vehicle.tesla.model3",
    "vehicle.bmw.grandtourer",
    "vehicle.citroen.c3",
    "vehicle.lincoln.mkz_2017",
    "vehicle.nissan.patrol",
    "vehicle.toyota.prius",
    "vehicle.mercedes.coupe",
    "vehicle.harley-davidson.low_rider",
    "vehicle.yamaha.yzf",
    "vehicle.bh.crossbike",
    "vehicle.diamondback.century",
    "vehicle.gazelle.omafiets",
    "walker.pedestrian.0001",
    "walker.pedestrian.0002",
    "walker.pedestrian.0003",
    "walker.pedestrian.0004",
    "controller.ai.walker",
    "sensor.camera.rgb",
    "sensor.camera.semantic_segmentation",
    "sensor.camera.depth",
    "sensor.other.gnss",
    "sensor.other.imu",
];

impl CarlaClient for MockCarlaClient {
    #[instrument(name = "mock_carla_connect", skip(self), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout_secs: u64) -> Result<()> {
        let _ = timeout_secs;
        let mut state = self.state.lock().unwrap();
        state.connected = true;
        state.events.push(MockEvent::Connected);
        Ok(())
    }

    #[instrument(name = "mock_carla_load_world", skip(self))]
    async fn load_world(&self, map: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_connected(&state)?;
        let sensors: Vec<_> = state.sensors.drain().map(|(_, s)| s).collect();
        for sensor in sensors {
            sensor.stop();
        }
        state.actors.clear();
        state.running_controllers.clear();
        state.events.push(MockEvent::WorldLoaded(map.to_string()));
        Ok(())
    }

    #[instrument(name = "mock_carla_recorder_info", skip(self))]
    async fn recorder_info(&self, log_path: &str) -> Result<String> {
        Self::ensure_connected(&self.state.lock().unwrap())?;
        let frames = (self.config.recorder_duration_secs * 60.0) as u64;
        Ok(format!(
            "Version: 1\nMap: {}\nDate: 01/01/24 00:00:00\n\nFrame 1 at 0 seconds\n\nFrames: {}\nDuration: {} seconds\n",
            self.config.map_name, frames, self.config.recorder_duration_secs
        ))
    }

    #[instrument(name = "mock_carla_replay_log", skip(self, request), fields(path = %request.path))]
    async fn replay_log(&self, request: &ReplayRequest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_connected(&state)?;
        state.pending_replay = Some(request.clone());
        state.events.push(MockEvent::ReplayStarted(request.path.clone()));
        Ok(())
    }

    #[instrument(name = "mock_carla_start_recorder", skip(self))]
    async fn start_recorder(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_connected(&state)?;
        state.recording = Some(path.to_string());
        state.events.push(MockEvent::RecorderStarted(path.to_string()));
        Ok(())
    }

    #[instrument(name = "mock_carla_stop_recorder", skip(self))]
    async fn stop_recorder(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.recording.take().is_some() {
            state.events.push(MockEvent::RecorderStopped);
        }
        Ok(())
    }

    #[instrument(name = "mock_carla_set_mode", skip(self))]
    async fn set_simulation_mode(&self, mode: SimulationMode) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_connected(&state)?;
        state.mode = mode;
        state.events.push(MockEvent::ModeChanged(mode));
        Ok(())
    }

    async fn tick(&self) -> Result<u64> {
        {
            let state = self.state.lock().unwrap();
            Self::ensure_connected(&state)?;
            if !state.mode.is_synchronous() {
                return Err(ActorFactoryError::simulator(
                    "tick",
                    "world is not in synchronous mode",
                ));
            }
        }
        Ok(self.step())
    }

    async fn wait_for_tick(&self) -> Result<u64> {
        Self::ensure_connected(&self.state.lock().unwrap())?;
        tokio::time::sleep(self.config.async_step).await;
        Ok(self.step())
    }

    async fn actors(&self, filter: &str) -> Result<Vec<ActorInfo>> {
        let state = self.state.lock().unwrap();
        Self::ensure_connected(&state)?;
        Ok(state
            .actors
            .iter()
            .filter(|(_, actor)| matches_filter(filter, &actor.type_id))
            .map(|(id, actor)| ActorInfo {
                id: *id,
                type_id: actor.type_id.clone(),
                role_name: actor.role_name.clone(),
            })
            .collect())
    }

    async fn spawn_points(&self) -> Result<Vec<Transform>> {
        Self::ensure_connected(&self.state.lock().unwrap())?;
        Ok((0..self.config.spawn_point_count)
            .map(|i| Transform {
                location: Location {
                    x: (i % 16) as f64 * 10.0,
                    y: (i / 16) as f64 * 10.0,
                    z: 0.5,
                },
                rotation: Rotation {
                    pitch: 0.0,
                    yaw: (i % 4) as f64 * 90.0,
                    roll: 0.0,
                },
            })
            .collect())
    }

    async fn random_navigation_location(&self) -> Result<Option<Location>> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_connected(&state)?;
        state.navigation_draws += 1;
        let n = state.navigation_draws as f64;
        Ok(Some(Location {
            x: n * 3.0,
            y: -n * 2.0,
            z: 0.9,
        }))
    }

    async fn blueprint_ids(&self, filter: &str) -> Result<Vec<String>> {
        Ok(MOCK_BLUEPRINTS
            .iter()
            .filter(|id| matches_filter(filter, id))
            .map(|id| id.to_string())
            .collect())
    }

    #[instrument(
        name = "mock_carla_spawn_sensor",
        skip(self, _transform, attributes),
        fields(blueprint = %blueprint, parent_id)
    )]
    async fn spawn_sensor(
        &self,
        blueprint: &str,
        _transform: Transform,
        parent_id: ActorId,
        attributes: &HashMap<String, String>,
    ) -> Result<ActorId> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_connected(&state)?;

        let kind = SensorKind::from_blueprint(blueprint).ok_or_else(|| {
            ActorFactoryError::sensor_spawn(blueprint, parent_id, "unknown sensor blueprint")
        })?;
        if !state.actors.contains_key(&parent_id) {
            return Err(ActorFactoryError::sensor_spawn(
                blueprint,
                parent_id,
                "parent actor not found",
            ));
        }
        if self
            .config
            .fail_sensor_blueprints
            .iter()
            .any(|b| b == blueprint)
        {
            return Err(ActorFactoryError::sensor_spawn(
                blueprint,
                parent_id,
                "mock failure",
            ));
        }

        let mut sensor_config = self.config.sensor.clone();
        if let Some(w) = attributes.get("image_size_x").and_then(|v| v.parse().ok()) {
            sensor_config.image_width = w;
        }
        if let Some(h) = attributes.get("image_size_y").and_then(|v| v.parse().ok()) {
            sensor_config.image_height = h;
        }

        let actor_id = self.allocate_actor_id();
        state.actors.insert(
            actor_id,
            MockActor {
                type_id: blueprint.to_string(),
                role_name: None,
                parent: Some(parent_id),
            },
        );
        state
            .sensors
            .insert(actor_id, Arc::new(MockSensorCore::new(kind, sensor_config)));
        state.events.push(MockEvent::SensorSpawned {
            actor_id,
            blueprint: blueprint.to_string(),
        });
        Ok(actor_id)
    }

    fn sensor_source(
        &self,
        actor_id: ActorId,
        sensor_id: String,
        kind: SensorKind,
    ) -> Option<Box<dyn SensorSource>> {
        let state = self.state.lock().unwrap();
        let core = state.sensors.get(&actor_id)?;
        if core.kind() != kind {
            return None;
        }
        Some(Box::new(MockSensor::new(sensor_id, core.clone())))
    }

    #[instrument(name = "mock_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        if self.config.fail_destroy.contains(&actor_id) {
            return Err(ActorFactoryError::DestroyFailed {
                actor_id,
                message: "mock failure".into(),
            });
        }

        // Idempotent: return Ok even if not exists
        let mut state = self.state.lock().unwrap();
        if state.actors.remove(&actor_id).is_some() {
            if let Some(sensor) = state.sensors.remove(&actor_id) {
                sensor.stop();
            }
            state.events.push(MockEvent::Destroyed(actor_id));
        }
        Ok(())
    }

    #[instrument(name = "mock_carla_apply_batch", skip(self, commands), fields(size = commands.len()))]
    async fn apply_batch(&self, commands: &[BatchCommand]) -> Result<Vec<CommandOutcome>> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_connected(&state)?;
        state.batch_calls += 1;
        state.events.push(MockEvent::Batch {
            size: commands.len(),
        });

        if self.config.fail_batch_calls.contains(&state.batch_calls) {
            return Err(ActorFactoryError::simulator(
                "apply_batch",
                format!("connection lost during batch call {}", state.batch_calls),
            ));
        }
        if let Some(limit) = self.config.max_batch_size {
            if commands.len() > limit {
                return Err(ActorFactoryError::simulator(
                    "apply_batch",
                    format!("{} commands exceed server limit of {limit}", commands.len()),
                ));
            }
        }

        Ok(commands
            .iter()
            .map(|command| self.apply_command(&mut state, command))
            .collect())
    }

    async fn set_weather(&self, params: &WeatherParams) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_connected(&state)?;
        state.events.push(MockEvent::WeatherSet(*params));
        Ok(())
    }

    async fn set_vehicle_light_state(
        &self,
        vehicle_id: ActorId,
        light_state: VehicleLightState,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.actors.get(&vehicle_id) {
            Some(actor) if actor.type_id.starts_with("vehicle.") => {
                state.events.push(MockEvent::LightState {
                    vehicle: vehicle_id,
                    state: light_state,
                });
                Ok(())
            }
            _ => Err(ActorFactoryError::ActorNotFound {
                actor_id: vehicle_id,
            }),
        }
    }

    async fn set_pedestrians_cross_factor(&self, factor: f32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_connected(&state)?;
        state.events.push(MockEvent::CrossFactor(factor));
        Ok(())
    }

    async fn start_walker_controller(
        &self,
        controller_id: ActorId,
        target: Location,
        max_speed: f32,
    ) -> Result<()> {
        let _ = max_speed;
        let mut state = self.state.lock().unwrap();
        match state.actors.get(&controller_id) {
            Some(actor) if actor.parent.is_some() => {
                state.running_controllers.insert(controller_id, target);
                state.events.push(MockEvent::ControllerStarted(controller_id));
                Ok(())
            }
            _ => Err(ActorFactoryError::ActorNotFound {
                actor_id: controller_id,
            }),
        }
    }

    async fn stop_walker_controller(&self, controller_id: ActorId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.running_controllers.remove(&controller_id).is_some() {
            state.events.push(MockEvent::ControllerStopped(controller_id));
        }
        Ok(())
    }
}
