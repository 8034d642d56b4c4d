//! Real CARLA client implementation
//!
//! Connects to CARLA server using carla-rust crate. The batch API is applied
//! command by command on the client side, so per-item outcomes keep the same
//! shape as a server-side batch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use carla::client::{ActorBase, Client, Sensor, Vehicle, WalkerAIController, World};
use carla::geom::{Location as CarlaLocation, Rotation, Transform as CarlaTransform};
use carla::rpc::{VehicleLightState as CarlaLightState, WeatherParameters};
use contracts::{
    ActorId, ActorInfo, BatchCommand, CommandError, CommandOutcome, Location, SensorKind,
    SensorSource, Transform, VehicleLightState, WeatherParams,
};
use tracing::{debug, info, instrument, warn};

use crate::carla_sensor_source::CarlaSensorSource;
use crate::client::{matches_filter, CarlaClient, ReplayRequest, SimulationMode};
use crate::error::{ActorFactoryError, Result};

/// Real CARLA client
///
/// Wraps carla-rust's Client, implements CarlaClient trait.
/// Uses Mutex for interior mutability, allowing `&self` methods to modify World.
#[derive(Default, Clone)]
pub struct RealCarlaClient {
    client: Arc<Mutex<Option<Client>>>,
    world: Arc<Mutex<Option<World>>>,
    /// Sensors spawned through this client, kept alive for listening
    sensors: Arc<Mutex<HashMap<ActorId, Sensor>>>,
    timeout: Duration,
}

impl RealCarlaClient {
    /// Create new client (disconnected state)
    pub fn new() -> Self {
        Self::default()
    }

    fn not_connected() -> ActorFactoryError {
        ActorFactoryError::ConnectionFailed {
            message: "not connected to CARLA server".into(),
        }
    }

    /// Access World with mutable reference, ensuring connected
    fn with_world_mut<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut World) -> Result<R>,
    {
        let mut guard = self.world.lock().map_err(|_| Self::not_connected())?;
        let world = guard.as_mut().ok_or_else(Self::not_connected)?;
        f(world)
    }

    fn with_client_mut<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Client) -> Result<R>,
    {
        let mut guard = self.client.lock().map_err(|_| Self::not_connected())?;
        let client = guard.as_mut().ok_or_else(Self::not_connected)?;
        f(client)
    }

    /// Convert internal Transform to CARLA Transform
    fn to_carla_transform(transform: Transform) -> CarlaTransform {
        CarlaTransform {
            location: Self::to_carla_location(transform.location),
            rotation: Rotation {
                pitch: transform.rotation.pitch as f32,
                yaw: transform.rotation.yaw as f32,
                roll: transform.rotation.roll as f32,
            },
        }
    }

    fn to_carla_location(location: Location) -> CarlaLocation {
        CarlaLocation {
            x: location.x as f32,
            y: location.y as f32,
            z: location.z as f32,
        }
    }

    fn from_carla_transform(transform: &CarlaTransform) -> Transform {
        Transform {
            location: Location {
                x: transform.location.x as f64,
                y: transform.location.y as f64,
                z: transform.location.z as f64,
            },
            rotation: contracts::Rotation {
                pitch: transform.rotation.pitch as f64,
                yaw: transform.rotation.yaw as f64,
                roll: transform.rotation.roll as f64,
            },
        }
    }

    fn to_carla_weather(params: &WeatherParams) -> WeatherParameters {
        WeatherParameters {
            cloudiness: params.cloudiness as f32,
            precipitation: params.precipitation as f32,
            precipitation_deposits: params.precipitation_deposits as f32,
            wind_intensity: params.wind_intensity as f32,
            fog_density: params.fog_density as f32,
            fog_distance: params.fog_distance as f32,
            wetness: params.wetness as f32,
            sun_azimuth_angle: params.sun_azimuth_angle as f32,
            sun_altitude_angle: params.sun_altitude_angle as f32,
            ..WeatherParameters::default()
        }
    }

    fn apply_spawn(
        world: &mut World,
        blueprint: &str,
        transform: Transform,
        parent: Option<ActorId>,
        attributes: &[(String, String)],
        autopilot: bool,
    ) -> std::result::Result<ActorId, String> {
        let library = world.blueprint_library();
        let mut bp = library
            .find(blueprint)
            .ok_or_else(|| format!("blueprint '{blueprint}' not found"))?;
        for (key, value) in attributes {
            if !bp.set_attribute(key, value) {
                warn!(key, value, blueprint, "failed to set blueprint attribute");
            }
        }

        let carla_transform = Self::to_carla_transform(transform);
        let actor = match parent {
            Some(parent_id) => {
                let parent_actor = world
                    .actor(parent_id)
                    .ok_or_else(|| format!("parent {parent_id} not found"))?;
                world
                    .spawn_actor_attached(&bp, &carla_transform, &parent_actor, None)
                    .map_err(|e| e.to_string())?
            }
            None => world
                .spawn_actor(&bp, &carla_transform)
                .map_err(|e| e.to_string())?,
        };
        let id = actor.id();

        if autopilot {
            if let Ok(vehicle) = Vehicle::try_from(actor) {
                vehicle.set_autopilot(true);
            }
        }
        Ok(id)
    }

    fn apply_destroy(world: &mut World, actor_id: ActorId) -> std::result::Result<ActorId, String> {
        let actor = world
            .actor(actor_id)
            .ok_or_else(|| format!("actor {actor_id} not found"))?;
        if actor.destroy() {
            Ok(actor_id)
        } else {
            Err(format!("destroy of actor {actor_id} returned false"))
        }
    }

    fn walker_controller(world: &World, controller_id: ActorId) -> Result<WalkerAIController> {
        world
            .actor(controller_id)
            .and_then(|actor| WalkerAIController::try_from(actor).ok())
            .ok_or(ActorFactoryError::ActorNotFound {
                actor_id: controller_id,
            })
    }
}

impl CarlaClient for RealCarlaClient {
    #[instrument(name = "real_carla_connect", skip(self), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout_secs: u64) -> Result<()> {
        let mut client = Client::connect(host, port, None);
        self.timeout = Duration::from_secs(timeout_secs);
        client.set_timeout(self.timeout);
        let world = client.world();

        info!(map = %world.map().name(), "connected to CARLA server");

        *self.client.lock().map_err(|_| Self::not_connected())? = Some(client);
        *self.world.lock().map_err(|_| Self::not_connected())? = Some(world);
        Ok(())
    }

    #[instrument(name = "real_carla_load_world", skip(self))]
    async fn load_world(&self, map: &str) -> Result<()> {
        let world = self.with_client_mut(|client| Ok(client.load_world(map)))?;
        *self.world.lock().map_err(|_| Self::not_connected())? = Some(world);
        Ok(())
    }

    #[instrument(name = "real_carla_recorder_info", skip(self))]
    async fn recorder_info(&self, log_path: &str) -> Result<String> {
        self.with_client_mut(|client| Ok(client.show_recorder_file_info(log_path, false)))
    }

    #[instrument(name = "real_carla_replay_log", skip(self, request), fields(path = %request.path))]
    async fn replay_log(&self, request: &ReplayRequest) -> Result<()> {
        let reply = self.with_client_mut(|client| {
            Ok(client.replay_file(
                &request.path,
                request.start,
                request.duration,
                request.follow_id,
                false,
            ))
        })?;
        debug!(%reply, "replay started");
        Ok(())
    }

    #[instrument(name = "real_carla_start_recorder", skip(self))]
    async fn start_recorder(&self, path: &str) -> Result<()> {
        let reply = self.with_client_mut(|client| Ok(client.start_recorder(path, false)))?;
        debug!(%reply, "recorder started");
        Ok(())
    }

    #[instrument(name = "real_carla_stop_recorder", skip(self))]
    async fn stop_recorder(&self) -> Result<()> {
        self.with_client_mut(|client| {
            client.stop_recorder();
            Ok(())
        })
    }

    #[instrument(name = "real_carla_set_mode", skip(self))]
    async fn set_simulation_mode(&self, mode: SimulationMode) -> Result<()> {
        let timeout = self.timeout;
        self.with_world_mut(|world| {
            let mut settings = world.settings();
            match mode {
                SimulationMode::Synchronous {
                    fixed_delta_seconds,
                } => {
                    settings.synchronous_mode = true;
                    settings.fixed_delta_seconds = Some(fixed_delta_seconds);
                }
                SimulationMode::Asynchronous => {
                    settings.synchronous_mode = false;
                    settings.fixed_delta_seconds = None;
                }
            }
            world.apply_settings(&settings, timeout);
            Ok(())
        })
    }

    async fn tick(&self) -> Result<u64> {
        self.with_world_mut(|world| Ok(world.tick()))
    }

    async fn wait_for_tick(&self) -> Result<u64> {
        self.with_world_mut(|world| Ok(world.wait_for_tick().frame() as u64))
    }

    async fn actors(&self, filter: &str) -> Result<Vec<ActorInfo>> {
        self.with_world_mut(|world| {
            Ok(world
                .actors()
                .iter()
                .filter(|actor| matches_filter(filter, &actor.type_id()))
                .map(|actor| ActorInfo {
                    id: actor.id(),
                    type_id: actor.type_id(),
                    role_name: actor.attributes().iter().find_map(|attr| {
                        (attr.id() == "role_name").then(|| attr.value_string())
                    }),
                })
                .collect())
        })
    }

    async fn spawn_points(&self) -> Result<Vec<Transform>> {
        self.with_world_mut(|world| {
            Ok(world
                .map()
                .recommended_spawn_points()
                .iter()
                .map(Self::from_carla_transform)
                .collect())
        })
    }

    async fn random_navigation_location(&self) -> Result<Option<Location>> {
        self.with_world_mut(|world| {
            Ok(world.random_location_from_navigation().map(|l| Location {
                x: l.x as f64,
                y: l.y as f64,
                z: l.z as f64,
            }))
        })
    }

    async fn blueprint_ids(&self, filter: &str) -> Result<Vec<String>> {
        self.with_world_mut(|world| {
            Ok(world
                .blueprint_library()
                .filter(filter)
                .iter()
                .map(|bp| bp.id())
                .collect())
        })
    }

    #[instrument(
        name = "real_carla_spawn_sensor",
        skip(self, transform, attributes),
        fields(blueprint = %blueprint, parent_id)
    )]
    async fn spawn_sensor(
        &self,
        blueprint: &str,
        transform: Transform,
        parent_id: ActorId,
        attributes: &HashMap<String, String>,
    ) -> Result<ActorId> {
        let sensor = self.with_world_mut(|world| {
            let parent = world.actor(parent_id).ok_or_else(|| {
                ActorFactoryError::sensor_spawn(blueprint, parent_id, "parent actor not found")
            })?;
            let library = world.blueprint_library();
            let mut bp = library.find(blueprint).ok_or_else(|| {
                ActorFactoryError::sensor_spawn(blueprint, parent_id, "blueprint not found")
            })?;
            for (key, value) in attributes {
                if !bp.set_attribute(key, value) {
                    warn!(key, value, "failed to set sensor attribute");
                }
            }
            let actor = world
                .spawn_actor_attached(&bp, &Self::to_carla_transform(transform), &parent, None)
                .map_err(|e| ActorFactoryError::sensor_spawn(blueprint, parent_id, e.to_string()))?;
            Sensor::try_from(actor).map_err(|_| {
                ActorFactoryError::sensor_spawn(blueprint, parent_id, "spawned actor is not a sensor")
            })
        })?;

        let actor_id = sensor.id();
        debug!(actor_id, "sensor spawned and attached");
        self.sensors
            .lock()
            .map_err(|_| Self::not_connected())?
            .insert(actor_id, sensor);
        Ok(actor_id)
    }

    fn sensor_source(
        &self,
        actor_id: ActorId,
        sensor_id: String,
        kind: SensorKind,
    ) -> Option<Box<dyn SensorSource>> {
        let sensor = self.sensors.lock().ok()?.get(&actor_id)?.clone();
        Some(Box::new(CarlaSensorSource::new(sensor_id, kind, sensor)))
    }

    #[instrument(name = "real_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        let sensor = self
            .sensors
            .lock()
            .map_err(|_| Self::not_connected())?
            .remove(&actor_id);
        if let Some(sensor) = sensor {
            if sensor.is_listening() {
                sensor.stop();
            }
            if !sensor.destroy() {
                warn!(actor_id, "destroy sensor returned false");
            }
            return Ok(());
        }

        // Idempotent: return Ok even if not exists
        self.with_world_mut(|world| {
            if let Some(actor) = world.actor(actor_id) {
                if !actor.destroy() {
                    return Err(ActorFactoryError::DestroyFailed {
                        actor_id,
                        message: "destroy returned false".into(),
                    });
                }
            }
            Ok(())
        })
    }

    #[instrument(name = "real_carla_apply_batch", skip(self, commands), fields(size = commands.len()))]
    async fn apply_batch(&self, commands: &[BatchCommand]) -> Result<Vec<CommandOutcome>> {
        self.with_world_mut(|world| {
            Ok(commands
                .iter()
                .map(|command| {
                    let outcome = match command {
                        BatchCommand::SpawnActor {
                            blueprint,
                            transform,
                            parent,
                            attributes,
                            autopilot,
                        } => Self::apply_spawn(
                            world, blueprint, *transform, *parent, attributes, *autopilot,
                        ),
                        BatchCommand::DestroyActor(id) => Self::apply_destroy(world, *id),
                    };
                    outcome.map_err(CommandError::new)
                })
                .collect())
        })
    }

    async fn set_weather(&self, params: &WeatherParams) -> Result<()> {
        let weather = Self::to_carla_weather(params);
        self.with_world_mut(|world| {
            world.set_weather(&weather);
            Ok(())
        })
    }

    async fn set_vehicle_light_state(
        &self,
        vehicle_id: ActorId,
        state: VehicleLightState,
    ) -> Result<()> {
        self.with_world_mut(|world| {
            let vehicle = world
                .actor(vehicle_id)
                .and_then(|actor| Vehicle::try_from(actor).ok())
                .ok_or(ActorFactoryError::ActorNotFound {
                    actor_id: vehicle_id,
                })?;
            vehicle.set_light_state(CarlaLightState::from_bits_truncate(state.0));
            Ok(())
        })
    }

    async fn set_pedestrians_cross_factor(&self, factor: f32) -> Result<()> {
        self.with_world_mut(|world| {
            world.set_pedestrians_cross_factor(factor);
            Ok(())
        })
    }

    async fn start_walker_controller(
        &self,
        controller_id: ActorId,
        target: Location,
        max_speed: f32,
    ) -> Result<()> {
        self.with_world_mut(|world| {
            let mut controller = Self::walker_controller(world, controller_id)?;
            controller.start();
            controller.go_to_location(&Self::to_carla_location(target));
            controller.set_max_speed(max_speed);
            Ok(())
        })
    }

    async fn stop_walker_controller(&self, controller_id: ActorId) -> Result<()> {
        self.with_world_mut(|world| {
            let mut controller = Self::walker_controller(world, controller_id)?;
            controller.stop();
            Ok(())
        })
    }
}
