//! # Actor Factory
//!
//! Everything that talks to the simulator.
//!
//! Responsibilities:
//! - `CarlaClient` abstraction over the real server and the in-memory mock
//! - Sensor spawning and the unified `SensorSource` abstraction
//! - Chunked batch create/destroy with per-item outcomes
//! - Pedestrian/controller pairing
//!
//! ## Feature Flags
//!
//! - `real-carla`: Enable real CARLA client (requires carla crate)

pub mod client;
pub mod error;
pub mod fleet;
pub mod mock_client;
pub mod mock_sensor;

#[cfg(feature = "real-carla")]
pub mod carla_client;
#[cfg(feature = "real-carla")]
pub mod carla_sensor_source;
#[cfg(feature = "real-carla")]
pub mod sensor_data_converter;

pub use client::{matches_filter, CarlaClient, ReplayRequest, SimulationMode};
pub use contracts::{ActorId, SensorSource};
pub use error::{ActorFactoryError, Result};
pub use fleet::{BatchLifecycleManager, PairingOutcome, WalkerSpawn};
pub use mock_client::{MockCarlaClient, MockConfig, MockEvent};
pub use mock_sensor::{MockSensor, MockSensorConfig, MockSensorCore};

#[cfg(feature = "real-carla")]
pub use carla_client::RealCarlaClient;
#[cfg(feature = "real-carla")]
pub use carla_sensor_source::CarlaSensorSource;
