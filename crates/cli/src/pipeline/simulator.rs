//! Simulator connection.
//!
//! With the `real-carla` feature the commands talk to a CARLA server; without
//! it they run against the in-memory mock simulator.

use actor_factory::CarlaClient;
use anyhow::{Context, Result};
use contracts::CarlaEndpoint;
use tracing::info;

#[cfg(feature = "real-carla")]
pub type Simulator = actor_factory::RealCarlaClient;

#[cfg(not(feature = "real-carla"))]
pub type Simulator = actor_factory::MockCarlaClient;

/// Connect to the configured endpoint
pub async fn connect(endpoint: &CarlaEndpoint) -> Result<Simulator> {
    #[cfg(feature = "real-carla")]
    info!(
        host = %endpoint.host,
        port = endpoint.port,
        "Connecting to CARLA server..."
    );

    #[cfg(not(feature = "real-carla"))]
    info!(
        host = %endpoint.host,
        port = endpoint.port,
        "Running in MOCK mode (no CARLA server required)"
    );

    let mut client = Simulator::new();
    client
        .connect(&endpoint.host, endpoint.port, endpoint.timeout_secs)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to CARLA at {}:{}",
                endpoint.host, endpoint.port
            )
        })?;

    info!("Connected");
    Ok(client)
}
