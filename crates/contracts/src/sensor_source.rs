//! SensorSource trait - Sensor data source abstraction
//!
//! Decouples the capture engine from concrete sensor implementations, so real
//! CARLA sensors and mock sensors are drained the same way.

use std::sync::Arc;

use crate::{SensorKind, SensorPacket};

/// Sensor data callback type
///
/// Invoked by the simulator off the coordinating thread, once per produced sample.
pub type SensorDataCallback = Arc<dyn Fn(SensorPacket) + Send + Sync>;

/// Sensor data source trait
///
/// # Example
///
/// ```ignore
/// let sensor: Box<dyn SensorSource> = client.sensor_source(actor_id, name, kind)?;
/// sensor.listen(Arc::new(move |packet| {
///     let _ = tx.try_send(packet);
/// }));
/// // ... tick and drain ...
/// sensor.stop();
/// ```
pub trait SensorSource: Send + Sync {
    /// Get sensor ID
    fn sensor_id(&self) -> &str;

    /// Get sensor kind
    fn kind(&self) -> SensorKind;

    /// Register data callback
    ///
    /// Repeated calls are idempotent: only the first callback is registered.
    fn listen(&self, callback: SensorDataCallback);

    /// Stop listening
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
