//! # Ingestion
//!
//! Sensor sample ingestion.
//!
//! Responsibilities:
//! - Register a callback on a `SensorSource` (mock or real)
//! - Queue samples losslessly, one inbox per sensor
//! - Let the capture engine drain exactly one sample per tick
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::SensorInbox;
//!
//! let source = client.sensor_source(actor_id, "front".into(), SensorKind::Rgb)?;
//! let inbox = SensorInbox::new(source);
//! inbox.start()?;
//! client.tick().await?;
//! let sample = inbox.recv().await?;
//! ```

mod config;
mod error;
mod inbox;

pub use config::{InboxMetrics, MetricsSnapshot};
pub use contracts::SensorPacket;
pub use error::{IngestionError, Result};
pub use inbox::SensorInbox;
