//! # Contracts
//!
//! Shared data model for the capture tooling. Every other crate depends on this
//! one; it depends on nothing in the workspace.
//!
//! ## Frame Model
//! - The simulator runs in lockstep: one tick produces one sample per sensor
//! - `frame` on a [`SensorPacket`] is the simulator frame number (diagnostics only)
//! - Files on disk are named by the capture frame index, which starts at 0 per session

mod batch;
mod error;
mod recorder;
mod rig;
mod runtime;
mod sensor;
mod sensor_source;
mod settings;
mod weather;

pub use batch::*;
pub use error::*;
pub use recorder::*;
pub use rig::*;
pub use runtime::*;
pub use sensor::*;
pub use sensor_source::{SensorDataCallback, SensorSource};
pub use settings::*;
pub use weather::*;
