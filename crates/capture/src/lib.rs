//! # Capture
//!
//! Lockstep replay capture.
//!
//! Responsibilities:
//! - Attach sensors to the replayed hero vehicle (`SensorHandle`, `TelemetryRig`)
//! - Drive the simulator one tick at a time under a `Lockstep` guard
//! - Drain and persist exactly one sample per sensor per tick (`FlushScheduler`)
//! - Run every ground-truth and weather pass over a log (`ScenarioRunner`)
//! - Generate free-driving logs (`FleetRecorder`)
//!
//! ## Frame alignment
//!
//! Tick `k` is issued, then every sensor drains and persists one sample as
//! frame `k`, and only then is tick `k + 1` issued. Only the coordinating task
//! ticks or switches modes; flush workers only drain and persist.
//!
//! ## Usage Example
//!
//! ```ignore
//! use capture::{ScenarioRunner, Shutdown};
//!
//! let runner = ScenarioRunner::new(client, settings, Shutdown::never());
//! let report = runner.run("/logs/run1.log", &cameras, &conditions).await?;
//! println!("{}", report.summary);
//! ```

pub mod error;
pub mod fleet_recorder;
pub mod flush;
pub mod handle;
pub mod lockstep;
pub mod runner;
pub mod session;
pub mod shutdown;
pub mod target;
pub mod telemetry;

pub use error::{CaptureError, Result};
pub use fleet_recorder::{hero_command, spawn_hero, FleetRecorder, FleetReport};
pub use flush::{FlushReport, FlushScheduler, FlushTarget};
pub use handle::{sensor_attributes, SensorHandle};
pub use lockstep::Lockstep;
pub use runner::{plan_passes, validate_conditions, ScenarioReport, ScenarioRunner};
pub use session::{CaptureSession, SessionContext, SessionPlan, SessionReport};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use target::CaptureTarget;
pub use telemetry::TelemetryRig;
