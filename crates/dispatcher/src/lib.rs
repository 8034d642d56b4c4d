//! # Dispatcher
//!
//! Frame persistence.
//!
//! Responsibilities:
//! - Map sensor samples to on-disk files under the output layout
//! - Kind-specific transforms (palette, log depth, BGRA swap)
//! - Telemetry records
//! - Post-run frame alignment across sensor folders

pub mod align;
pub mod error;
pub mod layout;
pub mod metrics;
pub mod telemetry;
pub mod transform;
pub mod writer;

pub use align::{align_log_dir, AlignReport};
pub use error::{DispatcherError, Result};
pub use layout::{frame_file_name, OutputLayout, TELEMETRY_DIR};
pub use metrics::{MetricsSnapshot, WriterMetrics};
pub use telemetry::TelemetryRecord;
pub use writer::FrameWriter;
