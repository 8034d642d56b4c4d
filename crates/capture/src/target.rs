//! Things a session flushes each tick

use std::path::PathBuf;

use actor_factory::CarlaClient;

use crate::error::Result;
use crate::flush::FlushTarget;
use crate::handle::SensorHandle;
use crate::telemetry::TelemetryRig;

/// One flush unit of a session
#[derive(Debug)]
pub enum CaptureTarget {
    Sensor(SensorHandle),
    Telemetry(TelemetryRig),
}

impl CaptureTarget {
    pub fn output_dir(&self) -> PathBuf {
        match self {
            Self::Sensor(handle) => handle.output_dir(),
            Self::Telemetry(rig) => rig.output_dir(),
        }
    }

    pub fn files_written(&self) -> u64 {
        match self {
            Self::Sensor(handle) => handle.files_written(),
            Self::Telemetry(rig) => rig.files_written(),
        }
    }

    pub fn discard_stale(&self) -> usize {
        match self {
            Self::Sensor(handle) => handle.discard_stale(),
            Self::Telemetry(rig) => rig.discard_stale(),
        }
    }

    pub async fn destroy<C: CarlaClient>(&self, client: &C) -> Result<()> {
        match self {
            Self::Sensor(handle) => handle.destroy(client).await,
            Self::Telemetry(rig) => rig.destroy(client).await,
        }
    }
}

impl FlushTarget for CaptureTarget {
    fn label(&self) -> &str {
        match self {
            Self::Sensor(handle) => handle.sensor_id(),
            Self::Telemetry(_) => "telemetry",
        }
    }

    async fn flush_frame(&self, frame_index: u64) -> Result<()> {
        match self {
            Self::Sensor(handle) => {
                let sample = handle.drain_one_frame().await?;
                handle.persist(sample, frame_index).await?;
            }
            Self::Telemetry(rig) => {
                rig.flush_frame(frame_index).await?;
            }
        }
        Ok(())
    }
}
