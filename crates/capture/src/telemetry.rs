//! Telemetry rig: IMU + GNSS at the vehicle origin, written as one record

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use actor_factory::CarlaClient;
use contracts::{ActorId, SensorKind, SensorPacket, SensorPayload, SensorSpec};
use dispatcher::{DispatcherError, FrameWriter, TelemetryRecord};
use tracing::{instrument, warn};

use crate::error::{CaptureError, Result};
use crate::handle::SensorHandle;

pub const IMU_SENSOR_NAME: &str = "imu";
pub const GNSS_SENSOR_NAME: &str = "gnss";

/// Paired IMU and GNSS sensors drained together each tick
#[derive(Debug)]
pub struct TelemetryRig {
    imu: SensorHandle,
    gnss: SensorHandle,
    writer: Arc<FrameWriter>,
}

impl TelemetryRig {
    /// Attach both sensors; if the second attach fails the first is destroyed
    #[instrument(name = "telemetry_attach", skip(client, writer))]
    pub async fn attach<C: CarlaClient>(
        client: &C,
        parent: ActorId,
        writer: Arc<FrameWriter>,
    ) -> Result<Self> {
        let no_attributes = HashMap::new();
        let imu = SensorHandle::attach(
            client,
            parent,
            SensorSpec::at_origin(IMU_SENSOR_NAME, SensorKind::Imu),
            &no_attributes,
            writer.clone(),
        )
        .await?;

        let gnss = match SensorHandle::attach(
            client,
            parent,
            SensorSpec::at_origin(GNSS_SENSOR_NAME, SensorKind::Gnss),
            &no_attributes,
            writer.clone(),
        )
        .await
        {
            Ok(gnss) => gnss,
            Err(e) => {
                if let Err(destroy_err) = imu.destroy(client).await {
                    warn!(error = %destroy_err, "failed to destroy imu after gnss attach error");
                }
                return Err(e);
            }
        };

        Ok(Self { imu, gnss, writer })
    }

    pub fn output_dir(&self) -> PathBuf {
        self.writer.dir().to_path_buf()
    }

    pub fn files_written(&self) -> u64 {
        self.writer.metrics().write_count
    }

    /// Drain one IMU and one GNSS sample and write the combined record
    pub async fn flush_frame(&self, frame_index: u64) -> Result<PathBuf> {
        let (imu, gnss) = tokio::try_join!(self.imu.drain_one_frame(), self.gnss.drain_one_frame())?;
        let record = self.combine(&imu, &gnss, frame_index)?;

        let writer = self.writer.clone();
        let path = tokio::task::spawn_blocking(move || writer.write_record(&record, frame_index))
            .await
            .map_err(|e| CaptureError::worker("telemetry", e.to_string()))?
            .map_err(|source| CaptureError::Persist {
                sensor_id: "telemetry".to_string(),
                frame_index,
                source,
            })?;
        observability::record_frame_persisted(IMU_SENSOR_NAME, SensorKind::Imu);
        observability::record_frame_persisted(GNSS_SENSOR_NAME, SensorKind::Gnss);
        Ok(path)
    }

    fn combine(
        &self,
        imu: &SensorPacket,
        gnss: &SensorPacket,
        frame_index: u64,
    ) -> Result<TelemetryRecord> {
        let mismatch = |packet: &SensorPacket| CaptureError::Persist {
            sensor_id: packet.sensor_id.clone(),
            frame_index,
            source: DispatcherError::PayloadMismatch {
                sensor_id: packet.sensor_id.clone(),
                kind: packet.kind,
                payload: packet.payload.variant_name(),
            },
        };
        match (&imu.payload, &gnss.payload) {
            (SensorPayload::Imu(imu_data), SensorPayload::Gnss(gnss_data)) => {
                Ok(TelemetryRecord::new(imu_data, gnss_data))
            }
            (SensorPayload::Imu(_), _) => Err(mismatch(gnss)),
            _ => Err(mismatch(imu)),
        }
    }

    pub fn discard_stale(&self) -> usize {
        self.imu.discard_stale() + self.gnss.discard_stale()
    }

    /// Destroy both sensors, reporting the first failure
    pub async fn destroy<C: CarlaClient>(&self, client: &C) -> Result<()> {
        let imu = self.imu.destroy(client).await;
        let gnss = self.gnss.destroy(client).await;
        imu.and(gnss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_factory::{MockCarlaClient, MockConfig, ReplayRequest, SimulationMode};

    #[tokio::test]
    async fn test_combined_record_written() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockCarlaClient::connected(MockConfig::default());
        client.replay_log(&ReplayRequest::whole("a.log")).await.unwrap();
        client
            .set_simulation_mode(SimulationMode::Synchronous {
                fixed_delta_seconds: 0.1,
            })
            .await
            .unwrap();
        client.tick().await.unwrap();
        let hero = client.actors("vehicle.audi.tt").await.unwrap()[0].id;

        let rig = TelemetryRig::attach(&client, hero, Arc::new(FrameWriter::new(dir.path())))
            .await
            .unwrap();
        client.tick().await.unwrap();
        let path = rig.flush_frame(0).await.unwrap();

        assert_eq!(path, dir.path().join("000000.txt"));
        let body: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(body.get("Accelerometer").is_some());
        assert!(body.get("Compass").is_some());
        assert_eq!(rig.files_written(), 1);

        rig.destroy(&client).await.unwrap();
        assert_eq!(client.actors("sensor.*").await.unwrap().len(), 0);
    }
}
