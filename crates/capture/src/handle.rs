//! SensorHandle - one simulator sensor, its inbox and its writer

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use actor_factory::CarlaClient;
use contracts::{ActorId, CaptureTuning, SensorKind, SensorPacket, SensorSpec};
use dispatcher::FrameWriter;
use ingestion::SensorInbox;
use tracing::{debug, info, instrument, warn};

use crate::error::{CaptureError, Result};

/// Spawn attributes for a sensor kind
///
/// Cameras get the configured resolution and field of view; other kinds use
/// the blueprint defaults.
pub fn sensor_attributes(kind: SensorKind, tuning: &CaptureTuning) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    if kind.is_camera() {
        attributes.insert("image_size_x".to_string(), tuning.image_width.to_string());
        attributes.insert("image_size_y".to_string(), tuning.image_height.to_string());
        attributes.insert("fov".to_string(), tuning.fov.to_string());
    }
    attributes
}

/// An attached sensor
///
/// Samples pushed by the simulator queue up in the inbox; each tick the
/// session drains exactly one and persists it under the capture frame index.
pub struct SensorHandle {
    spec: SensorSpec,
    actor_id: ActorId,
    inbox: SensorInbox,
    writer: Arc<FrameWriter>,
}

impl SensorHandle {
    /// Spawn the sensor on `parent` and start listening
    ///
    /// # Errors
    /// `CaptureError::Attach` if the simulator refuses the spawn or does not
    /// expose a data source for the new actor. A half-created actor is
    /// destroyed before returning.
    #[instrument(
        name = "sensor_attach",
        skip(client, spec, attributes, writer),
        fields(sensor = %spec.local_name, kind = %spec.kind)
    )]
    pub async fn attach<C: CarlaClient>(
        client: &C,
        parent: ActorId,
        spec: SensorSpec,
        attributes: &HashMap<String, String>,
        writer: Arc<FrameWriter>,
    ) -> Result<Self> {
        let actor_id = client
            .spawn_sensor(spec.kind.blueprint(), spec.transform(), parent, attributes)
            .await
            .map_err(|e| CaptureError::attach(&spec.local_name, e.to_string()))?;

        let Some(source) = client.sensor_source(actor_id, spec.local_name.clone(), spec.kind)
        else {
            if let Err(e) = client.destroy_actor(actor_id).await {
                warn!(actor_id, error = %e, "failed to destroy sensor without data source");
            }
            return Err(CaptureError::attach(
                &spec.local_name,
                format!("actor {actor_id} has no data source"),
            ));
        };

        let inbox = SensorInbox::new(source);
        if let Err(e) = inbox.start() {
            if let Err(destroy_err) = client.destroy_actor(actor_id).await {
                warn!(actor_id, error = %destroy_err, "failed to destroy sensor after listen error");
            }
            return Err(CaptureError::attach(&spec.local_name, e.to_string()));
        }

        info!(actor_id, dir = %writer.dir().display(), "sensor attached");
        Ok(Self {
            spec,
            actor_id,
            inbox,
            writer,
        })
    }

    pub fn sensor_id(&self) -> &str {
        &self.spec.local_name
    }

    pub fn kind(&self) -> SensorKind {
        self.spec.kind
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    pub fn output_dir(&self) -> PathBuf {
        self.writer.dir().to_path_buf()
    }

    pub fn files_written(&self) -> u64 {
        self.writer.metrics().write_count
    }

    /// Wait for exactly one sample and take it
    pub async fn drain_one_frame(&self) -> Result<SensorPacket> {
        self.inbox.recv().await.map_err(|source| CaptureError::Drain {
            sensor_id: self.spec.local_name.clone(),
            source,
        })
    }

    /// Write `sample` as `{frame_index:06}.{ext}` on the blocking pool
    pub async fn persist(&self, sample: SensorPacket, frame_index: u64) -> Result<PathBuf> {
        let writer = self.writer.clone();
        let path = tokio::task::spawn_blocking(move || writer.write_sample(&sample, frame_index))
            .await
            .map_err(|e| CaptureError::worker(&self.spec.local_name, e.to_string()))?
            .map_err(|source| CaptureError::Persist {
                sensor_id: self.spec.local_name.clone(),
                frame_index,
                source,
            })?;
        observability::record_frame_persisted(&self.spec.local_name, self.spec.kind);
        Ok(path)
    }

    /// Drop samples delivered before the capture loop starts
    pub fn discard_stale(&self) -> usize {
        self.inbox.discard_pending()
    }

    /// Stop listening and destroy the simulator actor
    ///
    /// Call at most once.
    #[instrument(name = "sensor_destroy", skip(self, client), fields(sensor = %self.spec.local_name, actor_id = self.actor_id))]
    pub async fn destroy<C: CarlaClient>(&self, client: &C) -> Result<()> {
        self.inbox.stop();
        client.destroy_actor(self.actor_id).await?;
        debug!("sensor destroyed");
        Ok(())
    }
}

impl std::fmt::Debug for SensorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorHandle")
            .field("sensor_id", &self.spec.local_name)
            .field("kind", &self.spec.kind)
            .field("actor_id", &self.actor_id)
            .field("dir", &self.writer.dir())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_factory::{MockCarlaClient, MockConfig, ReplayRequest, SimulationMode};
    use contracts::{ActorInfo, CameraMount, Location};

    async fn replayed_hero(client: &MockCarlaClient) -> ActorInfo {
        client.replay_log(&ReplayRequest::whole("a.log")).await.unwrap();
        client
            .set_simulation_mode(SimulationMode::Synchronous {
                fixed_delta_seconds: 0.1,
            })
            .await
            .unwrap();
        client.tick().await.unwrap();
        client
            .actors("vehicle.*")
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.role_name.as_deref() == Some("hero"))
            .unwrap()
    }

    fn front_camera() -> SensorSpec {
        CameraMount {
            name: "front".into(),
            location: Location {
                x: 1.5,
                y: 0.0,
                z: 2.4,
            },
            yaw: 0.0,
        }
        .with_kind(SensorKind::Rgb)
    }

    #[tokio::test]
    async fn test_attach_drain_persist_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockCarlaClient::connected(MockConfig::default());
        let hero = replayed_hero(&client).await;
        let tuning = CaptureTuning {
            image_width: 4,
            image_height: 2,
            ..Default::default()
        };

        let writer = Arc::new(FrameWriter::new(dir.path().join("front")));
        let handle = SensorHandle::attach(
            &client,
            hero.id,
            front_camera(),
            &sensor_attributes(SensorKind::Rgb, &tuning),
            writer,
        )
        .await
        .unwrap();
        assert!(client.contains_actor(handle.actor_id()));

        client.tick().await.unwrap();
        let sample = handle.drain_one_frame().await.unwrap();
        assert_eq!(sample.sensor_id, "front");
        let path = handle.persist(sample, 0).await.unwrap();
        assert_eq!(path, dir.path().join("front").join("000000.png"));
        assert_eq!(handle.files_written(), 1);

        handle.destroy(&client).await.unwrap();
        assert!(!client.contains_actor(handle.actor_id()));
    }

    #[tokio::test]
    async fn test_attach_failure_is_attach_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockCarlaClient::connected(MockConfig {
            fail_sensor_blueprints: vec!["sensor.camera.rgb".into()],
            ..Default::default()
        });
        let hero = replayed_hero(&client).await;

        let err = SensorHandle::attach(
            &client,
            hero.id,
            front_camera(),
            &HashMap::new(),
            Arc::new(FrameWriter::new(dir.path())),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CaptureError::Attach { ref sensor, .. } if sensor == "front"));
    }

    #[tokio::test]
    async fn test_stale_samples_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockCarlaClient::connected(MockConfig::default());
        let hero = replayed_hero(&client).await;
        let handle = SensorHandle::attach(
            &client,
            hero.id,
            SensorSpec::at_origin("imu", SensorKind::Imu),
            &HashMap::new(),
            Arc::new(FrameWriter::new(dir.path())),
        )
        .await
        .unwrap();

        for _ in 0..3 {
            client.tick().await.unwrap();
        }
        assert_eq!(handle.discard_stale(), 3);
        assert_eq!(handle.discard_stale(), 0);
    }

    #[test]
    fn test_camera_attributes_only_for_cameras() {
        let tuning = CaptureTuning::default();
        let attrs = sensor_attributes(SensorKind::Depth, &tuning);
        assert_eq!(attrs.get("image_size_x").map(String::as_str), Some("1280"));
        assert_eq!(attrs.get("fov").map(String::as_str), Some("90"));
        assert!(sensor_attributes(SensorKind::Gnss, &tuning).is_empty());
    }
}
