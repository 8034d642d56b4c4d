//! CaptureSession - one replay pass under one condition
//!
//! Replay log → lockstep on → find hero → attach → warm up → tick/flush ×N →
//! lockstep off → destroy sensors. The last two steps run on every exit path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actor_factory::{CarlaClient, ReplayRequest};
use contracts::{
    ActorId, CaptureTuning, SensorSpec, VehicleLightState, WeatherCondition, WeatherParams,
};
use dispatcher::{FrameWriter, OutputLayout};
use observability::RunningStats;
use tracing::{debug, info, instrument, warn};

use crate::error::{CaptureError, Result};
use crate::flush::FlushScheduler;
use crate::handle::{sensor_attributes, SensorHandle};
use crate::lockstep::Lockstep;
use crate::shutdown::Shutdown;
use crate::target::CaptureTarget;
use crate::telemetry::TelemetryRig;

/// What one session captures
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    /// Output folder under the log directory
    pub condition: String,
    /// Weather applied after attaching; `None` keeps the replayed weather
    pub weather: Option<WeatherParams>,
    pub headlights_on: bool,
    pub sensors: Vec<SensorSpec>,
    /// Also attach the IMU + GNSS rig writing to the telemetry folder
    pub telemetry: bool,
}

impl SessionPlan {
    /// Sensors under a weather condition
    pub fn for_condition(condition: &WeatherCondition, sensors: Vec<SensorSpec>) -> Self {
        Self {
            condition: condition.name.clone(),
            weather: Some(condition.params),
            headlights_on: condition.headlights_on,
            sensors,
            telemetry: false,
        }
    }

    /// Telemetry-only pass
    pub fn telemetry(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            weather: None,
            headlights_on: false,
            sensors: Vec::new(),
            telemetry: true,
        }
    }

    pub fn is_camera_pass(&self) -> bool {
        self.sensors.iter().any(|s| s.kind.is_camera())
    }

    /// Number of flush units per frame
    pub fn target_count(&self) -> usize {
        self.sensors.len() + usize::from(self.telemetry)
    }
}

/// Inputs shared by every session of one log
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Log path as the simulator sees it
    pub log_path: String,
    /// Frames in the whole log at the configured step
    pub log_frames: u64,
    pub layout: OutputLayout,
    pub tuning: CaptureTuning,
}

impl SessionContext {
    /// Frames captured per session, after the trailing margin
    pub fn frames_to_capture(&self) -> u64 {
        self.log_frames
            .saturating_sub(self.tuning.trailing_margin_frames)
    }
}

/// Result of a completed session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub condition: String,
    pub hero_id: ActorId,
    pub frames_captured: u64,
    pub files_written: u64,
    pub stale_discarded: usize,
    pub output_dirs: Vec<PathBuf>,
    /// Per-frame flush wall time (ms)
    pub flush_stats: RunningStats,
}

/// Drives one replay pass against the simulator
pub struct CaptureSession<C: CarlaClient + Clone + 'static> {
    client: C,
    context: SessionContext,
    scheduler: FlushScheduler,
    shutdown: Shutdown,
}

impl<C: CarlaClient + Clone + 'static> CaptureSession<C> {
    pub fn new(client: C, context: SessionContext, shutdown: Shutdown) -> Self {
        let scheduler = FlushScheduler::new(context.tuning.max_workers, shutdown.clone());
        Self {
            client,
            context,
            scheduler,
            shutdown,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Run the full session
    ///
    /// # Errors
    /// Any failure aborts the session. Synchronous mode is released and every
    /// attached sensor destroyed before the error is returned; files already
    /// written are left in place.
    #[instrument(
        name = "capture_session",
        skip(self, plan),
        fields(condition = %plan.condition, log = %self.context.log_path, targets = plan.target_count())
    )]
    pub async fn run(&self, plan: &SessionPlan) -> Result<SessionReport> {
        if self.shutdown.is_triggered() {
            return Err(CaptureError::Interrupted);
        }

        self.client
            .replay_log(&ReplayRequest::whole(self.context.log_path.clone()))
            .await?;
        let mut lockstep =
            Lockstep::engage(self.client.clone(), self.context.tuning.fixed_delta_seconds).await?;

        let mut targets = Vec::with_capacity(plan.target_count());
        let outcome = self.run_locked(&mut lockstep, plan, &mut targets).await;

        let released = lockstep.release().await;
        self.destroy_targets(&targets).await;

        let result = match (outcome, released) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(error = %release_err, "failed to release synchronous mode after session error");
                Err(e)
            }
        };

        observability::record_session_finished(&plan.condition, result.is_ok());
        match &result {
            Ok(report) => info!(
                frames = report.frames_captured,
                files = report.files_written,
                "session completed"
            ),
            Err(e) => warn!(error = %e, "session aborted"),
        }
        result
    }

    async fn run_locked(
        &self,
        lockstep: &mut Lockstep<C>,
        plan: &SessionPlan,
        targets: &mut Vec<Arc<CaptureTarget>>,
    ) -> Result<SessionReport> {
        let tuning = &self.context.tuning;

        for _ in 0..tuning.spawn_ticks {
            lockstep.tick().await?;
        }
        let hero_id = self.find_hero().await?;

        self.attach_targets(hero_id, plan, targets).await?;

        if let Some(weather) = &plan.weather {
            self.client.set_weather(weather).await?;
        }
        if plan.is_camera_pass() {
            self.apply_light_state(plan.headlights_on).await?;
        }

        for _ in 0..tuning.warmup_ticks {
            lockstep.tick().await?;
        }
        self.settle().await?;
        let stale_discarded = targets.iter().map(|t| t.discard_stale()).sum();

        let frames = self.context.frames_to_capture();
        let mut flush_stats = RunningStats::default();
        info!(frames, hero_id, "capturing");

        for frame_index in 0..frames {
            if self.shutdown.is_triggered() {
                return Err(CaptureError::Interrupted);
            }
            lockstep.tick().await?;
            self.scheduler
                .flush_all_timed(targets.as_slice(), frame_index, &mut flush_stats)
                .await?;
        }

        Ok(SessionReport {
            condition: plan.condition.clone(),
            hero_id,
            frames_captured: frames,
            files_written: targets.iter().map(|t| t.files_written()).sum(),
            stale_discarded,
            output_dirs: targets.iter().map(|t| t.output_dir()).collect(),
            flush_stats,
        })
    }

    /// Locate the replayed vehicle carrying the rig by its role name
    async fn find_hero(&self) -> Result<ActorId> {
        let tuning = &self.context.tuning;
        let vehicles = self.client.actors(&tuning.hero_filter).await?;
        vehicles
            .iter()
            .find(|v| v.role_name.as_deref() == Some(tuning.hero_role_name.as_str()))
            .map(|v| {
                debug!(hero_id = v.id, type_id = %v.type_id, "hero found");
                v.id
            })
            .ok_or_else(|| CaptureError::HeroNotFound {
                role: tuning.hero_role_name.clone(),
            })
    }

    /// Attach in plan order; each target is pushed as soon as it exists so a
    /// later failure still tears it down
    async fn attach_targets(
        &self,
        hero_id: ActorId,
        plan: &SessionPlan,
        targets: &mut Vec<Arc<CaptureTarget>>,
    ) -> Result<()> {
        let layout = &self.context.layout;

        for spec in &plan.sensors {
            let writer = Arc::new(FrameWriter::new(
                layout.sensor_dir(&plan.condition, &spec.local_name),
            ));
            let attributes = sensor_attributes(spec.kind, &self.context.tuning);
            let handle =
                SensorHandle::attach(&self.client, hero_id, spec.clone(), &attributes, writer)
                    .await?;
            targets.push(Arc::new(CaptureTarget::Sensor(handle)));
        }

        if plan.telemetry {
            let writer = Arc::new(FrameWriter::new(layout.telemetry_dir()));
            let rig = TelemetryRig::attach(&self.client, hero_id, writer).await?;
            targets.push(Arc::new(CaptureTarget::Telemetry(rig)));
        }
        Ok(())
    }

    async fn apply_light_state(&self, headlights_on: bool) -> Result<()> {
        let state = VehicleLightState::for_headlights(headlights_on);
        let vehicles = self.client.actors("vehicle.*").await?;
        for vehicle in &vehicles {
            if let Err(e) = self.client.set_vehicle_light_state(vehicle.id, state).await {
                warn!(vehicle = vehicle.id, error = %e, "failed to set light state");
            }
        }
        debug!(vehicles = vehicles.len(), headlights_on, "light state applied");
        Ok(())
    }

    /// Real-time pause so callbacks scheduled before warm-up ended land in the
    /// inboxes and can be discarded
    async fn settle(&self) -> Result<()> {
        let pause = Duration::from_millis(self.context.tuning.settle_pause_ms);
        tokio::select! {
            _ = tokio::time::sleep(pause) => Ok(()),
            _ = self.shutdown.triggered() => Err(CaptureError::Interrupted),
        }
    }

    async fn destroy_targets(&self, targets: &[Arc<CaptureTarget>]) {
        for target in targets {
            if let Err(e) = target.destroy(&self.client).await {
                warn!(dir = %target.output_dir().display(), error = %e, "failed to destroy capture target");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_factory::{MockCarlaClient, MockConfig, MockEvent, SimulationMode};
    use contracts::{CameraMount, Location, SensorKind};

    fn tuning() -> CaptureTuning {
        CaptureTuning {
            warmup_ticks: 2,
            settle_pause_ms: 1,
            trailing_margin_frames: 0,
            max_workers: 2,
            ..Default::default()
        }
    }

    fn context(root: &std::path::Path, log_frames: u64) -> SessionContext {
        SessionContext {
            log_path: "/logs/run1.log".into(),
            log_frames,
            layout: OutputLayout::new(root, "run1"),
            tuning: tuning(),
        }
    }

    fn camera(name: &str) -> SensorSpec {
        mounted(name, SensorKind::Rgb)
    }

    fn mounted(name: &str, kind: SensorKind) -> SensorSpec {
        CameraMount {
            name: name.into(),
            location: Location {
                x: 0.0,
                y: 0.0,
                z: 2.0,
            },
            yaw: 90.0,
        }
        .with_kind(kind)
    }

    fn clear_noon() -> WeatherCondition {
        WeatherCondition {
            name: "ClearNoon".into(),
            params: WeatherParams::default(),
            headlights_on: true,
        }
    }

    #[tokio::test]
    async fn test_session_writes_aligned_frames() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockCarlaClient::connected(MockConfig::default());
        let session = CaptureSession::new(client.clone(), context(dir.path(), 5), Shutdown::never());

        let plan = SessionPlan::for_condition(&clear_noon(), vec![camera("left"), camera("right")]);
        let report = session.run(&plan).await.unwrap();

        assert_eq!(report.frames_captured, 5);
        assert_eq!(report.files_written, 10);
        for name in ["left", "right"] {
            let folder = dir.path().join("run1").join("ClearNoon").join(name);
            let mut files: Vec<_> = std::fs::read_dir(&folder)
                .unwrap()
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .collect();
            files.sort();
            assert_eq!(
                files,
                vec!["000000.png", "000001.png", "000002.png", "000003.png", "000004.png"]
            );
        }

        assert_eq!(client.simulation_mode(), SimulationMode::Asynchronous);
        assert!(client.actors("sensor.*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_order_and_lights() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockCarlaClient::connected(MockConfig::default());
        let session = CaptureSession::new(client.clone(), context(dir.path(), 1), Shutdown::never());

        let plan = SessionPlan::for_condition(&clear_noon(), vec![camera("front")]);
        session.run(&plan).await.unwrap();

        let events = client.events();
        let position =
            |pred: &dyn Fn(&MockEvent) -> bool| events.iter().position(|e| pred(e)).unwrap();
        let replay = position(&|e| matches!(e, MockEvent::ReplayStarted(_)));
        let sync = position(&|e| matches!(e, MockEvent::ModeChanged(m) if m.is_synchronous()));
        let attach = position(&|e| matches!(e, MockEvent::SensorSpawned { .. }));
        let weather = position(&|e| matches!(e, MockEvent::WeatherSet(_)));
        let unsync = position(&|e| matches!(e, MockEvent::ModeChanged(SimulationMode::Asynchronous)));
        let destroyed = position(&|e| matches!(e, MockEvent::Destroyed(_)));
        assert!(replay < sync && sync < attach && attach < weather);
        assert!(unsync < destroyed);

        let lights: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                MockEvent::LightState { state, .. } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(lights.len(), 3);
        assert!(lights.iter().all(|s| *s == VehicleLightState::for_headlights(true)));

        // spawn tick + warm-up + one capture frame
        let ticks = events.iter().filter(|e| matches!(e, MockEvent::Tick(_))).count();
        assert_eq!(ticks, 1 + 2 + 1);
    }

    #[tokio::test]
    async fn test_missing_hero_releases_lockstep() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockCarlaClient::connected(MockConfig {
            spawn_hero_on_replay: false,
            ..Default::default()
        });
        let session = CaptureSession::new(client.clone(), context(dir.path(), 5), Shutdown::never());

        let err = session
            .run(&SessionPlan::for_condition(&clear_noon(), vec![camera("front")]))
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::HeroNotFound { ref role } if role == "hero"));
        assert_eq!(client.simulation_mode(), SimulationMode::Asynchronous);
        assert!(!dir.path().join("run1").exists());
    }

    #[tokio::test]
    async fn test_attach_failure_tears_down_earlier_sensors() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockCarlaClient::connected(MockConfig {
            fail_sensor_blueprints: vec!["sensor.camera.depth".into()],
            ..Default::default()
        });
        let session = CaptureSession::new(client.clone(), context(dir.path(), 5), Shutdown::never());
        let plan = SessionPlan {
            condition: "depth".into(),
            weather: None,
            headlights_on: false,
            sensors: vec![
                mounted("front", SensorKind::Segmentation),
                mounted("rear", SensorKind::Depth),
            ],
            telemetry: false,
        };

        let err = session.run(&plan).await.unwrap_err();
        assert!(matches!(err, CaptureError::Attach { ref sensor, .. } if sensor == "rear"));
        assert!(client.actors("sensor.*").await.unwrap().is_empty());
        assert_eq!(client.simulation_mode(), SimulationMode::Asynchronous);
    }

    #[tokio::test]
    async fn test_persist_failure_aborts_and_keeps_earlier_frames() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("run1").join("ClearNoon").join("front");
        // A directory in place of frame 2 makes that write fail
        std::fs::create_dir_all(folder.join("000002.png")).unwrap();
        let client = MockCarlaClient::connected(MockConfig::default());
        let session = CaptureSession::new(client.clone(), context(dir.path(), 6), Shutdown::never());

        let err = session
            .run(&SessionPlan::for_condition(&clear_noon(), vec![camera("front")]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CaptureError::Persist { ref sensor_id, frame_index: 2, .. } if sensor_id == "front"
        ));
        assert_eq!(client.simulation_mode(), SimulationMode::Asynchronous);
        assert!(client.actors("sensor.*").await.unwrap().is_empty());
        assert!(folder.join("000000.png").is_file());
        assert!(folder.join("000001.png").is_file());
        assert!(!folder.join("000003.png").exists());
    }

    #[tokio::test]
    async fn test_trailing_margin_and_telemetry() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockCarlaClient::connected(MockConfig::default());
        let mut ctx = context(dir.path(), 12);
        ctx.tuning.trailing_margin_frames = 10;
        assert_eq!(ctx.frames_to_capture(), 2);
        let session = CaptureSession::new(client.clone(), ctx, Shutdown::never());

        let report = session.run(&SessionPlan::telemetry("telemetry")).await.unwrap();

        assert_eq!(report.frames_captured, 2);
        let gps = dir.path().join("run1").join("GPS");
        assert!(gps.join("000000.txt").exists());
        assert!(gps.join("000001.txt").exists());
        assert!(!gps.join("000002.txt").exists());
        // Telemetry passes keep the replayed weather and lights
        assert!(!client
            .events()
            .iter()
            .any(|e| matches!(e, MockEvent::WeatherSet(_) | MockEvent::LightState { .. })));
    }

    #[tokio::test]
    async fn test_interrupted_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockCarlaClient::connected(MockConfig::default());
        let (trigger, shutdown) = Shutdown::channel();
        trigger.trigger();
        let session = CaptureSession::new(client.clone(), context(dir.path(), 5), shutdown);

        let err = session
            .run(&SessionPlan::for_condition(&clear_noon(), vec![camera("front")]))
            .await
            .unwrap_err();
        assert!(err.is_interrupted());
        assert!(client.events().is_empty());
    }
}
