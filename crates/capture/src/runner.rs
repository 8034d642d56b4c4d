//! ScenarioRunner - every pass over one recorder log
//!
//! Ground-truth passes come first (replayed weather), then one RGB pass per
//! weather condition in file order. Each pass is a full `CaptureSession`.

use actor_factory::CarlaClient;
use contracts::{
    log_base_name, CameraMount, CaptureSettings, ContractError, GroundTruthPass, RecorderInfo,
    SensorKind, WeatherCondition,
};
use dispatcher::{align_log_dir, AlignReport, OutputLayout};
use observability::{CaptureMetricsAggregator, CaptureSummary};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::error::{CaptureError, Result};
use crate::session::{CaptureSession, SessionContext, SessionPlan, SessionReport};
use crate::shutdown::Shutdown;

/// Everything a finished scenario produced
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub log_name: String,
    pub map_name: String,
    /// Frames in the log before the trailing margin
    pub log_frames: u64,
    pub sessions: Vec<SessionReport>,
    pub alignment: Option<AlignReport>,
    pub summary: CaptureSummary,
}

/// Order the passes of a scenario
///
/// Passes without any flush target are skipped.
pub fn plan_passes(
    ground_truth: &[GroundTruthPass],
    cameras: &[CameraMount],
    conditions: &[WeatherCondition],
) -> Vec<SessionPlan> {
    let camera_pass = |kind: SensorKind| SessionPlan {
        condition: kind.as_str().to_string(),
        weather: None,
        headlights_on: false,
        sensors: cameras.iter().map(|mount| mount.with_kind(kind)).collect(),
        telemetry: false,
    };

    let ground_truth = ground_truth.iter().map(|pass| match pass {
        GroundTruthPass::Segmentation => camera_pass(SensorKind::Segmentation),
        GroundTruthPass::Depth => camera_pass(SensorKind::Depth),
        GroundTruthPass::Telemetry => SessionPlan::telemetry("telemetry"),
    });
    let weather = conditions.iter().map(|condition| {
        SessionPlan::for_condition(
            condition,
            cameras.iter().map(|m| m.with_kind(SensorKind::Rgb)).collect(),
        )
    });

    ground_truth
        .chain(weather)
        .filter(|plan| plan.target_count() > 0)
        .collect()
}

/// Runs all passes for one log
pub struct ScenarioRunner<C: CarlaClient + Clone + 'static> {
    client: C,
    settings: CaptureSettings,
    shutdown: Shutdown,
}

impl<C: CarlaClient + Clone + 'static> ScenarioRunner<C> {
    pub fn new(client: C, settings: CaptureSettings, shutdown: Shutdown) -> Self {
        Self {
            client,
            settings,
            shutdown,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Capture every pass for `log_path`
    ///
    /// # Errors
    /// An invalid condition aborts before the simulator is touched. A failed
    /// session aborts the remaining passes; its teardown has already run.
    #[instrument(
        name = "scenario_run",
        skip(self, cameras, conditions),
        fields(cameras = cameras.len(), conditions = conditions.len())
    )]
    pub async fn run(
        &self,
        log_path: &str,
        cameras: &[CameraMount],
        conditions: &[WeatherCondition],
    ) -> Result<ScenarioReport> {
        validate_conditions(conditions)?;

        let info = RecorderInfo::parse(&self.client.recorder_info(log_path).await?)?;
        let tuning = self.settings.capture.clone();
        let log_frames = info.frame_count(tuning.fixed_delta_seconds);
        let log_name = log_base_name(log_path);
        info!(
            map = %info.map_name,
            duration_secs = info.duration_secs,
            log_frames,
            log_name = %log_name,
            "recorder info"
        );

        let layout = OutputLayout::new(&self.settings.output.root, log_name.clone());
        let context = SessionContext {
            log_path: log_path.to_string(),
            log_frames,
            layout: layout.clone(),
            tuning,
        };
        if context.frames_to_capture() == 0 {
            warn!(log_frames, "log shorter than the trailing margin, sessions capture nothing");
        }
        let session = CaptureSession::new(self.client.clone(), context, self.shutdown.clone());

        let plans = plan_passes(&self.settings.ground_truth, cameras, conditions);
        let mut aggregator = CaptureMetricsAggregator::new();
        let mut sessions = Vec::with_capacity(plans.len());

        for (index, plan) in plans.iter().enumerate() {
            info!(pass = index + 1, total = plans.len(), condition = %plan.condition, "starting pass");
            match session.run(plan).await {
                Ok(report) => {
                    aggregator.record_session(
                        &report.condition,
                        report.frames_captured,
                        report.files_written,
                        &report.flush_stats,
                    );
                    sessions.push(report);
                }
                Err(e) => {
                    aggregator.record_failure();
                    return Err(e);
                }
            }
        }

        let alignment = if self.settings.output.align_after_run && !sessions.is_empty() {
            Some(align(&layout).await?)
        } else {
            None
        };

        Ok(ScenarioReport {
            log_name,
            map_name: info.map_name,
            log_frames,
            sessions,
            alignment,
            summary: aggregator.summary(),
        })
    }
}

/// Re-check ranges of conditions that did not come through the loader
pub fn validate_conditions(conditions: &[WeatherCondition]) -> Result<()> {
    for condition in conditions {
        condition.validate().map_err(|e| {
            CaptureError::Config(ContractError::config_validation(
                format!("condition '{}'", condition.name),
                e.to_string(),
            ))
        })?;
    }
    Ok(())
}

async fn align(layout: &OutputLayout) -> Result<AlignReport> {
    let log_dir = layout.log_dir();
    let report = tokio::task::spawn_blocking(move || align_log_dir(&log_dir))
        .await
        .map_err(|e| CaptureError::worker("align", e.to_string()))??;
    Ok(report)
}
