//! Capture metrics
//!
//! Thin wrappers over the `metrics` facade plus an in-memory aggregator for
//! the end-of-run report.

use std::collections::BTreeMap;

use contracts::SensorKind;
use metrics::{counter, gauge, histogram};

/// Record one file persisted for a sensor
pub fn record_frame_persisted(sensor_id: &str, kind: SensorKind) {
    counter!(
        "carla_capture_frames_persisted_total",
        "sensor_id" => sensor_id.to_string(),
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record the wall time of one flush group (drain + persist of every member)
pub fn record_flush_group_ms(group_size: usize, latency_ms: f64) {
    histogram!("carla_capture_flush_group_ms").record(latency_ms);
    gauge!("carla_capture_flush_group_size").set(group_size as f64);
}

/// Record the simulator frame reached by the last lockstep tick
pub fn record_tick(frame: u64) {
    counter!("carla_capture_ticks_total").increment(1);
    gauge!("carla_capture_last_sim_frame").set(frame as f64);
}

/// Record the end of a capture session
pub fn record_session_finished(condition: &str, success: bool) {
    let status = if success { "completed" } else { "failed" };
    counter!(
        "carla_capture_sessions_total",
        "condition" => condition.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Capture run aggregator
///
/// Collects per-session results in memory for the summary printed at the end
/// of a run.
#[derive(Debug, Clone, Default)]
pub struct CaptureMetricsAggregator {
    pub sessions_completed: u64,
    pub sessions_failed: u64,

    /// Frames captured per condition
    pub frames_per_condition: BTreeMap<String, u64>,

    /// Files written over all sessions
    pub files_written: u64,

    /// Per-frame flush latency (ms)
    pub flush_stats: RunningStats,
}

impl CaptureMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a finished session
    pub fn record_session(
        &mut self,
        condition: &str,
        frames: u64,
        files_written: u64,
        flush: &RunningStats,
    ) {
        self.sessions_completed += 1;
        *self
            .frames_per_condition
            .entry(condition.to_string())
            .or_insert(0) += frames;
        self.files_written += files_written;
        self.flush_stats.merge(flush);
    }

    pub fn record_failure(&mut self) {
        self.sessions_failed += 1;
    }

    pub fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            sessions_completed: self.sessions_completed,
            sessions_failed: self.sessions_failed,
            total_frames: self.frames_per_condition.values().sum(),
            files_written: self.files_written,
            flush_ms: StatsSummary::from(&self.flush_stats),
            frames_per_condition: self.frames_per_condition.clone(),
        }
    }
}

/// End-of-run summary
#[derive(Debug, Clone, Default)]
pub struct CaptureSummary {
    pub sessions_completed: u64,
    pub sessions_failed: u64,
    pub total_frames: u64,
    pub files_written: u64,
    pub flush_ms: StatsSummary,
    pub frames_per_condition: BTreeMap<String, u64>,
}

impl std::fmt::Display for CaptureSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Capture Summary ===")?;
        writeln!(
            f,
            "Sessions: {} completed, {} failed",
            self.sessions_completed, self.sessions_failed
        )?;
        writeln!(f, "Frames captured: {}", self.total_frames)?;
        writeln!(f, "Files written: {}", self.files_written)?;
        writeln!(f, "Flush latency (ms): {}", self.flush_ms)?;

        if !self.frames_per_condition.is_empty() {
            writeln!(f, "Frames per condition:")?;
            for (condition, frames) in &self.frames_per_condition {
                writeln!(f, "  {}: {}", condition, frames)?;
            }
        }

        Ok(())
    }
}

/// Statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Combine two accumulators (Chan et al. parallel update)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        self.m2 += other.m2 + delta * delta * (self.count * other.count) as f64 / count as f64;
        self.mean += delta * other.count as f64 / count as f64;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_merge_matches_sequential() {
        let mut left = RunningStats::default();
        let mut right = RunningStats::default();
        let mut all = RunningStats::default();
        for v in [1.0, 2.0, 3.0] {
            left.push(v);
            all.push(v);
        }
        for v in [10.0, 20.0] {
            right.push(v);
            all.push(v);
        }

        left.merge(&right);
        assert_eq!(left.count(), 5);
        assert!((left.mean() - all.mean()).abs() < 1e-10);
        assert!((left.variance() - all.variance()).abs() < 1e-9);
        assert!((left.max() - 20.0).abs() < 1e-10);

        let mut empty = RunningStats::default();
        empty.merge(&all);
        assert_eq!(empty.count(), 5);
    }

    #[test]
    fn test_aggregator_summary() {
        let mut aggregator = CaptureMetricsAggregator::new();
        let mut flush = RunningStats::default();
        flush.push(4.0);
        flush.push(6.0);

        aggregator.record_session("segmentation", 100, 200, &flush);
        aggregator.record_session("ClearNoon", 100, 200, &flush);
        aggregator.record_failure();

        let summary = aggregator.summary();
        assert_eq!(summary.sessions_completed, 2);
        assert_eq!(summary.sessions_failed, 1);
        assert_eq!(summary.total_frames, 200);
        assert_eq!(summary.flush_ms.count, 4);

        let output = format!("{}", summary);
        assert!(output.contains("Frames captured: 200"));
        assert!(output.contains("ClearNoon: 100"));
    }
}
