//! FlushScheduler - bounded fan-out of drain+persist per frame
//!
//! Targets are split into consecutive groups of at most `max_workers`. Each
//! group runs concurrently and is joined before the next group starts, so the
//! number of in-flight drain/persist tasks never exceeds `max_workers`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use observability::RunningStats;
use tokio::task::JoinSet;
use tracing::{debug, instrument, trace, warn};

use crate::error::{CaptureError, Result};
use crate::shutdown::Shutdown;

/// Something that yields one persisted sample per frame
pub trait FlushTarget: Send + Sync + 'static {
    /// Name used in logs and errors
    fn label(&self) -> &str;

    /// Drain one sample and persist it under `frame_index`
    fn flush_frame(&self, frame_index: u64) -> impl Future<Output = Result<()>> + Send;
}

/// Outcome of one `flush_all` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub frame_index: u64,
    /// Size of each group, in launch order
    pub group_sizes: Vec<usize>,
}

/// Group-wise concurrent flush of every target for one frame
#[derive(Debug, Clone)]
pub struct FlushScheduler {
    max_workers: usize,
    shutdown: Shutdown,
}

impl FlushScheduler {
    /// A zero worker count is treated as 1
    pub fn new(max_workers: usize, shutdown: Shutdown) -> Self {
        Self {
            max_workers: max_workers.max(1),
            shutdown,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Flush every target for `frame_index`
    ///
    /// Returns once each target persisted exactly one sample.
    ///
    /// # Errors
    /// The first failing task aborts the rest of its group and no later group
    /// is started. Files already written stay on disk. An operator interrupt
    /// returns `CaptureError::Interrupted`.
    #[instrument(name = "flush_all", skip(self, targets), fields(targets = targets.len()))]
    pub async fn flush_all<T: FlushTarget>(
        &self,
        targets: &[Arc<T>],
        frame_index: u64,
    ) -> Result<FlushReport> {
        let mut group_sizes = Vec::with_capacity(targets.len().div_ceil(self.max_workers));

        for group in targets.chunks(self.max_workers) {
            let started = Instant::now();
            self.flush_group(group, frame_index).await?;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            observability::record_flush_group_ms(group.len(), elapsed_ms);
            trace!(group_size = group.len(), elapsed_ms, "flush group joined");
            group_sizes.push(group.len());
        }

        debug!(groups = group_sizes.len(), "frame flushed");
        Ok(FlushReport {
            frame_index,
            group_sizes,
        })
    }

    /// Like [`flush_all`](Self::flush_all), folding the frame's wall time into `stats`
    pub async fn flush_all_timed<T: FlushTarget>(
        &self,
        targets: &[Arc<T>],
        frame_index: u64,
        stats: &mut RunningStats,
    ) -> Result<FlushReport> {
        let started = Instant::now();
        let report = self.flush_all(targets, frame_index).await?;
        stats.push(started.elapsed().as_secs_f64() * 1000.0);
        Ok(report)
    }

    async fn flush_group<T: FlushTarget>(&self, group: &[Arc<T>], frame_index: u64) -> Result<()> {
        let mut tasks = JoinSet::new();
        for target in group {
            let target = Arc::clone(target);
            tasks.spawn(async move {
                let label = target.label().to_string();
                target
                    .flush_frame(frame_index)
                    .await
                    .map_err(|e| (label, e))
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => {
                    tasks.abort_all();
                    warn!(frame_index, "flush interrupted");
                    return Err(CaptureError::Interrupted);
                }
                joined = tasks.join_next() => joined,
            };

            match joined {
                None => return Ok(()),
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err((label, e)))) => {
                    tasks.abort_all();
                    warn!(target = %label, frame_index, error = %e, "flush task failed");
                    return Err(e);
                }
                Some(Err(join_err)) => {
                    tasks.abort_all();
                    return Err(CaptureError::worker("flush", join_err.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    struct FakeTarget {
        name: String,
        gauge: Arc<Gauge>,
        flushed: Mutex<Vec<u64>>,
        fail_at: Option<u64>,
        delay: Duration,
    }

    impl FakeTarget {
        fn new(name: &str, gauge: Arc<Gauge>) -> Self {
            Self {
                name: name.to_string(),
                gauge,
                flushed: Mutex::new(Vec::new()),
                fail_at: None,
                delay: Duration::from_millis(10),
            }
        }
    }

    impl FlushTarget for FakeTarget {
        fn label(&self) -> &str {
            &self.name
        }

        async fn flush_frame(&self, frame_index: u64) -> Result<()> {
            let now = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.gauge.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.gauge.current.fetch_sub(1, Ordering::SeqCst);

            if self.fail_at == Some(frame_index) {
                return Err(CaptureError::attach(&self.name, "boom"));
            }
            self.flushed.lock().unwrap().push(frame_index);
            Ok(())
        }
    }

    fn targets(count: usize, gauge: &Arc<Gauge>) -> Vec<Arc<FakeTarget>> {
        (0..count)
            .map(|i| Arc::new(FakeTarget::new(&format!("s{i}"), gauge.clone())))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_groups_bounded_by_max_workers() {
        let gauge = Arc::new(Gauge::default());
        let targets = targets(5, &gauge);
        let scheduler = FlushScheduler::new(2, Shutdown::never());

        let report = scheduler.flush_all(&targets, 7).await.unwrap();

        assert_eq!(report.group_sizes, vec![2, 2, 1]);
        assert_eq!(report.frame_index, 7);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
        for target in &targets {
            assert_eq!(*target.flushed.lock().unwrap(), vec![7]);
        }
    }

    #[tokio::test]
    async fn test_group_count_is_ceiling() {
        let gauge = Arc::new(Gauge::default());
        for (count, workers, groups) in [(1, 4, 1), (4, 4, 1), (9, 4, 3), (3, 1, 3)] {
            let report = FlushScheduler::new(workers, Shutdown::never())
                .flush_all(&targets(count, &gauge), 0)
                .await
                .unwrap();
            assert_eq!(report.group_sizes.len(), groups);
            assert_eq!(report.group_sizes.iter().sum::<usize>(), count);
        }
    }

    #[tokio::test]
    async fn test_failure_stops_later_groups() {
        let gauge = Arc::new(Gauge::default());
        let mut failing = FakeTarget::new("bad", gauge.clone());
        failing.fail_at = Some(0);
        let targets = vec![
            Arc::new(FakeTarget::new("a", gauge.clone())),
            Arc::new(failing),
            Arc::new(FakeTarget::new("c", gauge.clone())),
        ];

        let err = FlushScheduler::new(2, Shutdown::never())
            .flush_all(&targets, 0)
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::Attach { ref sensor, .. } if sensor == "bad"));
        assert!(targets[2].flushed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_wait() {
        let gauge = Arc::new(Gauge::default());
        let mut slow = FakeTarget::new("slow", gauge);
        slow.delay = Duration::from_secs(30);
        let (trigger, shutdown) = Shutdown::channel();
        let scheduler = FlushScheduler::new(1, shutdown);

        let flush = tokio::spawn(async move { scheduler.flush_all(&[Arc::new(slow)], 0).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.trigger();

        let result = tokio::time::timeout(Duration::from_secs(2), flush)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(CaptureError::Interrupted)));
    }

    #[tokio::test]
    async fn test_timed_flush_records_latency() {
        let gauge = Arc::new(Gauge::default());
        let mut stats = RunningStats::default();
        let scheduler = FlushScheduler::new(0, Shutdown::never());
        assert_eq!(scheduler.max_workers(), 1);

        scheduler
            .flush_all_timed(&targets(2, &gauge), 0, &mut stats)
            .await
            .unwrap();
        assert_eq!(stats.count(), 1);
        assert!(stats.mean() > 0.0);
    }
}
