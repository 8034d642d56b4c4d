//! Per-sensor sample inbox
//!
//! The simulator invokes the sensor callback on its own thread; the callback
//! only enqueues. The capture engine drains one sample per tick from the
//! coordinating side. The queue is unbounded and never drops, because a lost
//! sample would shift every later frame of this sensor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::{unbounded, Receiver, Sender};
use contracts::{SensorDataCallback, SensorKind, SensorPacket, SensorSource};
use metrics::counter;
use tracing::{debug, instrument, trace, warn};

use crate::config::{InboxMetrics, MetricsSnapshot};
use crate::error::{IngestionError, Result};

/// Queue between one sensor's callback and the drain side
pub struct SensorInbox {
    sensor_id: String,
    kind: SensorKind,
    source: Box<dyn SensorSource>,
    tx: Sender<SensorPacket>,
    rx: Receiver<SensorPacket>,
    metrics: Arc<InboxMetrics>,
    listening: Arc<AtomicBool>,
}

impl SensorInbox {
    /// Wrap a source; nothing is delivered until [`SensorInbox::start`]
    pub fn new(source: Box<dyn SensorSource>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            sensor_id: source.sensor_id().to_string(),
            kind: source.kind(),
            source,
            tx,
            rx,
            metrics: Arc::new(InboxMetrics::new()),
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Register the enqueue callback with the source
    #[instrument(name = "inbox_start", skip(self), fields(sensor_id = %self.sensor_id))]
    pub fn start(&self) -> Result<()> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(IngestionError::AlreadyListening {
                sensor_id: self.sensor_id.clone(),
            });
        }

        let sensor_id = self.sensor_id.clone();
        let kind = self.kind;
        let tx = self.tx.clone();
        let metrics = self.metrics.clone();
        let listening = self.listening.clone();

        let callback: SensorDataCallback = Arc::new(move |packet: SensorPacket| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }
            if packet.kind != kind {
                metrics.record_kind_mismatch();
                warn!(
                    sensor_id = %sensor_id,
                    expected = %kind,
                    actual = %packet.kind,
                    "dropping sample of unexpected kind"
                );
                return;
            }

            metrics.record_received();
            counter!("carla_capture_samples_received_total", "kind" => kind.as_str())
                .increment(1);
            trace!(sensor_id = %sensor_id, frame = packet.frame, "sample enqueued");
            // Unbounded: only fails once every receiver is gone
            let _ = tx.try_send(packet);
        });

        self.source.listen(callback);
        debug!("inbox listening");
        Ok(())
    }

    /// Wait for the next sample
    ///
    /// Blocks until one is available. A sensor that never delivers blocks
    /// forever; callers race this against their own shutdown signal.
    pub async fn recv(&self) -> Result<SensorPacket> {
        self.rx
            .recv()
            .await
            .map_err(|_| IngestionError::ChannelClosed {
                sensor_id: self.sensor_id.clone(),
            })
    }

    /// Drop everything already queued, returning how many samples were removed
    pub fn discard_pending(&self) -> usize {
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            self.metrics.record_discarded(discarded as u64);
            counter!("carla_capture_stale_samples_discarded_total").increment(discarded as u64);
            debug!(sensor_id = %self.sensor_id, discarded, "discarded stale samples");
        }
        discarded
    }

    /// Samples waiting to be drained
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Stop the source; queued samples stay drainable
    pub fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(sensor_id = %self.sensor_id, "stopping inbox");
            self.source.stop();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Drop for SensorInbox {
    fn drop(&mut self) {
        self.stop();
    }
}
