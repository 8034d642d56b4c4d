//! Inbox metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-inbox counters
#[derive(Debug, Default)]
pub struct InboxMetrics {
    /// Total samples received from the callback
    pub samples_received: AtomicU64,

    /// Samples removed by `discard_pending`
    pub samples_discarded: AtomicU64,

    /// Samples of the wrong kind, dropped at the callback
    pub kind_mismatches: AtomicU64,
}

impl InboxMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: u64) {
        self.samples_discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_kind_mismatch(&self) {
        self.kind_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            samples_discarded: self.samples_discarded.load(Ordering::Relaxed),
            kind_mismatches: self.kind_mismatches.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub samples_received: u64,
    pub samples_discarded: u64,
    pub kind_mismatches: u64,
}
