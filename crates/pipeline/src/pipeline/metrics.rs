use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one or more pipelines.
///
/// A fresh instance is created per connection unless one is shared through
/// [`Pipeline::with_metrics`](crate::pipeline::Pipeline::with_metrics), which gives
/// process-wide numbers.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    flushes: AtomicU64,
    body_bytes: AtomicU64,
    upgrades: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    /// pipelines that ended in error, whether a call or the transport failed
    pub failed: u64,
    pub cancelled: u64,
    pub flushes: u64,
    pub body_bytes: u64,
    pub upgrades: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            body_bytes: self.body_bytes.load(Ordering::Relaxed),
            upgrades: self.upgrades.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self, calls: usize) {
        self.cancelled.fetch_add(calls as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_body_bytes(&self, bytes: usize) {
        self.body_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_upgrade(&self) {
        self.upgrades.fetch_add(1, Ordering::Relaxed);
    }
}
