//! Pipeline metrics for observability
//!
//! Runtime delivery failures never reach producers; these counters are how
//! they become visible.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one domain's dispatch pipeline
///
/// # Example
///
/// ```
/// use domain_logger::PipelineMetrics;
///
/// let metrics = PipelineMetrics::new();
/// metrics.record_enqueued();
/// metrics.record_overflow();
///
/// assert_eq!(metrics.enqueued(), 1);
/// assert_eq!(metrics.overflow_dropped(), 1);
/// ```
#[derive(Debug)]
pub struct PipelineMetrics {
    /// Records accepted onto the queue (or handed to inline delivery)
    enqueued: AtomicU64,

    /// Records written to every eligible sink without error
    delivered: AtomicU64,

    /// Records dropped because the queue was full
    overflow_dropped: AtomicU64,

    /// Records still queued when the stop deadline passed
    dropped_on_stop: AtomicU64,

    /// Records offered after the pipeline stopped accepting
    rejected_after_stop: AtomicU64,

    /// Individual sink write failures (one record can count several)
    sink_failures: AtomicU64,

    /// Number of times a producer waited for queue space
    block_events: AtomicU64,
}

impl PipelineMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            overflow_dropped: AtomicU64::new(0),
            dropped_on_stop: AtomicU64::new(0),
            rejected_after_stop: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn overflow_dropped(&self) -> u64 {
        self.overflow_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_on_stop(&self) -> u64 {
        self.dropped_on_stop.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected_after_stop(&self) -> u64 {
        self.rejected_after_stop.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    /// Every record that never reached the sinks
    pub fn total_dropped(&self) -> u64 {
        self.overflow_dropped() + self.dropped_on_stop() + self.rejected_after_stop()
    }

    /// Record an accepted record, returning the previous count
    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_overflow(&self) -> u64 {
        self.overflow_dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped_on_stop(&self, count: u64) -> u64 {
        self.dropped_on_stop.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected_after_stop(&self) -> u64 {
        self.rejected_after_stop.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Get drop rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been offered yet.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.total_dropped() as f64;
        let total = self.enqueued() as f64 + self.overflow_dropped() as f64
            + self.rejected_after_stop() as f64;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PipelineMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            enqueued: AtomicU64::new(self.enqueued()),
            delivered: AtomicU64::new(self.delivered()),
            overflow_dropped: AtomicU64::new(self.overflow_dropped()),
            dropped_on_stop: AtomicU64::new(self.dropped_on_stop()),
            rejected_after_stop: AtomicU64::new(self.rejected_after_stop()),
            sink_failures: AtomicU64::new(self.sink_failures()),
            block_events: AtomicU64::new(self.block_events()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.enqueued(), 0);
        assert_eq!(metrics.delivered(), 0);
        assert_eq!(metrics.total_dropped(), 0);
        assert_eq!(metrics.sink_failures(), 0);
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.record_overflow(), 0);
        assert_eq!(metrics.record_overflow(), 1);
        assert_eq!(metrics.overflow_dropped(), 2);
    }

    #[test]
    fn test_total_dropped_sums_every_drop_kind() {
        let metrics = PipelineMetrics::new();
        metrics.record_overflow();
        metrics.record_dropped_on_stop(3);
        metrics.record_rejected_after_stop();
        assert_eq!(metrics.total_dropped(), 5);
    }

    #[test]
    fn test_metrics_drop_rate() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.drop_rate(), 0.0);

        for _ in 0..90 {
            metrics.record_enqueued();
        }
        for _ in 0..10 {
            metrics.record_overflow();
        }

        let rate = metrics.drop_rate();
        assert!((9.9..=10.1).contains(&rate), "Drop rate was {}", rate);
    }

    #[test]
    fn test_metrics_clone_is_a_snapshot() {
        let metrics = PipelineMetrics::new();
        metrics.record_delivered();

        let snapshot = metrics.clone();
        metrics.record_delivered();

        assert_eq!(snapshot.delivered(), 1);
        assert_eq!(metrics.delivered(), 2);
    }
}
