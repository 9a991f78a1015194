//! Circuit breaker counters.
//!
//! Lock-free counters shared between the breaker and anyone holding a clone,
//! with a serialisable point-in-time [`MetricsSnapshot`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Execution counters for one circuit breaker.
///
/// Thread-safe; clones share the same counters.
#[derive(Debug, Clone)]
pub struct CircuitMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    // Admission
    executions_total: AtomicU64,
    rejections_total: AtomicU64,

    // Outcomes
    successes_total: AtomicU64,
    handled_failures_total: AtomicU64,
    unhandled_failures_total: AtomicU64,
    cancellations_total: AtomicU64,

    // Transitions
    trips_total: AtomicU64,
    recoveries_total: AtomicU64,
    isolations_total: AtomicU64,

    start_time: Instant,
}

impl CircuitMetrics {
    /// Creates a new metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                executions_total: AtomicU64::new(0),
                rejections_total: AtomicU64::new(0),
                successes_total: AtomicU64::new(0),
                handled_failures_total: AtomicU64::new(0),
                unhandled_failures_total: AtomicU64::new(0),
                cancellations_total: AtomicU64::new(0),
                trips_total: AtomicU64::new(0),
                recoveries_total: AtomicU64::new(0),
                isolations_total: AtomicU64::new(0),
                start_time: Instant::now(),
            }),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Admission
    // ═══════════════════════════════════════════════════════════════════════════

    /// Records an admitted execution.
    pub fn record_execution(&self) {
        self.inner.executions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns admitted executions.
    #[must_use]
    pub fn executions_total(&self) -> u64 {
        self.inner.executions_total.load(Ordering::Relaxed)
    }

    /// Records a rejected execution.
    pub fn record_rejection(&self) {
        self.inner.rejections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns rejected executions.
    #[must_use]
    pub fn rejections_total(&self) -> u64 {
        self.inner.rejections_total.load(Ordering::Relaxed)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Outcomes
    // ═══════════════════════════════════════════════════════════════════════════

    /// Records a successful execution.
    pub fn record_success(&self) {
        self.inner.successes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns successful executions.
    #[must_use]
    pub fn successes_total(&self) -> u64 {
        self.inner.successes_total.load(Ordering::Relaxed)
    }

    /// Records a handled failure.
    pub fn record_handled_failure(&self) {
        self.inner
            .handled_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Returns handled failures.
    #[must_use]
    pub fn handled_failures_total(&self) -> u64 {
        self.inner.handled_failures_total.load(Ordering::Relaxed)
    }

    /// Records an unhandled failure.
    pub fn record_unhandled_failure(&self) {
        self.inner
            .unhandled_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Returns unhandled failures.
    #[must_use]
    pub fn unhandled_failures_total(&self) -> u64 {
        self.inner.unhandled_failures_total.load(Ordering::Relaxed)
    }

    /// Records a cancelled execution.
    pub fn record_cancellation(&self) {
        self.inner.cancellations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns cancelled executions.
    #[must_use]
    pub fn cancellations_total(&self) -> u64 {
        self.inner.cancellations_total.load(Ordering::Relaxed)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Transitions
    // ═══════════════════════════════════════════════════════════════════════════

    /// Records a transition to Open.
    pub fn record_trip(&self) {
        self.inner.trips_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns transitions to Open.
    #[must_use]
    pub fn trips_total(&self) -> u64 {
        self.inner.trips_total.load(Ordering::Relaxed)
    }

    /// Records a HalfOpen to Closed recovery.
    pub fn record_recovery(&self) {
        self.inner.recoveries_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns HalfOpen to Closed recoveries.
    #[must_use]
    pub fn recoveries_total(&self) -> u64 {
        self.inner.recoveries_total.load(Ordering::Relaxed)
    }

    /// Records a manual isolation.
    pub fn record_isolation(&self) {
        self.inner.isolations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns manual isolations.
    #[must_use]
    pub fn isolations_total(&self) -> u64 {
        self.inner.isolations_total.load(Ordering::Relaxed)
    }

    /// Returns the rejected share of all attempts.
    #[must_use]
    pub fn rejection_rate(&self) -> f64 {
        let rejected = self.rejections_total();
        let attempts = self.executions_total() + rejected;
        if attempts > 0 {
            rejected as f64 / attempts as f64
        } else {
            0.0
        }
    }

    /// Returns time since the metrics were created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.inner.start_time.elapsed()
    }

    /// Creates a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions_total: self.executions_total(),
            rejections_total: self.rejections_total(),
            successes_total: self.successes_total(),
            handled_failures_total: self.handled_failures_total(),
            unhandled_failures_total: self.unhandled_failures_total(),
            cancellations_total: self.cancellations_total(),
            trips_total: self.trips_total(),
            recoveries_total: self.recoveries_total(),
            isolations_total: self.isolations_total(),
            rejection_rate: self.rejection_rate(),
            uptime_secs: self.uptime().as_secs(),
        }
    }
}

impl Default for CircuitMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of circuit metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Admitted executions.
    pub executions_total: u64,
    /// Rejected executions.
    pub rejections_total: u64,
    /// Successful executions.
    pub successes_total: u64,
    /// Handled failures.
    pub handled_failures_total: u64,
    /// Unhandled failures.
    pub unhandled_failures_total: u64,
    /// Cancelled executions.
    pub cancellations_total: u64,
    /// Transitions to Open.
    pub trips_total: u64,
    /// HalfOpen to Closed recoveries.
    pub recoveries_total: u64,
    /// Manual isolations.
    pub isolations_total: u64,
    /// Rejected share of all attempts (0.0 to 1.0).
    pub rejection_rate: f64,
    /// Uptime in seconds.
    pub uptime_secs: u64,
}
