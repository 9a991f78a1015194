//! Sliding window failure statistics.
//!
//! Two window shapes are supported:
//! - **Time**: every recorded outcome younger than the sampling duration.
//!   Entries with `timestamp < now - sampling_duration` are evicted lazily
//!   on each read and write.
//! - **Count**: the last N outcomes in a ring buffer; the oldest entry is
//!   evicted on overflow.
//!
//! Only [`OutcomeKind::Success`] and [`OutcomeKind::HandledFailure`] are
//! stored. The failure and total counts are maintained incrementally, so a
//! snapshot is O(evicted entries).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tripwire_core::{OutcomeKind, WindowKind};

/// Statistics derived from the live window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSnapshot {
    /// Recorded outcomes in the window.
    pub total: usize,
    /// Handled failures in the window.
    pub failures: usize,
    /// True once `total >= minimum_throughput`.
    pub has_enough_throughput: bool,
}

impl HealthSnapshot {
    /// Returns the failure ratio, or `None` while throughput is insufficient.
    #[must_use]
    pub fn failure_ratio(&self) -> Option<f64> {
        self.has_enough_throughput.then(|| self.raw_failure_ratio())
    }

    /// Returns `failures / total` regardless of throughput (0.0 when empty).
    #[must_use]
    pub fn raw_failure_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failures as f64 / self.total as f64
        }
    }

    /// Returns true if the window breaches `threshold` with enough data.
    ///
    /// The ratio must exceed the threshold, except at a threshold of 1.0,
    /// which is breached once every outcome in the window is a failure.
    #[must_use]
    pub fn breaches(&self, threshold: f64) -> bool {
        self.failure_ratio().is_some_and(|ratio| {
            ratio > threshold || (threshold >= 1.0 && self.failures == self.total)
        })
    }
}

/// Failure statistics over a time- or count-based window.
#[derive(Debug, Clone)]
pub struct HealthWindow {
    shape: Shape,
    minimum_throughput: usize,
    failures: usize,
}

#[derive(Debug, Clone)]
enum Shape {
    Time {
        sampling_duration: Duration,
        entries: VecDeque<(Instant, bool)>,
    },
    Count {
        capacity: usize,
        entries: VecDeque<bool>,
    },
}

impl HealthWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new(kind: WindowKind, sampling_duration: Duration, minimum_throughput: u32) -> Self {
        let shape = match kind {
            WindowKind::Time => Shape::Time {
                sampling_duration,
                entries: VecDeque::new(),
            },
            WindowKind::Count { capacity } => Shape::Count {
                capacity: capacity.max(1),
                entries: VecDeque::with_capacity(capacity.max(1)),
            },
        };
        Self {
            shape,
            minimum_throughput: minimum_throughput as usize,
            failures: 0,
        }
    }

    /// Records an outcome observed at `now`.
    ///
    /// Unhandled failures are ignored.
    pub fn record(&mut self, kind: OutcomeKind, now: Instant) {
        let failed = match kind {
            OutcomeKind::Success => false,
            OutcomeKind::HandledFailure => true,
            OutcomeKind::UnhandledFailure => return,
        };

        self.evict(now);
        match &mut self.shape {
            Shape::Time { entries, .. } => entries.push_back((now, failed)),
            Shape::Count { capacity, entries } => {
                if entries.len() == *capacity
                    && let Some(true) = entries.pop_front()
                {
                    self.failures -= 1;
                }
                entries.push_back(failed);
            }
        }
        if failed {
            self.failures += 1;
        }
    }

    /// Returns statistics as of `now`, evicting expired entries first.
    pub fn snapshot(&mut self, now: Instant) -> HealthSnapshot {
        self.evict(now);
        let total = self.len();
        HealthSnapshot {
            total,
            failures: self.failures,
            has_enough_throughput: total >= self.minimum_throughput,
        }
    }

    /// Clears every entry.
    pub fn reset(&mut self) {
        match &mut self.shape {
            Shape::Time { entries, .. } => entries.clear(),
            Shape::Count { entries, .. } => entries.clear(),
        }
        self.failures = 0;
    }

    /// Returns the number of stored entries (without evicting).
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.shape {
            Shape::Time { entries, .. } => entries.len(),
            Shape::Count { entries, .. } => entries.len(),
        }
    }

    /// Returns true if no entries are stored (without evicting).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict(&mut self, now: Instant) {
        let Shape::Time {
            sampling_duration,
            entries,
        } = &mut self.shape
        else {
            return;
        };
        // Before the clock has run a full sampling duration nothing can expire.
        let Some(horizon) = now.checked_sub(*sampling_duration) else {
            return;
        };
        while let Some(&(timestamp, failed)) = entries.front() {
            if timestamp >= horizon {
                break;
            }
            entries.pop_front();
            if failed {
                self.failures -= 1;
            }
        }
    }
}
