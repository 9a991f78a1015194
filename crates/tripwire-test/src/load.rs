//! Load testing through a circuit breaker.
//!
//! # Implementation
//! Concurrent tokio workers call one [`Downstream`] through one shared
//! breaker. Latency is measured only for calls that reached the downstream;
//! rejected calls are counted separately so the report shows how much load
//! the open circuit shed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tripwire_breaker::{CircuitBreaker, Outcome};
use tripwire_core::{CircuitState, ResilienceContext};

use crate::downstream::{Downstream, SimError};
use crate::error::{Result, TestError};

/// Load test configuration.
#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    /// Number of concurrent workers.
    pub concurrent_users: u32,
    /// Requests issued by each worker.
    pub requests_per_user: u32,
    /// Ramp-up duration (time until the last worker starts).
    pub ramp_up: Duration,
    /// Pause between requests of one worker.
    pub think_time: Option<Duration>,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            concurrent_users: 10,
            requests_per_user: 100,
            ramp_up: Duration::from_secs(1),
            think_time: None,
        }
    }
}

impl LoadTestConfig {
    /// Creates a quick config for tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            concurrent_users: 4,
            requests_per_user: 25,
            ramp_up: Duration::ZERO,
            think_time: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.concurrent_users == 0 {
            return Err(TestError::LoadTest(
                "concurrent_users must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
struct LoadMetrics {
    succeeded: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    cancelled: AtomicU64,
    latencies_us: Mutex<Vec<u64>>,
}

impl LoadMetrics {
    fn record<T>(&self, outcome: &Outcome<T, SimError>, latency: Duration) {
        let counter = match outcome {
            Outcome::Ok(_) => &self.succeeded,
            Outcome::Err(_) => &self.failed,
            Outcome::Rejected(_) => &self.rejected,
            Outcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if matches!(outcome, Outcome::Ok(_) | Outcome::Err(_)) {
            self.latencies_us.lock().push(latency.as_micros() as u64);
        }
    }
}

/// Load tester for one breaker and one downstream.
pub struct LoadTester {
    config: LoadTestConfig,
    breaker: CircuitBreaker<u64, SimError>,
    downstream: Arc<dyn Downstream>,
}

impl LoadTester {
    /// Creates a new load tester.
    #[must_use]
    pub fn new(
        config: LoadTestConfig,
        breaker: CircuitBreaker<u64, SimError>,
        downstream: Arc<dyn Downstream>,
    ) -> Self {
        Self {
            config,
            breaker,
            downstream,
        }
    }

    /// Returns the test config.
    #[must_use]
    pub const fn config(&self) -> &LoadTestConfig {
        &self.config
    }

    /// Runs the load test.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or a worker panics.
    pub async fn run(&self) -> Result<LoadTestReport> {
        self.config.validate()?;
        tracing::info!(
            users = self.config.concurrent_users,
            requests_per_user = self.config.requests_per_user,
            breaker = self.breaker.name(),
            "starting load test"
        );

        let metrics = Arc::new(LoadMetrics::default());
        let start_time = Instant::now();
        let ramp_delay = if self.config.concurrent_users > 1 {
            self.config.ramp_up / (self.config.concurrent_users - 1)
        } else {
            Duration::ZERO
        };

        let mut handles = Vec::with_capacity(self.config.concurrent_users as usize);
        for user_id in 0..self.config.concurrent_users {
            let metrics = Arc::clone(&metrics);
            let breaker = self.breaker.clone();
            let downstream = Arc::clone(&self.downstream);
            let requests = self.config.requests_per_user;
            let think_time = self.config.think_time;
            let start_delay = ramp_delay * user_id;

            handles.push(tokio::spawn(async move {
                tokio::time::sleep(start_delay).await;
                for seq in 0..requests {
                    let request_id = (u64::from(user_id) << 32) | u64::from(seq);
                    let downstream = Arc::clone(&downstream);
                    let started = Instant::now();
                    let outcome = breaker
                        .execute_outcome(&ResilienceContext::new(), |_| async move {
                            downstream.call(request_id).await
                        })
                        .await;
                    metrics.record(&outcome, started.elapsed());

                    if let Some(pause) = think_time {
                        tokio::time::sleep(pause).await;
                    } else {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| TestError::LoadTest(format!("worker failed: {e}")))?;
        }

        let elapsed = start_time.elapsed();
        let succeeded = metrics.succeeded.load(Ordering::Relaxed);
        let failed = metrics.failed.load(Ordering::Relaxed);
        let rejected = metrics.rejected.load(Ordering::Relaxed);
        let cancelled = metrics.cancelled.load(Ordering::Relaxed);
        let total_requests = succeeded + failed + rejected + cancelled;

        let mut latencies = metrics.latencies_us.lock().clone();
        latencies.sort_unstable();

        let throughput_rps = if elapsed.as_secs_f64() > 0.0 {
            total_requests as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let report = LoadTestReport {
            total_requests,
            succeeded,
            failed,
            rejected,
            cancelled,
            latency_p50_us: percentile(&latencies, 50),
            latency_p95_us: percentile(&latencies, 95),
            latency_p99_us: percentile(&latencies, 99),
            throughput_rps,
            final_state: self.breaker.state(),
        };

        tracing::info!(
            total = report.total_requests,
            succeeded = report.succeeded,
            failed = report.failed,
            rejected = report.rejected,
            throughput_rps = format!("{throughput_rps:.2}"),
            p50_us = report.latency_p50_us,
            p99_us = report.latency_p99_us,
            final_state = %report.final_state,
            "load test completed"
        );
        Ok(report)
    }
}

/// Computes percentile from sorted slice.
fn percentile(sorted: &[u64], p: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = (sorted.len() * p / 100).min(sorted.len() - 1);
    sorted[idx]
}

/// Load test report.
#[derive(Debug, Clone)]
pub struct LoadTestReport {
    /// Requests issued.
    pub total_requests: u64,
    /// Requests that reached the downstream and succeeded.
    pub succeeded: u64,
    /// Requests that reached the downstream and failed.
    pub failed: u64,
    /// Requests rejected by the circuit.
    pub rejected: u64,
    /// Requests cancelled by the caller.
    pub cancelled: u64,
    /// P50 latency of admitted requests in microseconds.
    pub latency_p50_us: u64,
    /// P95 latency of admitted requests in microseconds.
    pub latency_p95_us: u64,
    /// P99 latency of admitted requests in microseconds.
    pub latency_p99_us: u64,
    /// Throughput in requests per second.
    pub throughput_rps: f64,
    /// Circuit state when the test finished.
    pub final_state: CircuitState,
}

impl LoadTestReport {
    /// Returns requests that reached the downstream.
    #[must_use]
    pub const fn admitted(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Returns the rejected share of all requests (0.0 to 1.0).
    #[must_use]
    pub fn rejection_rate(&self) -> f64 {
        if self.total_requests > 0 {
            self.rejected as f64 / self.total_requests as f64
        } else {
            0.0
        }
    }

    /// Returns the failed share of admitted requests (0.0 to 1.0).
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        let admitted = self.admitted();
        if admitted > 0 {
            self.failed as f64 / admitted as f64
        } else {
            0.0
        }
    }
}
