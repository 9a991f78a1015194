//! Fault injection for resilience testing.
//!
//! Faults are drawn from a seeded [`StdRng`], so a failing run can be
//! replayed from its seed.
//!
//! # Reference
//! Netflix. (2012). Chaos Monkey. GitHub.
//! <https://github.com/Netflix/chaosmonkey>

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::downstream::SimError;
use crate::error::{Result, TestError};

/// Fault injection configuration.
#[derive(Debug, Clone, Default)]
pub struct ChaosConfig {
    /// Probability of a transient (handled) failure.
    pub error_rate: Option<f64>,
    /// Probability of a fatal (unhandled) failure, drawn after `error_rate`.
    pub fatal_rate: Option<f64>,
    /// Latency injection: (probability, delay).
    pub latency_injection: Option<(f64, Duration)>,
}

impl ChaosConfig {
    /// Creates a config injecting transient errors.
    #[must_use]
    pub fn errors(probability: f64) -> Self {
        Self {
            error_rate: Some(probability),
            ..Default::default()
        }
    }

    /// Creates a config injecting latency.
    #[must_use]
    pub fn latency(probability: f64, delay: Duration) -> Self {
        Self {
            latency_injection: Some((probability, delay)),
            ..Default::default()
        }
    }

    /// Validates that every probability lies in [0, 1].
    ///
    /// # Errors
    /// Returns an error naming the first out-of-range probability.
    pub fn validate(&self) -> Result<()> {
        let probabilities = [
            ("error_rate", self.error_rate),
            ("fatal_rate", self.fatal_rate),
            ("latency_injection", self.latency_injection.map(|(p, _)| p)),
        ];
        for (name, probability) in probabilities {
            if let Some(p) = probability
                && !(0.0..=1.0).contains(&p)
            {
                return Err(TestError::Chaos(format!(
                    "{name} must be in [0, 1], got {p}"
                )));
            }
        }
        Ok(())
    }
}

/// Seeded fault injector.
#[derive(Debug)]
pub struct FaultInjector {
    config: ChaosConfig,
    rng: Mutex<StdRng>,
    active: AtomicBool,
}

impl FaultInjector {
    /// Creates an active injector.
    ///
    /// # Errors
    /// Returns an error if the config is invalid.
    pub fn new(config: ChaosConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            active: AtomicBool::new(true),
        })
    }

    /// Resumes injection.
    pub fn start(&self) {
        tracing::warn!(config = ?self.config, "starting fault injection");
        self.active.store(true, Ordering::Release);
    }

    /// Suspends injection.
    pub fn stop(&self) {
        tracing::info!("stopping fault injection");
        self.active.store(false, Ordering::Release);
    }

    /// Returns true if injection is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns the config.
    #[must_use]
    pub const fn config(&self) -> &ChaosConfig {
        &self.config
    }

    /// Draws the fault for the next call, if any.
    pub fn next_fault(&self) -> Option<SimError> {
        if !self.is_active() {
            return None;
        }
        let mut rng = self.rng.lock();
        if self.config.error_rate.is_some_and(|p| rng.random_bool(p)) {
            tracing::debug!("injecting transient failure");
            return Some(SimError::Transient);
        }
        if self.config.fatal_rate.is_some_and(|p| rng.random_bool(p)) {
            tracing::debug!("injecting fatal failure");
            return Some(SimError::Fatal);
        }
        None
    }

    /// Draws the latency for the next call, if any.
    pub fn next_latency(&self) -> Option<Duration> {
        if !self.is_active() {
            return None;
        }
        let (probability, delay) = self.config.latency_injection?;
        self.rng.lock().random_bool(probability).then_some(delay)
    }

    /// Sleeps for the drawn latency, if any.
    pub async fn maybe_inject_latency(&self) {
        if let Some(delay) = self.next_latency() {
            tracing::debug!("injecting latency: {delay:?}");
            tokio::time::sleep(delay).await;
        }
    }
}
