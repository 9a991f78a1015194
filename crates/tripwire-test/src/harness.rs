//! Circuit breaker test harness.
//!
//! Builds a breaker over a [`ManualClock`], classifies
//! [`SimError::Transient`] as the handled failure, records every transition
//! and counts how often the guarded operation actually ran.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tripwire_breaker::{
    CircuitBreaker, CircuitBreakerOptions, ExecutionError, HealthSnapshot, ManualControl,
    PredicateBuilder, StateProvider,
};
use tripwire_core::{
    CircuitBreakerConfig, CircuitState, ManualClock, ResilienceContext, WindowKind,
};

use crate::downstream::SimError;
use crate::error::Result;

/// Transition observed through the breaker's hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    /// The circuit opened or was isolated.
    Opened {
        /// Break duration reported to the hook.
        break_duration: Duration,
        /// True for manual isolation.
        is_manual: bool,
    },
    /// The circuit closed.
    Closed {
        /// True for a manual close.
        is_manual: bool,
    },
    /// The circuit admitted a trial.
    HalfOpened,
}

/// One scripted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Execute an operation that succeeds.
    Succeed,
    /// Execute an operation failing with a handled error.
    Fail,
    /// Execute an operation failing with an unhandled error.
    FailUnhandled,
    /// Advance the clock.
    Advance(Duration),
}

/// Installs a test-friendly tracing subscriber honouring `RUST_LOG`.
///
/// Safe to call from many tests; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Test harness driving one breaker with a manual clock.
pub struct BreakerTestHarness {
    clock: ManualClock,
    breaker: CircuitBreaker<u64, SimError>,
    manual: ManualControl,
    provider: StateProvider,
    events: Arc<Mutex<Vec<TransitionEvent>>>,
    invocations: Arc<AtomicU64>,
}

impl BreakerTestHarness {
    /// Creates a new harness builder.
    #[must_use]
    pub fn builder() -> BreakerTestHarnessBuilder {
        BreakerTestHarnessBuilder::default()
    }

    /// Runs an operation returning `Ok(n)`, where `n` counts invocations.
    ///
    /// # Errors
    /// Returns the breaker's execution error.
    pub async fn succeed(&self) -> std::result::Result<u64, ExecutionError<SimError>> {
        self.execute(None).await
    }

    /// Runs an operation failing with [`SimError::Transient`].
    ///
    /// # Errors
    /// Always returns an error: the operation's or a rejection.
    pub async fn fail(&self) -> std::result::Result<u64, ExecutionError<SimError>> {
        self.execute(Some(SimError::Transient)).await
    }

    /// Runs an operation failing with [`SimError::Fatal`].
    ///
    /// # Errors
    /// Always returns an error: the operation's or a rejection.
    pub async fn fail_unhandled(&self) -> std::result::Result<u64, ExecutionError<SimError>> {
        self.execute(Some(SimError::Fatal)).await
    }

    /// Plays a script, returning the result of every execution step.
    pub async fn play(
        &self,
        script: &[Step],
    ) -> Vec<std::result::Result<u64, ExecutionError<SimError>>> {
        let mut results = Vec::with_capacity(script.len());
        for step in script {
            match *step {
                Step::Succeed => results.push(self.succeed().await),
                Step::Fail => results.push(self.fail().await),
                Step::FailUnhandled => results.push(self.fail_unhandled().await),
                Step::Advance(by) => self.advance(by),
            }
        }
        results
    }

    /// Advances the shared clock.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Returns the state as reported by the state provider.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.provider.circuit_state()
    }

    /// Returns live window statistics.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        self.breaker.health()
    }

    /// Returns the transitions observed so far.
    #[must_use]
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().clone()
    }

    /// Clears recorded transitions.
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Returns how many times the guarded operation ran.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Returns the breaker under test.
    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker<u64, SimError> {
        &self.breaker
    }

    /// Returns the manual control attached to the breaker.
    #[must_use]
    pub const fn manual(&self) -> &ManualControl {
        &self.manual
    }

    /// Returns the state provider attached to the breaker.
    #[must_use]
    pub const fn provider(&self) -> &StateProvider {
        &self.provider
    }

    /// Returns the shared clock.
    #[must_use]
    pub const fn clock(&self) -> &ManualClock {
        &self.clock
    }

    async fn execute(
        &self,
        failure: Option<SimError>,
    ) -> std::result::Result<u64, ExecutionError<SimError>> {
        let invocations = Arc::clone(&self.invocations);
        self.breaker
            .execute(&ResilienceContext::new(), |_| async move {
                let n = invocations.fetch_add(1, Ordering::SeqCst) + 1;
                failure.map_or(Ok(n), Err)
            })
            .await
    }
}

/// Builder for [`BreakerTestHarness`].
#[derive(Debug, Default)]
pub struct BreakerTestHarnessBuilder {
    config: CircuitBreakerConfig,
    exponential: Option<(Duration, Duration)>,
    isolated: bool,
}

impl BreakerTestHarnessBuilder {
    /// Replaces the whole configuration.
    #[must_use]
    pub fn with_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the failure ratio threshold.
    #[must_use]
    pub const fn with_failure_ratio(mut self, ratio: f64) -> Self {
        self.config.failure_ratio = ratio;
        self
    }

    /// Sets the minimum throughput.
    #[must_use]
    pub const fn with_minimum_throughput(mut self, throughput: u32) -> Self {
        self.config.minimum_throughput = throughput;
        self
    }

    /// Sets the sampling duration.
    #[must_use]
    pub const fn with_sampling_duration(mut self, duration: Duration) -> Self {
        self.config.sampling_duration = duration;
        self
    }

    /// Sets a fixed break duration.
    #[must_use]
    pub const fn with_break_duration(mut self, duration: Duration) -> Self {
        self.config.break_duration = duration;
        self
    }

    /// Uses an exponential break duration.
    #[must_use]
    pub const fn with_exponential_break(mut self, base: Duration, ceiling: Duration) -> Self {
        self.exponential = Some((base, ceiling));
        self
    }

    /// Sets the number of concurrent half-open trials.
    #[must_use]
    pub const fn with_half_open_max_trials(mut self, trials: u32) -> Self {
        self.config.half_open_max_trials = trials;
        self
    }

    /// Sets the window shape.
    #[must_use]
    pub const fn with_window(mut self, window: WindowKind) -> Self {
        self.config.window = window;
        self
    }

    /// Starts the breaker Isolated.
    #[must_use]
    pub const fn isolated(mut self) -> Self {
        self.isolated = true;
        self
    }

    /// Builds the harness.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<BreakerTestHarness> {
        let clock = ManualClock::new();
        let manual = if self.isolated {
            ManualControl::new_isolated()
        } else {
            ManualControl::new()
        };
        let provider = StateProvider::new();
        let events = Arc::new(Mutex::new(Vec::new()));

        let opened = Arc::clone(&events);
        let closed = Arc::clone(&events);
        let half_opened = Arc::clone(&events);
        let mut options = CircuitBreakerOptions::from_config(self.config)
            .with_name("harness")
            .with_should_handle(
                PredicateBuilder::<u64, SimError>::new()
                    .handle_error(SimError::is_transient)
                    .build(),
            )
            .with_time_provider(Arc::new(clock.clone()))
            .with_manual_control(manual.clone())
            .with_state_provider(provider.clone())
            .on_opened(move |args| {
                opened.lock().push(TransitionEvent::Opened {
                    break_duration: args.break_duration,
                    is_manual: args.is_manual,
                });
            })
            .on_closed(move |args| {
                closed.lock().push(TransitionEvent::Closed {
                    is_manual: args.is_manual,
                });
            })
            .on_half_opened(move |_| half_opened.lock().push(TransitionEvent::HalfOpened));
        if let Some((base, ceiling)) = self.exponential {
            options = options.with_exponential_break(base, ceiling);
        }

        Ok(BreakerTestHarness {
            clock,
            breaker: options.build()?,
            manual,
            provider,
            events,
            invocations: Arc::new(AtomicU64::new(0)),
        })
    }
}
