//! Circuit breaker options.
//!
//! Serialisable settings come from [`CircuitBreakerConfig`]; predicates,
//! hooks and handles are attached here before [`CircuitBreakerOptions::build`].

use std::sync::Arc;
use std::time::Duration;

use tripwire_core::{
    CircuitBreakerConfig, CircuitId, CircuitMetrics, Result, SystemClock, TimeProvider,
    TripwireError, WindowKind,
};

use crate::break_duration::{BreakDurationArgs, BreakDurationPolicy};
use crate::controller::{CircuitController, ControllerSettings};
use crate::hooks::{Hooks, OnClosedArgs, OnHalfOpenedArgs, OnOpenedArgs};
use crate::manual::ManualControl;
use crate::predicate::{ShouldHandle, handle_all_errors};
use crate::provider::StateProvider;
use crate::strategy::CircuitBreaker;

/// Builder for a [`CircuitBreaker`].
///
/// ```rust,ignore
/// let breaker = CircuitBreakerOptions::<Response, io::Error>::new()
///     .with_name("orders")
///     .with_failure_ratio(0.5)
///     .with_sampling_duration(Duration::from_secs(10))
///     .with_minimum_throughput(8)
///     .with_break_duration(Duration::from_secs(30))
///     .on_opened(|args| tracing::warn!(?args.break_duration, "orders circuit open"))
///     .build()?;
/// ```
pub struct CircuitBreakerOptions<T, E> {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    break_policy: Option<BreakDurationPolicy>,
    should_handle: ShouldHandle<T, E>,
    hooks: Hooks,
    manual_control: Option<ManualControl>,
    state_provider: Option<StateProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl<T, E> std::fmt::Debug for CircuitBreakerOptions<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerOptions")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("break_policy", &self.break_policy)
            .field("hooks", &self.hooks)
            .field("manual_control", &self.manual_control.is_some())
            .field("state_provider", &self.state_provider.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: 'static, E: 'static> Default for CircuitBreakerOptions<T, E> {
    fn default() -> Self {
        Self::from_config(CircuitBreakerConfig::default())
    }
}

impl<T: 'static, E: 'static> CircuitBreakerOptions<T, E> {
    /// Creates options with library defaults, handling every `Err`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options from a loaded configuration.
    #[must_use]
    pub fn from_config(config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from("default"),
            config,
            break_policy: None,
            should_handle: handle_all_errors(),
            hooks: Hooks::default(),
            manual_control: None,
            state_provider: None,
            time_provider: Arc::new(SystemClock),
        }
    }
}

impl<T, E> CircuitBreakerOptions<T, E> {
    /// Sets the circuit name used in logs.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the failure ratio threshold.
    #[must_use]
    pub fn with_failure_ratio(mut self, ratio: f64) -> Self {
        self.config.failure_ratio = ratio;
        self
    }

    /// Sets the sampling duration.
    #[must_use]
    pub fn with_sampling_duration(mut self, duration: Duration) -> Self {
        self.config.sampling_duration = duration;
        self
    }

    /// Sets the minimum throughput.
    #[must_use]
    pub fn with_minimum_throughput(mut self, throughput: u32) -> Self {
        self.config.minimum_throughput = throughput;
        self
    }

    /// Sets a fixed break duration.
    #[must_use]
    pub fn with_break_duration(mut self, duration: Duration) -> Self {
        self.config.break_duration = duration;
        self
    }

    /// Computes the break duration per break, overriding the fixed value.
    ///
    /// The generator runs without the circuit lock held, so it may query the
    /// circuit through a [`StateProvider`] or drive it through a
    /// [`ManualControl`]. If another transition commits while it runs, the
    /// pending break is dropped.
    #[must_use]
    pub fn with_break_duration_generator<G>(mut self, generator: G) -> Self
    where
        G: Fn(BreakDurationArgs) -> Duration + Send + Sync + 'static,
    {
        self.break_policy = Some(BreakDurationPolicy::Generated(Arc::new(generator)));
        self
    }

    /// Doubles the break duration on each consecutive break, up to `ceiling`.
    #[must_use]
    pub fn with_exponential_break(mut self, base: Duration, ceiling: Duration) -> Self {
        self.break_policy = Some(BreakDurationPolicy::exponential(base, ceiling));
        self
    }

    /// Sets the number of concurrent half-open trials.
    #[must_use]
    pub fn with_half_open_max_trials(mut self, trials: u32) -> Self {
        self.config.half_open_max_trials = trials;
        self
    }

    /// Sets the window shape.
    #[must_use]
    pub fn with_window(mut self, window: WindowKind) -> Self {
        self.config.window = window;
        self
    }

    /// Sets the failure classification predicate.
    #[must_use]
    pub fn with_should_handle(mut self, should_handle: ShouldHandle<T, E>) -> Self {
        self.should_handle = should_handle;
        self
    }

    /// Attaches a manual control handle.
    #[must_use]
    pub fn with_manual_control(mut self, control: ManualControl) -> Self {
        self.manual_control = Some(control);
        self
    }

    /// Attaches a state provider.
    #[must_use]
    pub fn with_state_provider(mut self, provider: StateProvider) -> Self {
        self.state_provider = Some(provider);
        self
    }

    /// Replaces the clock used for windows and deadlines.
    #[must_use]
    pub fn with_time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = clock;
        self
    }

    /// Adds an `on_opened` subscriber.
    #[must_use]
    pub fn on_opened(mut self, hook: impl Fn(&OnOpenedArgs) + Send + Sync + 'static) -> Self {
        self.hooks.on_opened(hook);
        self
    }

    /// Adds an `on_closed` subscriber.
    #[must_use]
    pub fn on_closed(mut self, hook: impl Fn(&OnClosedArgs) + Send + Sync + 'static) -> Self {
        self.hooks.on_closed(hook);
        self
    }

    /// Adds an `on_half_opened` subscriber.
    #[must_use]
    pub fn on_half_opened(
        mut self,
        hook: impl Fn(&OnHalfOpenedArgs) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_half_opened(hook);
        self
    }

    /// Returns the configuration as currently set.
    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Validates the options and builds the breaker.
    ///
    /// # Errors
    /// Returns an error if the configuration is out of range or the state
    /// provider is already attached to another breaker.
    pub fn build(self) -> Result<CircuitBreaker<T, E>> {
        self.config.validate()?;
        if self.state_provider.as_ref().is_some_and(StateProvider::is_bound) {
            return Err(TripwireError::attachment(
                "state provider is already attached to a circuit breaker",
            ));
        }

        let Self {
            name,
            config,
            break_policy,
            should_handle,
            hooks,
            manual_control,
            state_provider,
            time_provider,
        } = self;

        let break_policy =
            break_policy.unwrap_or(BreakDurationPolicy::Fixed(config.break_duration));
        let build = |start_isolated: bool| {
            Arc::new(CircuitController::new(ControllerSettings {
                id: CircuitId::new(),
                name: Arc::clone(&name),
                config: config.clone(),
                break_policy,
                clock: time_provider,
                hooks,
                metrics: CircuitMetrics::new(),
                start_isolated,
            }))
        };
        let controller = match &manual_control {
            Some(control) => control.register(build),
            None => build(false),
        };

        if let Some(provider) = &state_provider {
            provider.attach(&controller)?;
        }

        tracing::debug!(
            name = %name,
            id = %controller.id(),
            failure_ratio = config.failure_ratio,
            minimum_throughput = config.minimum_throughput,
            "circuit breaker built"
        );
        Ok(CircuitBreaker::new(controller, should_handle))
    }
}
