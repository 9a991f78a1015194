//! Circuit state machine.
//!
//! Every check-then-transition runs under one mutex. The committed state is
//! mirrored into an atomic written only under that mutex, so observers read
//! it lock-free and never see an intermediate value.
//!
//! Each transition bumps an epoch. Admission hands out a [`Permit`] stamped
//! with the epoch it was granted in; outcomes arriving with an older epoch
//! belong to a previous cycle and are dropped instead of bleeding into the
//! fresh statistics.
//!
//! User code never runs under the mutex. A breach records its outcome under
//! the lock, resolves the break duration after releasing it, and commits
//! Open only if the epoch is unchanged. Hooks are dispatched after the lock
//! is dropped, so they fire in commit order for any single caller; two
//! transitions committed from different threads may reach the hooks in
//! either order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tripwire_core::{
    CircuitBreakerConfig, CircuitId, CircuitMetrics, CircuitState, OutcomeKind, ResilienceContext,
    TimeProvider,
};

use crate::break_duration::{BreakDurationArgs, BreakDurationPolicy};
use crate::error::Rejection;
use crate::hooks::{Hooks, OnClosedArgs, OnHalfOpenedArgs, OnOpenedArgs, Transition};
use crate::window::{HealthSnapshot, HealthWindow};

/// The most recent handled failure seen by a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastHandledOutcome {
    /// When the outcome was recorded.
    pub at: Instant,
    /// True if the operation returned `Err`, false for a handled `Ok` result.
    pub was_error: bool,
}

/// Admission ticket for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Permit {
    epoch: u64,
    trial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    At(Instant),
    Never,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    window: HealthWindow,
    deadline: Deadline,
    break_duration: Duration,
    consecutive_breaks: u32,
    trials_in_flight: u32,
    epoch: u64,
    last_handled: Option<LastHandledOutcome>,
}

/// Result of feeding one outcome to the state machine.
enum Verdict {
    Stay,
    Commit(Transition),
    Break(PendingBreak),
}

/// A breach seen under the lock, waiting for its break duration.
#[derive(Debug, Clone, Copy)]
struct PendingBreak {
    epoch: u64,
    args: BreakDurationArgs,
    snapshot: HealthSnapshot,
    kind: OutcomeKind,
    now: Instant,
}

impl PendingBreak {
    fn new(
        inner: &Inner,
        now: Instant,
        snapshot: HealthSnapshot,
        is_half_open: bool,
        kind: OutcomeKind,
    ) -> Self {
        Self {
            epoch: inner.epoch,
            args: BreakDurationArgs {
                consecutive_breaks: inner.consecutive_breaks.saturating_add(1),
                failure_count: snapshot.failures,
                failure_ratio: snapshot.raw_failure_ratio(),
                is_half_open,
            },
            snapshot,
            kind,
            now,
        }
    }
}

/// Static settings of one controller.
#[derive(Debug)]
pub(crate) struct ControllerSettings {
    pub(crate) id: CircuitId,
    pub(crate) name: Arc<str>,
    pub(crate) config: CircuitBreakerConfig,
    pub(crate) break_policy: BreakDurationPolicy,
    pub(crate) clock: Arc<dyn TimeProvider>,
    pub(crate) hooks: Hooks,
    pub(crate) metrics: CircuitMetrics,
    pub(crate) start_isolated: bool,
}

/// Owner of the circuit state.
#[derive(Debug)]
pub(crate) struct CircuitController {
    id: CircuitId,
    name: Arc<str>,
    failure_ratio: f64,
    half_open_max_trials: u32,
    break_policy: BreakDurationPolicy,
    clock: Arc<dyn TimeProvider>,
    hooks: Hooks,
    metrics: CircuitMetrics,
    state: AtomicU8,
    inner: Mutex<Inner>,
}

impl CircuitController {
    pub(crate) fn new(settings: ControllerSettings) -> Self {
        let ControllerSettings {
            id,
            name,
            config,
            break_policy,
            clock,
            hooks,
            metrics,
            start_isolated,
        } = settings;

        let (state, break_duration) = if start_isolated {
            (CircuitState::Isolated, Duration::MAX)
        } else {
            (CircuitState::Closed, Duration::ZERO)
        };
        let window = HealthWindow::new(
            config.window,
            config.sampling_duration,
            config.minimum_throughput,
        );

        Self {
            id,
            name,
            failure_ratio: config.failure_ratio,
            half_open_max_trials: config.half_open_max_trials,
            break_policy,
            clock,
            hooks,
            metrics,
            state: AtomicU8::new(state.as_u8()),
            inner: Mutex::new(Inner {
                state,
                window,
                deadline: Deadline::Never,
                break_duration,
                consecutive_breaks: 0,
                trials_in_flight: 0,
                epoch: 0,
                last_handled: None,
            }),
        }
    }

    pub(crate) const fn id(&self) -> CircuitId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) const fn metrics(&self) -> &CircuitMetrics {
        &self.metrics
    }

    /// Returns the last committed state without locking.
    pub(crate) fn current_state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub(crate) fn last_handled_outcome(&self) -> Option<LastHandledOutcome> {
        self.inner.lock().last_handled
    }

    /// Returns live statistics of the window.
    pub(crate) fn health(&self) -> HealthSnapshot {
        let now = self.clock.now();
        self.inner.lock().window.snapshot(now)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Execution path
    // ═══════════════════════════════════════════════════════════════════════════

    /// Decides whether an execution may run.
    pub(crate) fn acquire(&self, context: &ResilienceContext) -> Result<Permit, Rejection> {
        let now = self.clock.now();
        let (decision, transition) = {
            let mut inner = self.inner.lock();
            let (state, deadline) = (inner.state, inner.deadline);
            match state {
                CircuitState::Closed => (
                    Ok(Permit {
                        epoch: inner.epoch,
                        trial: false,
                    }),
                    None,
                ),
                CircuitState::Isolated => (Err(Rejection::Isolated), None),
                CircuitState::Open => match deadline {
                    Deadline::At(at) if now >= at => {
                        let transition = self.half_open(&mut inner, context);
                        inner.trials_in_flight = 1;
                        (
                            Ok(Permit {
                                epoch: inner.epoch,
                                trial: true,
                            }),
                            Some(transition),
                        )
                    }
                    Deadline::At(at) => (
                        Err(Rejection::BrokenCircuit {
                            retry_after: at.saturating_duration_since(now),
                        }),
                        None,
                    ),
                    Deadline::Never => (
                        Err(Rejection::BrokenCircuit {
                            retry_after: Duration::MAX,
                        }),
                        None,
                    ),
                },
                CircuitState::HalfOpen if inner.trials_in_flight < self.half_open_max_trials => {
                    inner.trials_in_flight += 1;
                    (
                        Ok(Permit {
                            epoch: inner.epoch,
                            trial: true,
                        }),
                        None,
                    )
                }
                CircuitState::HalfOpen => (
                    Err(Rejection::BrokenCircuit {
                        retry_after: inner.break_duration,
                    }),
                    None,
                ),
            }
        };

        match &decision {
            Ok(_) => self.metrics.record_execution(),
            Err(rejection) => {
                self.metrics.record_rejection();
                tracing::debug!(
                    target: "tripwire::breaker",
                    name = %self.name,
                    id = %self.id,
                    %rejection,
                    "execution rejected"
                );
            }
        }
        self.dispatch(transition);
        decision
    }

    /// Feeds a classified outcome back into the state machine.
    pub(crate) fn record(
        &self,
        permit: Permit,
        kind: OutcomeKind,
        was_error: bool,
        context: &ResilienceContext,
    ) {
        match kind {
            OutcomeKind::Success => self.metrics.record_success(),
            OutcomeKind::HandledFailure => self.metrics.record_handled_failure(),
            OutcomeKind::UnhandledFailure => self.metrics.record_unhandled_failure(),
        }

        let now = self.clock.now();
        let verdict = {
            let mut inner = self.inner.lock();
            if kind == OutcomeKind::HandledFailure {
                inner.last_handled = Some(LastHandledOutcome { at: now, was_error });
            }
            if inner.epoch != permit.epoch {
                tracing::trace!(
                    target: "tripwire::breaker",
                    name = %self.name,
                    permit_epoch = permit.epoch,
                    epoch = inner.epoch,
                    "stale outcome ignored"
                );
                return;
            }

            let state = inner.state;
            match state {
                CircuitState::Closed => {
                    inner.window.record(kind, now);
                    let snapshot = inner.window.snapshot(now);
                    if kind.is_recorded() && snapshot.breaches(self.failure_ratio) {
                        Verdict::Break(PendingBreak::new(&inner, now, snapshot, false, kind))
                    } else {
                        Verdict::Stay
                    }
                }
                CircuitState::HalfOpen if permit.trial => match kind {
                    OutcomeKind::Success => {
                        Verdict::Commit(self.close(&mut inner, Some(kind), context))
                    }
                    OutcomeKind::HandledFailure => {
                        inner.window.record(kind, now);
                        let snapshot = inner.window.snapshot(now);
                        Verdict::Break(PendingBreak::new(&inner, now, snapshot, true, kind))
                    }
                    OutcomeKind::UnhandledFailure => {
                        inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
                        Verdict::Stay
                    }
                },
                // Permits are epoch-bound, so nothing else can match.
                CircuitState::HalfOpen | CircuitState::Open | CircuitState::Isolated => {
                    Verdict::Stay
                }
            }
        };

        let transition = match verdict {
            Verdict::Stay => None,
            Verdict::Commit(transition) => Some(transition),
            Verdict::Break(pending) => self.open(pending, context),
        };
        self.dispatch(transition);
    }

    /// Returns a permit whose execution produced no outcome.
    pub(crate) fn release(&self, permit: Permit) {
        if !permit.trial {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.epoch == permit.epoch && inner.state == CircuitState::HalfOpen {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }

    /// Returns the permit of a cancelled execution.
    pub(crate) fn cancel(&self, permit: Permit) {
        self.metrics.record_cancellation();
        self.release(permit);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Manual commands
    // ═══════════════════════════════════════════════════════════════════════════

    /// Forces the circuit into Isolated. Idempotent.
    pub(crate) fn isolate(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            if inner.state == CircuitState::Isolated {
                return;
            }
            inner.deadline = Deadline::Never;
            inner.break_duration = Duration::MAX;
            inner.window.reset();
            self.commit(&mut inner, CircuitState::Isolated);
            Transition::Opened(OnOpenedArgs {
                break_duration: Duration::MAX,
                is_manual: true,
                outcome_kind: None,
                context: ResilienceContext::new(),
            })
        };

        self.metrics.record_isolation();
        tracing::warn!(
            target: "tripwire::breaker",
            name = %self.name,
            id = %self.id,
            "circuit isolated"
        );
        self.dispatch(Some(transition));
    }

    /// Forces the circuit into Closed. No-op when already Closed.
    pub(crate) fn close_manually(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            if inner.state == CircuitState::Closed {
                return;
            }
            self.close(&mut inner, None, &ResilienceContext::new())
        };
        self.dispatch(Some(transition));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Transitions (called with the lock held)
    // ═══════════════════════════════════════════════════════════════════════════

    /// Resolves the break duration with the lock released, then commits Open
    /// unless another transition won in between.
    fn open(&self, pending: PendingBreak, context: &ResilienceContext) -> Option<Transition> {
        let break_duration = self.break_policy.resolve(pending.args);

        let mut inner = self.inner.lock();
        if inner.epoch != pending.epoch {
            tracing::trace!(
                target: "tripwire::breaker",
                name = %self.name,
                pending_epoch = pending.epoch,
                epoch = inner.epoch,
                "break superseded"
            );
            return None;
        }
        inner.consecutive_breaks = pending.args.consecutive_breaks;
        inner.break_duration = break_duration;
        inner.deadline = pending
            .now
            .checked_add(break_duration)
            .map_or(Deadline::Never, Deadline::At);
        inner.window.reset();
        self.commit(&mut inner, CircuitState::Open);
        drop(inner);

        self.metrics.record_trip();
        tracing::warn!(
            target: "tripwire::breaker",
            name = %self.name,
            id = %self.id,
            failures = pending.snapshot.failures,
            total = pending.snapshot.total,
            consecutive_breaks = pending.args.consecutive_breaks,
            ?break_duration,
            "circuit opened"
        );
        Some(Transition::Opened(OnOpenedArgs {
            break_duration,
            is_manual: false,
            outcome_kind: Some(pending.kind),
            context: context.clone(),
        }))
    }

    fn half_open(&self, inner: &mut Inner, context: &ResilienceContext) -> Transition {
        self.commit(inner, CircuitState::HalfOpen);
        tracing::info!(
            target: "tripwire::breaker",
            name = %self.name,
            id = %self.id,
            "circuit half-open, admitting trial"
        );
        Transition::HalfOpened(OnHalfOpenedArgs {
            context: context.clone(),
        })
    }

    fn close(
        &self,
        inner: &mut Inner,
        kind: Option<OutcomeKind>,
        context: &ResilienceContext,
    ) -> Transition {
        let is_manual = kind.is_none();
        inner.deadline = Deadline::Never;
        inner.break_duration = Duration::ZERO;
        inner.consecutive_breaks = 0;
        inner.window.reset();
        self.commit(inner, CircuitState::Closed);

        if !is_manual {
            self.metrics.record_recovery();
        }
        tracing::info!(
            target: "tripwire::breaker",
            name = %self.name,
            id = %self.id,
            is_manual,
            "circuit closed"
        );
        Transition::Closed(OnClosedArgs {
            is_manual,
            outcome_kind: kind,
            context: context.clone(),
        })
    }

    fn commit(&self, inner: &mut Inner, state: CircuitState) {
        inner.state = state;
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.trials_in_flight = 0;
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn dispatch(&self, transition: Option<Transition>) {
        if let Some(transition) = transition {
            self.hooks.dispatch(&transition);
        }
    }
}
