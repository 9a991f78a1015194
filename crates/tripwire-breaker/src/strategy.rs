//! Execution gate.
//!
//! [`CircuitBreaker::execute`] consults the state machine, runs the operation
//! with no lock held, classifies the outcome and feeds it back. Transition
//! hooks have run by the time `execute` returns.

use std::future::Future;
use std::sync::Arc;

use tripwire_core::{CircuitId, CircuitMetrics, CircuitState, OutcomeKind, ResilienceContext};

use crate::controller::{CircuitController, Permit};
use crate::error::{ExecutionError, Rejection};
use crate::predicate::ShouldHandle;
use crate::window::HealthSnapshot;

/// Result of [`CircuitBreaker::execute_outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The operation ran and returned `Ok`.
    Ok(T),
    /// The operation ran and returned `Err`.
    Err(E),
    /// The circuit refused to run the operation.
    Rejected(Rejection),
    /// The caller cancelled the execution.
    Cancelled,
}

impl<T, E> Outcome<T, E> {
    /// Returns true if the circuit refused to run the operation.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Converts into the error-propagating form returned by `execute`.
    pub fn into_result(self) -> Result<T, ExecutionError<E>> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Err(error) => Err(ExecutionError::Operation(error)),
            Self::Rejected(rejection) => Err(rejection.into()),
            Self::Cancelled => Err(ExecutionError::Cancelled),
        }
    }
}

/// Circuit breaker guarding operations returning `Result<T, E>`.
///
/// Cheap to clone; clones share one circuit.
pub struct CircuitBreaker<T, E> {
    controller: Arc<CircuitController>,
    should_handle: ShouldHandle<T, E>,
}

impl<T, E> Clone for CircuitBreaker<T, E> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            should_handle: Arc::clone(&self.should_handle),
        }
    }
}

impl<T, E> std::fmt::Debug for CircuitBreaker<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.controller.name())
            .field("id", &self.controller.id())
            .field("state", &self.controller.current_state())
            .finish_non_exhaustive()
    }
}

impl<T, E> CircuitBreaker<T, E> {
    pub(crate) fn new(controller: Arc<CircuitController>, should_handle: ShouldHandle<T, E>) -> Self {
        Self {
            controller,
            should_handle,
        }
    }

    /// Returns the circuit name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.controller.name()
    }

    /// Returns the circuit identifier.
    #[must_use]
    pub fn id(&self) -> CircuitId {
        self.controller.id()
    }

    /// Returns the last committed state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.controller.current_state()
    }

    /// Returns the circuit counters.
    #[must_use]
    pub fn metrics(&self) -> &CircuitMetrics {
        self.controller.metrics()
    }

    /// Returns live window statistics.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        self.controller.health()
    }

    /// Runs `operation` through the circuit.
    ///
    /// # Errors
    /// Returns [`ExecutionError::BrokenCircuit`] or [`ExecutionError::Isolated`]
    /// when rejected, [`ExecutionError::Operation`] with the operation's own
    /// error, or [`ExecutionError::Cancelled`] when the context is cancelled.
    pub async fn execute<F, Fut>(
        &self,
        context: &ResilienceContext,
        operation: F,
    ) -> Result<T, ExecutionError<E>>
    where
        F: FnOnce(ResilienceContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_outcome(context, operation).await.into_result()
    }

    /// Runs `operation` through the circuit, reporting rejection as a value.
    pub async fn execute_outcome<F, Fut>(
        &self,
        context: &ResilienceContext,
        operation: F,
    ) -> Outcome<T, E>
    where
        F: FnOnce(ResilienceContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if context.is_cancelled() {
            return Outcome::Cancelled;
        }

        let permit = match self.controller.acquire(context) {
            Ok(permit) => permit,
            Err(rejection) => return Outcome::Rejected(rejection),
        };
        let guard = PermitGuard::new(&self.controller, permit);

        let cancellation = context.cancellation().clone();
        let result = tokio::select! {
            biased;
            () = cancellation.cancelled() => None,
            result = operation(context.clone()) => Some(result),
        };

        let Some(result) = result else {
            guard.cancel();
            return Outcome::Cancelled;
        };

        let kind = self.classify(&result);
        guard.finish(kind, result.is_err(), context);
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(error) => Outcome::Err(error),
        }
    }

    fn classify(&self, result: &Result<T, E>) -> OutcomeKind {
        if (self.should_handle)(result) {
            OutcomeKind::HandledFailure
        } else if result.is_ok() {
            OutcomeKind::Success
        } else {
            OutcomeKind::UnhandledFailure
        }
    }
}

/// Releases an admission permit if the execution ends without an outcome.
struct PermitGuard<'a> {
    controller: &'a CircuitController,
    permit: Option<Permit>,
}

impl<'a> PermitGuard<'a> {
    const fn new(controller: &'a CircuitController, permit: Permit) -> Self {
        Self {
            controller,
            permit: Some(permit),
        }
    }

    fn finish(mut self, kind: OutcomeKind, was_error: bool, context: &ResilienceContext) {
        if let Some(permit) = self.permit.take() {
            self.controller.record(permit, kind, was_error, context);
        }
    }

    fn cancel(mut self) {
        if let Some(permit) = self.permit.take() {
            self.controller.cancel(permit);
        }
    }
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.controller.release(permit);
        }
    }
}
