//! Read-only circuit observer for health checks.

use std::sync::{Arc, OnceLock, Weak};

use tripwire_core::{CircuitId, CircuitState, MetricsSnapshot, Result, TripwireError};

use crate::controller::{CircuitController, LastHandledOutcome};

/// Read-only view of one circuit.
///
/// Create it before building the breaker, pass it to the options, then
/// query it from anywhere. Until attached it reports [`CircuitState::Closed`].
#[derive(Debug, Clone, Default)]
pub struct StateProvider {
    slot: Arc<OnceLock<Weak<CircuitController>>>,
}

impl StateProvider {
    /// Creates an unattached provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last committed circuit state without locking.
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.controller()
            .map_or(CircuitState::Closed, |controller| controller.current_state())
    }

    /// Returns the most recent handled failure, if any.
    #[must_use]
    pub fn last_handled_outcome(&self) -> Option<LastHandledOutcome> {
        self.controller()
            .and_then(|controller| controller.last_handled_outcome())
    }

    /// Returns the identifier of the observed circuit.
    #[must_use]
    pub fn circuit_id(&self) -> Option<CircuitId> {
        self.controller().map(|controller| controller.id())
    }

    /// Returns a snapshot of the observed circuit's counters.
    #[must_use]
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.controller()
            .map(|controller| controller.metrics().snapshot())
    }

    /// Returns true once the provider is attached to a live circuit.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.controller().is_some()
    }

    pub(crate) fn attach(&self, controller: &Arc<CircuitController>) -> Result<()> {
        self.slot.set(Arc::downgrade(controller)).map_err(|_| {
            TripwireError::attachment("state provider is already attached to a circuit breaker")
        })
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }

    fn controller(&self) -> Option<Arc<CircuitController>> {
        self.slot.get().and_then(Weak::upgrade)
    }
}
