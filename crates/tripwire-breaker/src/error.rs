//! Execution errors.
//!
//! A rejected call never reached the operation; callers can tell it apart
//! from a genuine downstream failure through [`ExecutionError::is_rejected`].

use std::time::Duration;

/// Why the gate refused to run an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The circuit is Open, or HalfOpen with every trial slot taken.
    #[error("circuit is open, retry after {retry_after:?}")]
    BrokenCircuit {
        /// Time until the circuit may admit a trial.
        retry_after: Duration,
    },

    /// The circuit was isolated manually.
    #[error("circuit is isolated")]
    Isolated,
}

impl Rejection {
    /// Returns the suggested retry delay, if the circuit will recover on its own.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::BrokenCircuit { retry_after } => Some(*retry_after),
            Self::Isolated => None,
        }
    }
}

/// Error returned by [`crate::CircuitBreaker::execute`].
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError<E> {
    /// Rejected while Open; the operation never ran.
    #[error("circuit is open, retry after {retry_after:?}")]
    BrokenCircuit {
        /// Time until the circuit may admit a trial.
        retry_after: Duration,
    },

    /// Rejected while Isolated; the operation never ran.
    #[error("circuit is isolated")]
    Isolated,

    /// The operation's own error, handled or not.
    #[error(transparent)]
    Operation(E),

    /// The caller cancelled the execution.
    #[error("execution cancelled")]
    Cancelled,
}

impl<E> ExecutionError<E> {
    /// Returns true if the circuit rejected the call without running it.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::BrokenCircuit { .. } | Self::Isolated)
    }

    /// Returns true if the caller cancelled the execution.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the suggested retry delay for a broken circuit.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::BrokenCircuit { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Returns the operation's error, if the operation ran and failed.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(error) => Some(error),
            _ => None,
        }
    }
}

impl<E> From<Rejection> for ExecutionError<E> {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::BrokenCircuit { retry_after } => Self::BrokenCircuit { retry_after },
            Rejection::Isolated => Self::Isolated,
        }
    }
}
