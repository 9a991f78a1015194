//! Core types for circuit-breaker state tracking.
//!
//! Explicit state machine, no implicit transitions: the breaker crate owns
//! the only mutation path, everything here is plain data.

use serde::{Deserialize, Serialize};

/// Unique identifier for a circuit breaker instance.
///
/// Used to correlate log lines and manual-control registrations when
/// several breakers share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CircuitId(uuid::Uuid);

impl CircuitId {
    /// Creates a new random circuit ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a circuit ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for CircuitId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CircuitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Circuit state.
///
/// ```text
///            ratio breach              deadline elapsed
/// Closed ───────────────────▶ Open ─────────────────────▶ HalfOpen
///   ▲                           ▲                            │
///   │                           └──────── trial failed ──────┤
///   └──────────────────────────── trial succeeded ───────────┘
///
/// any ── isolate() ──▶ Isolated ── close() ──▶ Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation; executions pass through and are recorded.
    #[default]
    Closed,
    /// Circuit is broken; executions are rejected until the break elapses.
    Open,
    /// Recovery probe; a bounded number of trial executions are admitted.
    HalfOpen,
    /// Manually held open; executions are rejected until closed manually.
    Isolated,
}

impl CircuitState {
    /// Returns the compact encoding used by the lock-free state cell.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
            Self::Isolated => 3,
        }
    }

    /// Decodes a state from its compact encoding.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Closed),
            1 => Some(Self::Open),
            2 => Some(Self::HalfOpen),
            3 => Some(Self::Isolated),
            _ => None,
        }
    }

    /// Returns true if executions are (at least partly) blocked in this state.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Open | Self::Isolated)
    }

    /// Returns the state name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
            Self::Isolated => "isolated",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification of a completed execution.
///
/// Cancellation is deliberately absent: a cancelled execution is never
/// classified and never recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    /// The operation completed and the failure predicate did not match.
    Success,
    /// The failure predicate matched; counts toward breaking.
    HandledFailure,
    /// The operation failed but the predicate did not match; not recorded.
    UnhandledFailure,
}

impl OutcomeKind {
    /// Returns true if this outcome is stored in the statistics window.
    #[must_use]
    pub const fn is_recorded(self) -> bool {
        matches!(self, Self::Success | Self::HandledFailure)
    }
}
