//! Break duration policy.
//!
//! The break duration is resolved once per transition to Open, either from a
//! fixed value or from a generator that sees how many times in a row the
//! circuit has broken.

use std::sync::Arc;
use std::time::Duration;

/// Inputs available to a break duration generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakDurationArgs {
    /// Consecutive breaks since the circuit was last Closed, including this one.
    pub consecutive_breaks: u32,
    /// Handled failures in the window when the circuit broke.
    pub failure_count: usize,
    /// Raw failure ratio of the window when the circuit broke.
    pub failure_ratio: f64,
    /// True when breaking because a half-open trial failed.
    pub is_half_open: bool,
}

/// Generator computing a break duration.
pub type BreakDurationGenerator = Arc<dyn Fn(BreakDurationArgs) -> Duration + Send + Sync>;

/// How long the circuit stays Open.
#[derive(Clone)]
pub enum BreakDurationPolicy {
    /// Always the same duration.
    Fixed(Duration),
    /// Computed per break.
    Generated(BreakDurationGenerator),
}

impl std::fmt::Debug for BreakDurationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(duration) => f.debug_tuple("Fixed").field(duration).finish(),
            Self::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

impl BreakDurationPolicy {
    /// Exponential backoff: `base * 2^(consecutive_breaks - 1)`, capped at `ceiling`.
    #[must_use]
    pub fn exponential(base: Duration, ceiling: Duration) -> Self {
        Self::Generated(Arc::new(move |args: BreakDurationArgs| {
            exponential_break(args.consecutive_breaks, base, ceiling)
        }))
    }

    /// Resolves the duration for one break.
    #[must_use]
    pub fn resolve(&self, args: BreakDurationArgs) -> Duration {
        match self {
            Self::Fixed(duration) => *duration,
            Self::Generated(generator) => generator(args),
        }
    }
}

impl Default for BreakDurationPolicy {
    fn default() -> Self {
        Self::Fixed(Duration::from_secs(5))
    }
}

/// Calculates an exponential break duration.
#[must_use]
pub fn exponential_break(consecutive_breaks: u32, base: Duration, ceiling: Duration) -> Duration {
    if consecutive_breaks == 0 {
        return base.min(ceiling);
    }
    let factor = 2u32.saturating_pow(consecutive_breaks - 1);
    base.saturating_mul(factor).min(ceiling)
}
