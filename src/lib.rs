//! Tripwire: Circuit-Breaker Resilience Strategy
//!
//! Guards calls to an unreliable dependency. Failures are accounted in a
//! sliding window; once the failure ratio breaches the threshold the circuit
//! opens and rejects calls until a break duration has passed, then admits a
//! trial to decide whether to close again.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tripwire::prelude::*;
//!
//! # async fn run() -> tripwire::core::Result<()> {
//! let breaker: CircuitBreaker<u32, std::io::Error> = CircuitBreakerOptions::new()
//!     .with_name("inventory")
//!     .with_failure_ratio(0.5)
//!     .with_minimum_throughput(8)
//!     .with_break_duration(Duration::from_secs(30))
//!     .build()?;
//!
//! match breaker
//!     .execute(&ResilienceContext::new(), |_| async { Ok(42) })
//!     .await
//! {
//!     Ok(value) => println!("got {value}"),
//!     Err(err) if err.is_rejected() => println!("shed: {err}"),
//!     Err(err) => println!("failed: {err}"),
//! }
//! # Ok(())
//! # }
//! ```

pub use tripwire_breaker as breaker;
pub use tripwire_core as core;

/// Prelude module for common imports.
pub mod prelude {
    pub use tripwire_breaker::{
        BreakDurationArgs, CircuitBreaker, CircuitBreakerOptions, ExecutionError, ManualControl,
        OnClosedArgs, OnHalfOpenedArgs, OnOpenedArgs, Outcome, PredicateBuilder, Rejection,
        StateProvider,
    };
    pub use tripwire_core::{
        CircuitBreakerConfig, CircuitState, PropertyKey, ResilienceContext, TimeProvider,
        WindowKind,
    };
}
