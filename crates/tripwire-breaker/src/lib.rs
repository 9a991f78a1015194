// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # tripwire-breaker
//!
//! Circuit breaker resilience strategy.
//!
//! A [`CircuitBreaker`] guards calls to a downstream dependency:
//!
//! - **Closed**: calls pass; outcomes feed a sliding [`HealthWindow`]. Once
//!   enough outcomes are recorded and the handled-failure ratio exceeds the
//!   threshold, the circuit opens.
//! - **Open**: calls are rejected without running until the break deadline.
//! - **HalfOpen**: the first caller past the deadline runs as a trial;
//!   success closes the circuit, a handled failure reopens it with a fresh
//!   break duration.
//! - **Isolated**: forced open through [`ManualControl`] until closed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tripwire_breaker::{CircuitBreakerOptions, StateProvider};
//! use tripwire_core::ResilienceContext;
//!
//! let provider = StateProvider::new();
//! let breaker = CircuitBreakerOptions::<String, std::io::Error>::new()
//!     .with_failure_ratio(0.5)
//!     .with_minimum_throughput(8)
//!     .with_state_provider(provider.clone())
//!     .build()?;
//!
//! let body = breaker
//!     .execute(&ResilienceContext::new(), |ctx| async move { fetch(ctx).await })
//!     .await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod break_duration;
mod controller;
pub mod error;
pub mod hooks;
pub mod manual;
pub mod options;
pub mod predicate;
pub mod provider;
pub mod strategy;
pub mod window;

pub use break_duration::{BreakDurationArgs, BreakDurationGenerator, BreakDurationPolicy};
pub use controller::LastHandledOutcome;
pub use error::{ExecutionError, Rejection};
pub use hooks::{Hook, Hooks, OnClosedArgs, OnHalfOpenedArgs, OnOpenedArgs};
pub use manual::ManualControl;
pub use options::CircuitBreakerOptions;
pub use predicate::{PredicateBuilder, ShouldHandle, handle_all_errors};
pub use provider::StateProvider;
pub use strategy::{CircuitBreaker, Outcome};
pub use window::{HealthSnapshot, HealthWindow};
