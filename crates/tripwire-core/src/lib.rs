// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # tripwire-core
//!
//! Shared vocabulary for the tripwire circuit-breaker workspace.
//!
//! This crate provides the types every other crate speaks in:
//!
//! - [`CircuitState`] and [`OutcomeKind`] for the breaker state machine
//! - [`CircuitBreakerConfig`] for validated, TOML-loadable configuration
//! - [`TimeProvider`] with [`SystemClock`] and the test-friendly [`ManualClock`]
//! - [`ResilienceContext`] for cancellation and per-call properties
//! - [`CircuitMetrics`] for execution counters
//!
//! ## Example
//!
//! ```rust,ignore
//! use tripwire_core::{CircuitBreakerConfig, WindowKind};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig {
//!     failure_ratio: 0.5,
//!     sampling_duration: Duration::from_secs(10),
//!     minimum_throughput: 8,
//!     break_duration: Duration::from_secs(30),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod types;

pub use clock::{ManualClock, SystemClock, TimeProvider};
pub use config::{CircuitBreakerConfig, WindowKind};
pub use context::{PropertyKey, ResilienceContext};
pub use error::{Result, TripwireError};
pub use metrics::{CircuitMetrics, MetricsSnapshot};
pub use types::{CircuitId, CircuitState, OutcomeKind};
