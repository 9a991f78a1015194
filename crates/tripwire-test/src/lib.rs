// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # tripwire-test
//!
//! Testing infrastructure for tripwire circuit breakers.
//!
//! This crate provides:
//! - **Test harness**: a breaker over a [`tripwire_core::ManualClock`] with
//!   scripted outcomes and recorded transitions
//! - **Fault injection**: seeded failure and latency injection
//! - **Simulated downstream**: a [`Downstream`] that can be flipped unhealthy
//! - **Load testing**: concurrent callers through one breaker
//! - **Falsification tests**: refutation attempts against the breaker's claims
//!
//! ## Example
//!
//! ```rust,ignore
//! use tripwire_test::{BreakerTestHarness, Step};
//!
//! let harness = BreakerTestHarness::builder()
//!     .with_failure_ratio(0.5)
//!     .with_minimum_throughput(8)
//!     .build()?;
//!
//! harness.play(&[Step::Fail; 8]).await;
//! assert_eq!(harness.state(), CircuitState::Open);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chaos;
pub mod downstream;
pub mod error;
pub mod harness;
pub mod load;

pub use chaos::{ChaosConfig, FaultInjector};
pub use downstream::{Downstream, FlakyDownstream, SimError};
pub use error::{Result, TestError};
pub use harness::{BreakerTestHarness, Step, TransitionEvent, init_test_tracing};
pub use load::{LoadTestConfig, LoadTestReport, LoadTester};
