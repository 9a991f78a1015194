//! Popperian Falsification Tests for tripwire
//!
//! Categories:
//! - A: Failure statistics (F001-F010, F046)
//! - B: State transitions (F011-F020, F049)
//! - C: Execution gate (F021-F030)
//! - D: Manual control and observation (F031-F040, F047-F048)
//! - E: Concurrency (F041-F045)

// Allow test-specific patterns that are denied in production code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::significant_drop_tightening)]

mod concurrency;
mod gate;
mod manual_control;
