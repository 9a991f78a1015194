// Examples are allowed to use expect/unwrap for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Circuit-Aware Retry Example
//!
//! A retry loop that sleeps for exactly as long as the circuit stays open.
//! The `on_opened` hook stores the break duration in the caller's context;
//! `on_closed` removes it again.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=tripwire=debug cargo run --example circuit_aware_retry
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tripwire::prelude::*;

const SLEEP_DURATION: PropertyKey<Duration> = PropertyKey::new("sleep_duration");
const FALLBACK_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
#[error("inventory service unavailable")]
struct Unavailable;

/// Fails its first `outage` calls, then recovers.
struct Inventory {
    calls: AtomicU32,
    outage: u32,
}

impl Inventory {
    async fn stock(&self, sku: &str) -> Result<u32, Unavailable> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(5)).await;
        if call <= self.outage {
            println!("[DOWNSTREAM] call {call} for {sku}: unavailable");
            Err(Unavailable)
        } else {
            println!("[DOWNSTREAM] call {call} for {sku}: ok");
            Ok(17)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let breaker: CircuitBreaker<u32, Unavailable> = CircuitBreakerOptions::new()
        .with_name("inventory")
        .with_failure_ratio(0.5)
        .with_minimum_throughput(4)
        .with_sampling_duration(Duration::from_secs(5))
        .with_exponential_break(Duration::from_millis(200), Duration::from_secs(2))
        .on_opened(|args| args.context.set(SLEEP_DURATION, args.break_duration))
        .on_closed(|args| {
            args.context.remove(SLEEP_DURATION);
        })
        .build()?;

    let inventory = Arc::new(Inventory {
        calls: AtomicU32::new(0),
        outage: 6,
    });
    let context = ResilienceContext::new().with_operation_key("inventory.stock");

    for attempt in 1..=20 {
        let downstream = Arc::clone(&inventory);
        let result = breaker
            .execute(&context, |_| async move { downstream.stock("sku-42").await })
            .await;

        match result {
            Ok(stock) => {
                println!("[CALLER] attempt {attempt}: {stock} in stock");
                break;
            }
            Err(err) => {
                let delay = err
                    .retry_after()
                    .or_else(|| context.get(SLEEP_DURATION))
                    .unwrap_or(FALLBACK_DELAY);
                println!(
                    "[CALLER] attempt {attempt}: {err} (state {}), retrying in {delay:?}",
                    breaker.state()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    let snapshot = breaker.metrics().snapshot();
    println!();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
