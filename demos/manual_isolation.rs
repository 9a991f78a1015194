//! Manual Isolation Example
//!
//! One [`ManualControl`] handle isolates two breakers for a maintenance
//! window and closes them again. A [`StateProvider`] reports each circuit's
//! state from outside the call path.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example manual_isolation
//! ```

use std::time::Duration;

use tripwire::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("backend error: {0}")]
struct BackendError(&'static str);

async fn call(
    breaker: &CircuitBreaker<&'static str, BackendError>,
    label: &str,
    reply: Result<&'static str, BackendError>,
) {
    let context = ResilienceContext::new().with_operation_key(label.to_owned());
    match breaker.execute(&context, |_| async move { reply }).await {
        Ok(reply) => println!("[CALL] {label}: {reply}"),
        Err(ExecutionError::Isolated) => println!("[CALL] {label}: isolated, not sent"),
        Err(err) => println!("[CALL] {label}: {err}"),
    }
}

fn build(
    name: &'static str,
    control: &ManualControl,
    provider: &StateProvider,
) -> tripwire::core::Result<CircuitBreaker<&'static str, BackendError>> {
    CircuitBreakerOptions::new()
        .with_name(name)
        .with_break_duration(Duration::from_secs(10))
        .with_manual_control(control.clone())
        .with_state_provider(provider.clone())
        .on_opened(move |args| {
            if args.is_manual {
                println!("[HOOK] {name}: isolated");
            } else {
                println!("[HOOK] {name}: opened for {:?}", args.break_duration);
            }
        })
        .on_closed(move |args| println!("[HOOK] {name}: closed (manual: {})", args.is_manual))
        .build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let control = ManualControl::new();
    let (primary_state, replica_state) = (StateProvider::new(), StateProvider::new());
    let primary = build("primary", &control, &primary_state)?;
    let replica = build("replica", &control, &replica_state)?;
    println!("[SETUP] {} circuits attached", control.circuit_count());

    call(&primary, "primary", Ok("pong")).await;
    call(&replica, "replica", Err(BackendError("connection reset"))).await;

    println!();
    println!("[MAINTENANCE] isolating");
    control.isolate();
    println!(
        "[STATE] primary={} replica={}",
        primary_state.circuit_state(),
        replica_state.circuit_state()
    );
    call(&primary, "primary", Ok("pong")).await;
    call(&replica, "replica", Ok("pong")).await;

    println!();
    println!("[MAINTENANCE] done, closing");
    control.close();
    println!(
        "[STATE] primary={} replica={}",
        primary_state.circuit_state(),
        replica_state.circuit_state()
    );
    call(&primary, "primary", Ok("pong")).await;
    call(&replica, "replica", Ok("pong")).await;

    if let Some(metrics) = primary_state.metrics() {
        println!();
        println!(
            "[METRICS] primary: executions={} rejections={} isolations={}",
            metrics.executions_total, metrics.rejections_total, metrics.isolations_total
        );
    }
    Ok(())
}
