//! Falsification Tests: Category C - Execution Gate (F021-F030)
//!
//! Claims about what callers get back from `execute`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tripwire_breaker::{
    CircuitBreaker, CircuitBreakerOptions, ExecutionError, Outcome, PredicateBuilder, Rejection,
};
use tripwire_core::{CircuitState, ManualClock, PropertyKey, ResilienceContext};
use tripwire_test::{BreakerTestHarness, SimError, Step};

const SLEEP_DURATION: PropertyKey<Duration> = PropertyKey::new("sleep_duration");

fn harness() -> BreakerTestHarness {
    BreakerTestHarness::builder()
        .with_failure_ratio(0.5)
        .with_minimum_throughput(4)
        .with_break_duration(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn plain_breaker(clock: &ManualClock) -> CircuitBreaker<u32, SimError> {
    CircuitBreakerOptions::new()
        .with_minimum_throughput(2)
        .with_failure_ratio(0.5)
        .with_break_duration(Duration::from_secs(5))
        .with_time_provider(Arc::new(clock.clone()))
        .build()
        .unwrap()
}

// =============================================================================
// F021-F023: Outcome propagation
// =============================================================================

/// F021: Callers can tell a rejection from an operation failure
#[tokio::test]
async fn f021_rejection_distinguishable() {
    let harness = harness();
    let results = harness.play(&[Step::Fail; 5]).await;

    for result in &results[..4] {
        let err = result.as_ref().unwrap_err();
        assert!(
            !err.is_rejected(),
            "F021 FALSIFIED: operation failure reported as rejection"
        );
    }
    assert!(
        results[4].as_ref().unwrap_err().is_rejected(),
        "F021 FALSIFIED: rejection reported as operation failure"
    );
}

/// F022: A handled failure reaches the caller unchanged and is recorded
#[tokio::test]
async fn f022_handled_failure_propagates() {
    let harness = harness();
    let err = harness.fail().await.unwrap_err();

    assert!(matches!(err, ExecutionError::Operation(SimError::Transient)));
    assert_eq!(
        harness.health().failures,
        1,
        "F022 FALSIFIED: handled failure not recorded"
    );
}

/// F023: An unhandled failure reaches the caller and leaves no trace in the window
#[tokio::test]
async fn f023_unhandled_failure_propagates_untouched() {
    let harness = harness();
    let err = harness.fail_unhandled().await.unwrap_err();

    assert_eq!(err.into_operation_error(), Some(SimError::Fatal));
    assert_eq!(harness.health().total, 0);
    assert_eq!(
        harness.breaker().metrics().unhandled_failures_total(),
        1,
        "F023 FALSIFIED: unhandled failure not counted in metrics"
    );
}

// =============================================================================
// F024-F025: Cancellation
// =============================================================================

/// F024: Cancelling mid-flight returns Cancelled and records no outcome
///
/// # Falsification Attempt
/// The operation cancels its own context and never completes.
#[tokio::test]
async fn f024_mid_flight_cancellation() {
    let clock = ManualClock::new();
    let breaker = plain_breaker(&clock);

    let result = breaker
        .execute(&ResilienceContext::new(), |context| async move {
            context.cancellation().cancel();
            std::future::pending::<Result<u32, SimError>>().await
        })
        .await;

    assert!(
        result.unwrap_err().is_cancelled(),
        "F024 FALSIFIED: cancelled execution not reported"
    );
    assert_eq!(breaker.health().total, 0, "F024 FALSIFIED: outcome recorded");
    assert_eq!(breaker.metrics().cancellations_total(), 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

/// F025: A context cancelled before the call never runs the operation
#[tokio::test]
async fn f025_pre_cancelled_never_runs() {
    let clock = ManualClock::new();
    let breaker = plain_breaker(&clock);
    let token = CancellationToken::new();
    token.cancel();
    let context = ResilienceContext::new().with_cancellation(token);
    let invoked = AtomicU32::new(0);

    let result = breaker
        .execute(&context, |_| async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        })
        .await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(
        invoked.load(Ordering::SeqCst),
        0,
        "F025 FALSIFIED: operation ran for a cancelled context"
    );
    assert_eq!(breaker.metrics().executions_total(), 0);
}

// =============================================================================
// F026-F030: Gate surface
// =============================================================================

/// F026: `execute_outcome` reports the rejection as a value
#[tokio::test]
async fn f026_execute_outcome_rejected() {
    let clock = ManualClock::new();
    let breaker = plain_breaker(&clock);
    for _ in 0..2 {
        let _ = breaker
            .execute(&ResilienceContext::new(), |_| async { Err(SimError::Transient) })
            .await;
    }
    clock.advance(Duration::from_secs(2));

    let outcome = breaker
        .execute_outcome(&ResilienceContext::new(), |_| async { Ok(1) })
        .await;
    assert_eq!(
        outcome,
        Outcome::Rejected(Rejection::BrokenCircuit {
            retry_after: Duration::from_secs(3)
        }),
        "F026 FALSIFIED: rejection not reported as a value"
    );
}

/// F027: Hooks can hand the break duration to the caller through the context
///
/// # Falsification Attempt
/// `on_opened` stores the break duration as a retry delay, `on_closed`
/// removes it. The caller reuses one context throughout.
#[tokio::test]
async fn f027_circuit_aware_retry_through_context() {
    let clock = ManualClock::new();
    let breaker: CircuitBreaker<u32, SimError> = CircuitBreakerOptions::new()
        .with_minimum_throughput(2)
        .with_failure_ratio(0.5)
        .with_break_duration(Duration::from_secs(5))
        .with_time_provider(Arc::new(clock.clone()))
        .on_opened(|args| args.context.set(SLEEP_DURATION, args.break_duration))
        .on_closed(|args| {
            args.context.remove(SLEEP_DURATION);
        })
        .build()
        .unwrap();

    let context = ResilienceContext::new();
    for _ in 0..2 {
        let _ = breaker
            .execute(&context, |_| async { Err(SimError::Transient) })
            .await;
    }
    assert_eq!(
        context.get(SLEEP_DURATION),
        Some(Duration::from_secs(5)),
        "F027 FALSIFIED: break duration not visible to the caller"
    );

    let delay = context.get(SLEEP_DURATION).unwrap();
    clock.advance(delay);
    assert_eq!(breaker.execute(&context, |_| async { Ok(7) }).await.unwrap(), 7);
    assert_eq!(
        context.get(SLEEP_DURATION),
        None,
        "F027 FALSIFIED: retry delay survived the close"
    );
}

/// F028: The operation receives the caller's context
#[tokio::test]
async fn f028_operation_sees_caller_context() {
    const TENANT: PropertyKey<u32> = PropertyKey::new("tenant");
    let clock = ManualClock::new();
    let breaker = plain_breaker(&clock);
    let context = ResilienceContext::new().with_operation_key("orders.get");
    context.set(TENANT, 42);

    let seen = breaker
        .execute(&context, |inner| async move {
            assert_eq!(inner.operation_key(), Some("orders.get"));
            Ok(inner.get(TENANT).unwrap_or_default())
        })
        .await
        .unwrap();
    assert_eq!(seen, 42, "F028 FALSIFIED: context not passed through");
}

/// F029: Clones of a breaker share one circuit
#[tokio::test]
async fn f029_clones_share_circuit() {
    let clock = ManualClock::new();
    let breaker = plain_breaker(&clock);
    let clone = breaker.clone();

    for _ in 0..2 {
        let _ = clone
            .execute(&ResilienceContext::new(), |_| async { Err(SimError::Transient) })
            .await;
    }
    assert_eq!(breaker.id(), clone.id());
    assert_eq!(
        breaker.state(),
        CircuitState::Open,
        "F029 FALSIFIED: clone tripped a different circuit"
    );
}

/// F030: Handled `Ok` results count as failures but still reach the caller
#[tokio::test]
async fn f030_handled_results_count_as_failures() {
    let clock = ManualClock::new();
    let breaker: CircuitBreaker<u32, SimError> = CircuitBreakerOptions::new()
        .with_minimum_throughput(2)
        .with_failure_ratio(0.5)
        .with_time_provider(Arc::new(clock.clone()))
        .with_should_handle(
            PredicateBuilder::<u32, SimError>::new()
                .handle_result(|status| *status >= 500)
                .build(),
        )
        .build()
        .unwrap();

    let first = breaker
        .execute(&ResilienceContext::new(), |_| async { Ok(503) })
        .await;
    assert_eq!(first.unwrap(), 503);
    let second = breaker
        .execute(&ResilienceContext::new(), |_| async { Ok(500) })
        .await;
    assert_eq!(second.unwrap(), 500);

    assert_eq!(
        breaker.state(),
        CircuitState::Open,
        "F030 FALSIFIED: handled results did not open the circuit"
    );
}
