//! Falsification Tests: Category D - Manual Control (F031-F040, F047-F048)
//!
//! Claims about `isolate`, `close` and shared control handles.

use std::sync::Arc;
use std::time::Duration;

use tripwire_breaker::{CircuitBreaker, CircuitBreakerOptions, ExecutionError, ManualControl};
use tripwire_core::{CircuitState, ManualClock, ResilienceContext};
use tripwire_test::{BreakerTestHarness, SimError, Step, TransitionEvent};

const ISOLATED: TransitionEvent = TransitionEvent::Opened {
    break_duration: Duration::MAX,
    is_manual: true,
};

fn harness() -> BreakerTestHarness {
    BreakerTestHarness::builder()
        .with_failure_ratio(0.5)
        .with_minimum_throughput(4)
        .with_break_duration(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn attached(control: &ManualControl) -> CircuitBreaker<(), SimError> {
    CircuitBreakerOptions::new()
        .with_manual_control(control.clone())
        .with_time_provider(Arc::new(ManualClock::new()))
        .build()
        .unwrap()
}

// =============================================================================
// F031-F034: Isolate
// =============================================================================

/// F031: Isolation blocks every call no matter how much time passes
#[tokio::test]
async fn f031_isolation_blocks_indefinitely() {
    let harness = harness();
    harness.manual().isolate();

    for _ in 0..3 {
        let err = harness.succeed().await.unwrap_err();
        assert!(
            matches!(err, ExecutionError::Isolated),
            "F031 FALSIFIED: isolated circuit admitted or misreported a call"
        );
        assert_eq!(err.retry_after(), None);
        harness.advance(Duration::from_secs(3_600));
    }
    assert_eq!(harness.invocations(), 0);
    assert_eq!(harness.state(), CircuitState::Isolated);
}

/// F032: Isolation overrides an Open circuit and its pending deadline
#[tokio::test]
async fn f032_isolate_from_open() {
    let harness = harness();
    harness.play(&[Step::Fail; 4]).await;
    harness.manual().isolate();
    harness.advance(Duration::from_secs(5));

    assert!(
        harness.succeed().await.unwrap_err().is_rejected(),
        "F032 FALSIFIED: Open deadline survived isolation"
    );
    assert_eq!(harness.state(), CircuitState::Isolated);
}

/// F033: Isolation overrides HalfOpen
#[tokio::test]
async fn f033_isolate_from_half_open() {
    let harness = harness();
    harness
        .play(&[
            Step::Fail,
            Step::Fail,
            Step::Fail,
            Step::Fail,
            Step::Advance(Duration::from_secs(5)),
            Step::FailUnhandled,
        ])
        .await;
    assert_eq!(harness.state(), CircuitState::HalfOpen);

    harness.manual().isolate();
    assert_eq!(
        harness.state(),
        CircuitState::Isolated,
        "F033 FALSIFIED: HalfOpen circuit not isolated"
    );
    assert_eq!(harness.events().last(), Some(&ISOLATED));
}

/// F034: Isolation reports an unbounded break and is idempotent
#[tokio::test]
async fn f034_isolate_idempotent() {
    let harness = harness();
    harness.manual().isolate();
    harness.manual().isolate();

    assert_eq!(
        harness.events(),
        vec![ISOLATED],
        "F034 FALSIFIED: repeated isolate fired more than one transition"
    );
    assert_eq!(harness.breaker().metrics().isolations_total(), 1);
}

// =============================================================================
// F035-F037: Close
// =============================================================================

/// F035: Manual close from Isolated resumes normal operation
#[tokio::test]
async fn f035_close_from_isolated() {
    let harness = harness();
    harness.manual().isolate();
    harness.manual().close();

    assert_eq!(harness.state(), CircuitState::Closed);
    assert_eq!(
        harness.events(),
        vec![ISOLATED, TransitionEvent::Closed { is_manual: true }],
        "F035 FALSIFIED: manual close not reported as manual"
    );
    assert!(harness.succeed().await.is_ok());
}

/// F036: Manual close from Open clears the statistics and the backoff
///
/// # Falsification Attempt
/// After closing, 3 failures (below minimum throughput 4) must not reopen.
#[tokio::test]
async fn f036_close_from_open_resets() {
    let harness = harness();
    harness.play(&[Step::Fail; 4]).await;
    harness.manual().close();
    assert_eq!(harness.state(), CircuitState::Closed);
    assert!(!harness.manual().is_isolated());

    harness.play(&[Step::Fail; 3]).await;
    assert_eq!(
        harness.state(),
        CircuitState::Closed,
        "F036 FALSIFIED: statistics from before the close were kept"
    );
    assert_eq!(harness.health().failures, 3);
}

/// F037: Close on a Closed circuit is a no-op
#[tokio::test]
async fn f037_close_when_closed_noop() {
    let harness = harness();
    harness.play(&[Step::Fail; 2]).await;
    harness.manual().close();

    assert!(
        harness.events().is_empty(),
        "F037 FALSIFIED: close on Closed fired a transition"
    );
    assert_eq!(
        harness.health().failures,
        2,
        "F037 FALSIFIED: close on Closed reset the statistics"
    );
}

// =============================================================================
// F038-F040: Shared handles
// =============================================================================

/// F038: A breaker built on an isolated control starts Isolated, silently
#[tokio::test]
async fn f038_new_isolated_starts_isolated() {
    let harness = BreakerTestHarness::builder().isolated().build().unwrap();

    assert_eq!(harness.state(), CircuitState::Isolated);
    assert!(
        harness.events().is_empty(),
        "F038 FALSIFIED: initial isolation fired a hook"
    );
    assert!(matches!(
        harness.succeed().await.unwrap_err(),
        ExecutionError::Isolated
    ));

    harness.manual().close();
    assert!(harness.succeed().await.is_ok());
}

/// F039: One control drives every attached breaker, including later ones
#[test]
fn f039_control_fans_out() {
    let control = ManualControl::new();
    let first = attached(&control);
    let second = attached(&control);
    assert_eq!(control.circuit_count(), 2);

    control.isolate();
    let late = attached(&control);
    for breaker in [&first, &second, &late] {
        assert_eq!(
            breaker.state(),
            CircuitState::Isolated,
            "F039 FALSIFIED: attached breaker not isolated"
        );
    }

    drop(second);
    control.close();
    assert_eq!(control.circuit_count(), 2);
    assert_eq!(first.state(), CircuitState::Closed);
    assert_eq!(late.state(), CircuitState::Closed);
}

/// F040: An execution admitted before isolation cannot move the circuit
///
/// # Falsification Attempt
/// The operation isolates the circuit, then fails with a handled error.
#[tokio::test]
async fn f040_in_flight_outcome_after_isolate_ignored() {
    let harness = harness();
    let manual = harness.manual().clone();

    let result = harness
        .breaker()
        .execute(&ResilienceContext::new(), |_| async move {
            manual.isolate();
            Err(SimError::Transient)
        })
        .await;

    assert!(matches!(
        result,
        Err(ExecutionError::Operation(SimError::Transient))
    ));
    assert_eq!(
        harness.state(),
        CircuitState::Isolated,
        "F040 FALSIFIED: stale outcome moved an isolated circuit"
    );
    assert_eq!(harness.health().total, 0);
}

/// F047: A close issued from a hook during isolate leaves every circuit Closed
///
/// # Falsification Attempt
/// The first breaker's `on_opened` hook closes the shared control while
/// `isolate` is still walking the circuit list.
#[test]
fn f047_close_from_hook_during_isolate() {
    let control = ManualControl::new();
    let nested = control.clone();
    let first: CircuitBreaker<(), SimError> = CircuitBreakerOptions::new()
        .with_manual_control(control.clone())
        .on_opened(move |args| {
            if args.is_manual {
                nested.close();
            }
        })
        .build()
        .unwrap();
    let second = attached(&control);

    control.isolate();

    assert!(
        !control.is_isolated(),
        "F047 FALSIFIED: control reports isolated after the nested close"
    );
    for breaker in [&first, &second] {
        assert_eq!(
            breaker.state(),
            CircuitState::Closed,
            "F047 FALSIFIED: circuit disagrees with its control"
        );
    }
    assert_eq!(attached(&control).state(), CircuitState::Closed);
}

/// F048: Concurrent isolate and close from many threads end consistent
#[test]
fn f048_concurrent_commands_end_consistent() {
    let control = ManualControl::new();
    let breakers: Vec<_> = (0..4).map(|_| attached(&control)).collect();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let control = control.clone();
            scope.spawn(move || {
                for _ in 0..200 {
                    if worker % 2 == 0 {
                        control.isolate();
                    } else {
                        control.close();
                    }
                }
            });
        }
    });

    let expected = if control.is_isolated() {
        CircuitState::Isolated
    } else {
        CircuitState::Closed
    };
    for breaker in &breakers {
        assert_eq!(
            breaker.state(),
            expected,
            "F048 FALSIFIED: circuit disagrees with its control"
        );
    }
}
