//! Falsification Tests: Category E - Concurrency (F041-F045)
//!
//! Claims that must hold with many tasks hitting one circuit at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tripwire_breaker::{CircuitBreaker, CircuitBreakerOptions, ManualControl, StateProvider};
use tripwire_core::{CircuitState, ManualClock, ResilienceContext};
use tripwire_test::SimError;

const WAIT_LIMIT: Duration = Duration::from_secs(10);

fn breaker(clock: &ManualClock, half_open_max_trials: u32) -> CircuitBreaker<u32, SimError> {
    CircuitBreakerOptions::new()
        .with_name("concurrency")
        .with_minimum_throughput(2)
        .with_failure_ratio(0.5)
        .with_break_duration(Duration::from_secs(5))
        .with_half_open_max_trials(half_open_max_trials)
        .with_time_provider(Arc::new(clock.clone()))
        .build()
        .unwrap()
}

async fn trip_and_expire(breaker: &CircuitBreaker<u32, SimError>, clock: &ManualClock) {
    for _ in 0..2 {
        let _ = breaker
            .execute(&ResilienceContext::new(), |_| async { Err(SimError::Transient) })
            .await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    clock.advance(Duration::from_secs(5));
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
}

/// Spawns `tasks` executions that block on `gate` once admitted.
fn spawn_gated(
    breaker: &CircuitBreaker<u32, SimError>,
    gate: &CancellationToken,
    invocations: &Arc<AtomicU32>,
    tasks: usize,
) -> Vec<tokio::task::JoinHandle<bool>> {
    (0..tasks)
        .map(|_| {
            let breaker = breaker.clone();
            let gate = gate.clone();
            let invocations = Arc::clone(invocations);
            tokio::spawn(async move {
                breaker
                    .execute(&ResilienceContext::new(), |_| async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        gate.cancelled().await;
                        Ok(1)
                    })
                    .await
                    .is_ok()
            })
        })
        .collect()
}

/// F041: Many callers racing past the deadline admit exactly one trial
///
/// # Falsification Attempt
/// 16 tasks call at once after the break expired; the admitted trial is
/// held until all others were rejected.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn f041_single_trial_under_race() {
    let clock = ManualClock::new();
    let breaker = breaker(&clock, 1);
    trip_and_expire(&breaker, &clock).await;

    let gate = CancellationToken::new();
    let invocations = Arc::new(AtomicU32::new(0));
    let handles = spawn_gated(&breaker, &gate, &invocations, 16);

    let metrics = breaker.clone();
    wait_until(move || metrics.metrics().rejections_total() == 15).await;
    gate.cancel();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(
        invocations.load(Ordering::SeqCst),
        1,
        "F041 FALSIFIED: more than one trial ran"
    );
    assert_eq!(admitted, 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

/// F042: Readers never observe a state outside the committed sequence
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn f042_no_torn_state_reads() {
    let control = ManualControl::new();
    let provider = StateProvider::new();
    let opened = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&opened);
    let breaker: CircuitBreaker<u32, SimError> = CircuitBreakerOptions::new()
        .with_manual_control(control.clone())
        .with_state_provider(provider.clone())
        .on_opened(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    let stop = CancellationToken::new();
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let provider = provider.clone();
            let breaker = breaker.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                let mut reads = 0u64;
                while !stop.is_cancelled() {
                    for state in [provider.circuit_state(), breaker.state()] {
                        assert!(
                            matches!(state, CircuitState::Closed | CircuitState::Isolated),
                            "F042 FALSIFIED: observed {state}"
                        );
                    }
                    reads += 1;
                    tokio::task::yield_now().await;
                }
                reads
            })
        })
        .collect();

    let writer = tokio::task::spawn_blocking(move || {
        for _ in 0..500 {
            control.isolate();
            control.close();
        }
    });
    writer.await.unwrap();
    stop.cancel();
    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }

    assert_eq!(opened.load(Ordering::SeqCst), 500);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

/// F043: HalfOpen admits exactly the configured number of trials
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn f043_half_open_trial_limit() {
    let clock = ManualClock::new();
    let breaker = breaker(&clock, 3);
    trip_and_expire(&breaker, &clock).await;

    let gate = CancellationToken::new();
    let invocations = Arc::new(AtomicU32::new(0));
    let handles = spawn_gated(&breaker, &gate, &invocations, 10);

    let metrics = breaker.clone();
    wait_until(move || metrics.metrics().rejections_total() == 7).await;
    gate.cancel();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(
        invocations.load(Ordering::SeqCst),
        3,
        "F043 FALSIFIED: trial limit not enforced"
    );
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().recoveries_total(), 1);
}

/// F044: Concurrent outcomes in Closed are all counted
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn f044_concurrent_outcomes_counted() {
    let clock = ManualClock::new();
    let breaker = breaker(&clock, 1);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                for n in 0..50 {
                    breaker
                        .execute(&ResilienceContext::new(), |_| async move { Ok(n) })
                        .await
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = breaker.metrics().snapshot();
    assert_eq!(
        snapshot.successes_total, 400,
        "F044 FALSIFIED: lost outcomes under contention"
    );
    assert_eq!(snapshot.executions_total, 400);
    assert_eq!(breaker.health().total, 400);
}

/// F045: Aborting an admitted trial frees its slot
///
/// # Falsification Attempt
/// Abort the task running the only trial; the next caller must be admitted.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn f045_aborted_trial_releases_slot() {
    let clock = ManualClock::new();
    let breaker = breaker(&clock, 1);
    trip_and_expire(&breaker, &clock).await;

    let trial = breaker.clone();
    let handle = tokio::spawn(async move {
        trial
            .execute(&ResilienceContext::new(), |_| {
                std::future::pending::<Result<u32, SimError>>()
            })
            .await
    });
    let metrics = breaker.clone();
    wait_until(move || metrics.metrics().executions_total() == 3).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    let result = breaker
        .execute(&ResilienceContext::new(), |_| async { Ok(9) })
        .await;
    assert_eq!(result.unwrap(), 9, "F045 FALSIFIED: aborted trial kept its slot");
    assert_eq!(breaker.state(), CircuitState::Closed);
}
