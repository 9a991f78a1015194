//! Simulated downstream dependency.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::chaos::FaultInjector;

/// Failure returned by simulated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// Failure the breaker handles (counts toward breaking).
    #[error("transient downstream failure")]
    Transient,
    /// Failure the breaker does not handle (propagates, not recorded).
    #[error("fatal downstream failure")]
    Fatal,
}

impl SimError {
    /// Returns true for failures a breaker should count.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// A dependency called through a circuit breaker.
#[async_trait]
pub trait Downstream: Send + Sync {
    /// Serves one request, echoing its id on success.
    async fn call(&self, request_id: u64) -> Result<u64, SimError>;
}

/// Downstream that can be switched unhealthy and counts invocations.
#[derive(Debug, Default)]
pub struct FlakyDownstream {
    unhealthy: AtomicBool,
    invocations: AtomicU64,
    latency: Option<Duration>,
    injector: Option<Arc<FaultInjector>>,
}

impl FlakyDownstream {
    /// Creates a healthy downstream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fixed latency to every call.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Draws faults and latency from `injector`.
    #[must_use]
    pub fn with_injector(mut self, injector: Arc<FaultInjector>) -> Self {
        self.injector = Some(injector);
        self
    }

    /// Makes every call fail transiently (`false`) or succeed (`true`).
    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::Release);
    }

    /// Returns true unless switched unhealthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        !self.unhealthy.load(Ordering::Acquire)
    }

    /// Returns the number of calls that reached this downstream.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Downstream for FlakyDownstream {
    async fn call(&self, request_id: u64) -> Result<u64, SimError> {
        self.invocations.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(injector) = &self.injector {
            injector.maybe_inject_latency().await;
            if let Some(fault) = injector.next_fault() {
                return Err(fault);
            }
        }

        if self.is_healthy() {
            Ok(request_id)
        } else {
            Err(SimError::Transient)
        }
    }
}
