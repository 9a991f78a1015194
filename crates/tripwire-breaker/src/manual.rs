//! Manual circuit control.
//!
//! A [`ManualControl`] handle can be attached to any number of breakers.
//! `isolate` and `close` fan out to every breaker still alive; each one
//! transitions under its own serialisation lock.
//!
//! Commands on one handle never interleave: a command issued from another
//! thread waits until the running command has reached every circuit. A
//! command issued from inside a transition hook (same thread) is queued and
//! applied after the running command finishes, so the last command issued
//! is the one every circuit ends up in.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

use crate::controller::CircuitController;

/// Command-only handle forcing circuits Isolated or Closed.
#[derive(Debug, Clone, Default)]
pub struct ManualControl {
    inner: Arc<ManualInner>,
}

#[derive(Debug, Default)]
struct ManualInner {
    isolated: AtomicBool,
    circuits: Mutex<Vec<Weak<CircuitController>>>,
    commands: ReentrantMutex<RefCell<CommandQueue>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Isolate,
    Close,
}

#[derive(Debug, Default)]
struct CommandQueue {
    running: bool,
    deferred: VecDeque<Command>,
}

/// Clears the running flag even if a hook unwinds.
struct RunningGuard<'a>(&'a RefCell<CommandQueue>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut queue = self.0.borrow_mut();
        queue.running = false;
        queue.deferred.clear();
    }
}

impl ManualControl {
    /// Creates a handle; attached circuits start Closed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle whose attached circuits start Isolated.
    #[must_use]
    pub fn new_isolated() -> Self {
        let control = Self::default();
        control.inner.isolated.store(true, Ordering::Release);
        control
    }

    /// Returns true if the last applied command was `isolate`.
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.inner.isolated.load(Ordering::Acquire)
    }

    /// Returns the number of live attached circuits.
    #[must_use]
    pub fn circuit_count(&self) -> usize {
        let mut circuits = self.inner.circuits.lock();
        circuits.retain(|circuit| circuit.strong_count() > 0);
        circuits.len()
    }

    /// Forces every attached circuit into Isolated. Idempotent.
    pub fn isolate(&self) {
        self.submit(Command::Isolate);
    }

    /// Forces every attached circuit into Closed. No-op for circuits
    /// already Closed.
    pub fn close(&self) {
        self.submit(Command::Close);
    }

    /// Builds a controller and attaches it, passing the current isolation
    /// flag so the controller starts in the right state.
    pub(crate) fn register(
        &self,
        build: impl FnOnce(bool) -> Arc<CircuitController>,
    ) -> Arc<CircuitController> {
        let mut circuits = self.inner.circuits.lock();
        circuits.retain(|circuit| circuit.strong_count() > 0);
        let controller = build(self.is_isolated());
        circuits.push(Arc::downgrade(&controller));
        controller
    }

    fn submit(&self, command: Command) {
        let commands = self.inner.commands.lock();
        {
            let mut queue = commands.borrow_mut();
            if queue.running {
                queue.deferred.push_back(command);
                tracing::debug!(?command, "manual command deferred until current one completes");
                return;
            }
            queue.running = true;
        }

        let _running = RunningGuard(&commands);
        let mut next = Some(command);
        while let Some(command) = next {
            self.apply(command);
            next = commands.borrow_mut().deferred.pop_front();
        }
    }

    fn apply(&self, command: Command) {
        let circuits = {
            let circuits = self.inner.circuits.lock();
            self.inner
                .isolated
                .store(command == Command::Isolate, Ordering::Release);
            Self::live(&circuits)
        };
        tracing::info!(?command, circuits = circuits.len(), "manual command");
        for circuit in circuits {
            match command {
                Command::Isolate => circuit.isolate(),
                Command::Close => circuit.close_manually(),
            }
        }
    }

    fn live(circuits: &[Weak<CircuitController>]) -> Vec<Arc<CircuitController>> {
        circuits.iter().filter_map(Weak::upgrade).collect()
    }
}
