//! Transition hooks.
//!
//! Subscribers run synchronously, in registration order, after the state
//! change is committed and before the triggering call returns. A hook that
//! reads the circuit state therefore observes the post-transition value.
//!
//! Dispatch happens after the state lock is released. One caller sees its
//! transitions dispatched in commit order; transitions committed by racing
//! threads may reach subscribers in either order.

use std::sync::Arc;
use std::time::Duration;

use tripwire_core::{OutcomeKind, ResilienceContext};

/// Arguments passed to `on_opened` subscribers.
#[derive(Debug, Clone)]
pub struct OnOpenedArgs {
    /// How long the circuit stays open. `Duration::MAX` for manual isolation.
    pub break_duration: Duration,
    /// True when opened by a manual isolate command.
    pub is_manual: bool,
    /// Outcome that tripped the circuit, `None` for manual commands.
    pub outcome_kind: Option<OutcomeKind>,
    /// Context of the execution that tripped the circuit.
    pub context: ResilienceContext,
}

/// Arguments passed to `on_closed` subscribers.
#[derive(Debug, Clone)]
pub struct OnClosedArgs {
    /// True when closed by a manual close command.
    pub is_manual: bool,
    /// Outcome of the successful trial, `None` for manual commands.
    pub outcome_kind: Option<OutcomeKind>,
    /// Context of the execution that closed the circuit.
    pub context: ResilienceContext,
}

/// Arguments passed to `on_half_opened` subscribers.
#[derive(Debug, Clone)]
pub struct OnHalfOpenedArgs {
    /// Context of the execution admitted as the trial.
    pub context: ResilienceContext,
}

/// A transition hook.
pub type Hook<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// A committed transition awaiting hook dispatch.
#[derive(Debug, Clone)]
pub(crate) enum Transition {
    Opened(OnOpenedArgs),
    Closed(OnClosedArgs),
    HalfOpened(OnHalfOpenedArgs),
}

/// Registered transition subscribers.
#[derive(Clone, Default)]
pub struct Hooks {
    on_opened: Vec<Hook<OnOpenedArgs>>,
    on_closed: Vec<Hook<OnClosedArgs>>,
    on_half_opened: Vec<Hook<OnHalfOpenedArgs>>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_opened", &self.on_opened.len())
            .field("on_closed", &self.on_closed.len())
            .field("on_half_opened", &self.on_half_opened.len())
            .finish()
    }
}

impl Hooks {
    /// Adds an `on_opened` subscriber.
    pub fn on_opened(&mut self, hook: impl Fn(&OnOpenedArgs) + Send + Sync + 'static) {
        self.on_opened.push(Arc::new(hook));
    }

    /// Adds an `on_closed` subscriber.
    pub fn on_closed(&mut self, hook: impl Fn(&OnClosedArgs) + Send + Sync + 'static) {
        self.on_closed.push(Arc::new(hook));
    }

    /// Adds an `on_half_opened` subscriber.
    pub fn on_half_opened(&mut self, hook: impl Fn(&OnHalfOpenedArgs) + Send + Sync + 'static) {
        self.on_half_opened.push(Arc::new(hook));
    }

    /// Returns true if no subscriber is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.on_opened.is_empty() && self.on_closed.is_empty() && self.on_half_opened.is_empty()
    }

    pub(crate) fn dispatch(&self, transition: &Transition) {
        match transition {
            Transition::Opened(args) => self.on_opened.iter().for_each(|hook| hook(args)),
            Transition::Closed(args) => self.on_closed.iter().for_each(|hook| hook(args)),
            Transition::HalfOpened(args) => self.on_half_opened.iter().for_each(|hook| hook(args)),
        }
    }
}
