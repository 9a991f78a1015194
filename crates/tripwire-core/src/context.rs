//! Per-execution context.
//!
//! A [`ResilienceContext`] travels with one logical call: it carries the
//! caller's cancellation token and a typed property bag that event hooks
//! and callers can use to exchange data (for example, a break duration a
//! caller wants to honour as its retry delay).

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Typed key into the [`ResilienceContext`] property bag.
#[derive(Debug)]
pub struct PropertyKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PropertyKey<T> {
    /// Creates a key with the given name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the key name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for PropertyKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PropertyKey<T> {}

type PropertyMap = HashMap<&'static str, Arc<dyn Any + Send + Sync>>;

/// Context for a single execution.
///
/// Cheap to clone: clones share the cancellation token and properties.
#[derive(Clone, Default)]
pub struct ResilienceContext {
    cancellation: CancellationToken,
    operation_key: Option<Arc<str>>,
    properties: Arc<RwLock<PropertyMap>>,
}

impl std::fmt::Debug for ResilienceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceContext")
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("operation_key", &self.operation_key)
            .field("properties", &self.properties.read().len())
            .finish()
    }
}

impl ResilienceContext {
    /// Creates a context with a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the given token for cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets an operation key for log correlation.
    #[must_use]
    pub fn with_operation_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.operation_key = Some(key.into());
        self
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns true if the caller cancelled this execution.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the operation key, if any.
    #[must_use]
    pub fn operation_key(&self) -> Option<&str> {
        self.operation_key.as_deref()
    }

    /// Stores a property, replacing any previous value under the same key.
    pub fn set<T>(&self, key: PropertyKey<T>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.properties.write().insert(key.name, Arc::new(value));
    }

    /// Returns a copy of a property, if present and of the key's type.
    #[must_use]
    pub fn get<T>(&self, key: PropertyKey<T>) -> Option<T>
    where
        T: Any + Send + Sync + Clone,
    {
        self.properties
            .read()
            .get(key.name)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Removes a property. Returns true if it was present.
    pub fn remove<T>(&self, key: PropertyKey<T>) -> bool {
        self.properties.write().remove(key.name).is_some()
    }
}
