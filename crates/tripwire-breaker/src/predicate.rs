//! Failure classification.
//!
//! A single predicate over the operation's `Result<T, E>` decides whether an
//! outcome counts toward breaking the circuit.

use std::sync::Arc;

/// Predicate deciding whether an outcome is a handled failure.
pub type ShouldHandle<T, E> = Arc<dyn Fn(&Result<T, E>) -> bool + Send + Sync>;

/// Composes error and result matchers into a [`ShouldHandle`] predicate.
///
/// An outcome is handled if any matcher accepts it. With no matchers the
/// predicate handles nothing.
///
/// ```rust,ignore
/// let should_handle = PredicateBuilder::<Response, io::Error>::new()
///     .handle_error(|e| e.kind() == io::ErrorKind::TimedOut)
///     .handle_result(|r| r.status == 500)
///     .build();
/// ```
pub struct PredicateBuilder<T, E> {
    error_matchers: Vec<Box<dyn Fn(&E) -> bool + Send + Sync>>,
    result_matchers: Vec<Box<dyn Fn(&T) -> bool + Send + Sync>>,
}

impl<T, E> PredicateBuilder<T, E>
where
    T: 'static,
    E: 'static,
{
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            error_matchers: Vec::new(),
            result_matchers: Vec::new(),
        }
    }

    /// Handles every error.
    #[must_use]
    pub fn handle_all_errors(self) -> Self {
        self.handle_error(|_| true)
    }

    /// Handles errors matching `matcher`.
    #[must_use]
    pub fn handle_error<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.error_matchers.push(Box::new(matcher));
        self
    }

    /// Handles successful results matching `matcher`.
    #[must_use]
    pub fn handle_result<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.result_matchers.push(Box::new(matcher));
        self
    }

    /// Builds the predicate.
    #[must_use]
    pub fn build(self) -> ShouldHandle<T, E> {
        let Self {
            error_matchers,
            result_matchers,
        } = self;
        Arc::new(move |outcome: &Result<T, E>| match outcome {
            Ok(value) => result_matchers.iter().any(|m| m(value)),
            Err(error) => error_matchers.iter().any(|m| m(error)),
        })
    }
}

impl<T: 'static, E: 'static> Default for PredicateBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Default predicate: every `Err` is a handled failure, every `Ok` a success.
#[must_use]
pub fn handle_all_errors<T: 'static, E: 'static>() -> ShouldHandle<T, E> {
    Arc::new(|outcome: &Result<T, E>| outcome.is_err())
}
