//! Error types for tripwire-core.
//!
//! Execution-time rejections live with the breaker; this enum covers
//! configuration and wiring failures.

/// Result type alias for tripwire operations.
pub type Result<T> = std::result::Result<T, TripwireError>;

/// Errors raised while configuring or wiring a circuit breaker.
#[derive(Debug, thiserror::Error)]
pub enum TripwireError {
    /// Configuration error (out-of-range option, unparsable file).
    #[error("configuration error: {0}")]
    Config(String),

    /// A handle was attached somewhere it cannot be attached.
    #[error("attachment error: {0}")]
    Attachment(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TripwireError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an attachment error.
    #[must_use]
    pub fn attachment(msg: impl Into<String>) -> Self {
        Self::Attachment(msg.into())
    }

    /// Returns true if the error comes from invalid user input.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Serialization(_))
    }
}
