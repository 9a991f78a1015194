//! Circuit breaker configuration.
//!
//! Configuration is validated at load time, with sensible defaults and clear
//! error messages. Only the serialisable knobs live here; predicates, hooks
//! and handles are attached when the breaker is built.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TripwireError};

/// Circuit breaker configuration.
///
/// The circuit breaks when, within the sampling window, at least
/// `minimum_throughput` outcomes were recorded and the share of handled
/// failures is strictly greater than `failure_ratio`. A ratio of 1.0 breaks
/// once every recorded outcome is a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failure ratio threshold in (0, 1].
    #[serde(default = "default_failure_ratio")]
    pub failure_ratio: f64,

    /// Time span over which the failure ratio is computed.
    #[serde(default = "default_sampling_duration")]
    #[serde(with = "humantime_serde")]
    pub sampling_duration: Duration,

    /// Minimum number of recorded outcomes before the ratio is acted on.
    #[serde(default = "default_minimum_throughput")]
    pub minimum_throughput: u32,

    /// Fixed break duration, used when no generator is configured.
    #[serde(default = "default_break_duration")]
    #[serde(with = "humantime_serde")]
    pub break_duration: Duration,

    /// Trial executions admitted concurrently while half-open.
    #[serde(default = "default_half_open_max_trials")]
    pub half_open_max_trials: u32,

    /// Shape of the statistics window.
    #[serde(default)]
    pub window: WindowKind,
}

fn default_failure_ratio() -> f64 {
    0.1
}

fn default_sampling_duration() -> Duration {
    Duration::from_secs(30)
}

fn default_minimum_throughput() -> u32 {
    100
}

fn default_break_duration() -> Duration {
    Duration::from_secs(5)
}

fn default_half_open_max_trials() -> u32 {
    1
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_ratio: default_failure_ratio(),
            sampling_duration: default_sampling_duration(),
            minimum_throughput: default_minimum_throughput(),
            break_duration: default_break_duration(),
            half_open_max_trials: default_half_open_max_trials(),
            window: WindowKind::default(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if any option is out of range.
    pub fn validate(&self) -> Result<()> {
        if !self.failure_ratio.is_finite()
            || self.failure_ratio <= 0.0
            || self.failure_ratio > 1.0
        {
            return Err(TripwireError::config(format!(
                "failure_ratio must be in (0, 1], got {}",
                self.failure_ratio
            )));
        }
        if self.minimum_throughput < 2 {
            return Err(TripwireError::config(format!(
                "minimum_throughput must be at least 2, got {}",
                self.minimum_throughput
            )));
        }
        if self.sampling_duration.is_zero() {
            return Err(TripwireError::config(
                "sampling_duration must be greater than 0",
            ));
        }
        if self.half_open_max_trials == 0 {
            return Err(TripwireError::config(
                "half_open_max_trials must be greater than 0",
            ));
        }
        self.window.validate(self.minimum_throughput)?;
        Ok(())
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the string cannot be parsed or is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TripwireError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns [`TripwireError::Io`] if the file cannot be read, or a
    /// configuration error if it cannot be parsed.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded circuit breaker config");
        Ok(config)
    }

    /// Serialises the configuration as TOML.
    ///
    /// # Errors
    /// Returns an error if serialisation fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| TripwireError::Serialization(e.to_string()))
    }
}

/// Shape of the statistics window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WindowKind {
    /// Keep every outcome younger than `sampling_duration`.
    #[default]
    Time,
    /// Keep the last `capacity` outcomes regardless of age.
    Count {
        /// Ring buffer capacity.
        capacity: usize,
    },
}

impl WindowKind {
    fn validate(self, minimum_throughput: u32) -> Result<()> {
        match self {
            Self::Time => Ok(()),
            Self::Count { capacity } if capacity < minimum_throughput as usize => {
                Err(TripwireError::config(format!(
                    "count window capacity ({capacity}) must be at least minimum_throughput ({minimum_throughput})"
                )))
            }
            Self::Count { .. } => Ok(()),
        }
    }
}

/// Serde helper for humantime durations.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a duration as a human-readable string.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    /// Deserializes a duration from a human-readable string.
    ///
    /// # Errors
    /// Returns an error if the string cannot be parsed.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
