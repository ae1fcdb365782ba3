//! Shared error types.

use std::time::Duration;
use thiserror::Error;

/// Boxed error used where external collaborators report failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A configuration value was rejected.
///
/// Builders and partial config updates validate eagerly; when one of these is
/// returned the previously active configuration stays in effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A count or duration that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Name of the offending setting.
        field: &'static str,
    },

    /// The base delay exceeds the maximum delay.
    #[error("base_delay ({base:?}) must not exceed max_delay ({max:?})")]
    DelayRange {
        /// Configured base delay.
        base: Duration,
        /// Configured maximum delay.
        max: Duration,
    },

    /// A bounded setting was above its maximum.
    #[error("{field} must be at most {max}, got {value}")]
    OutOfRange {
        /// Name of the offending setting.
        field: &'static str,
        /// Rejected value.
        value: u64,
        /// Largest accepted value.
        max: u64,
    },

    /// The fallback strategy list was empty.
    #[error("at least one fallback strategy is required")]
    NoStrategies,

    /// The latency floor is not below the latency ceiling.
    #[error("latency floor ({floor:?}) must be below latency ceiling ({ceiling:?})")]
    LatencyBounds {
        /// Configured floor.
        floor: Duration,
        /// Configured ceiling.
        ceiling: Duration,
    },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Zero`].
    pub fn zero(field: &'static str) -> Self {
        ConfigError::Zero { field }
    }

    /// Returns the name of the setting that was rejected, if there is exactly one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::Zero { field } | ConfigError::OutOfRange { field, .. } => Some(field),
            ConfigError::DelayRange { .. } => Some("base_delay"),
            ConfigError::NoStrategies => Some("fallback_strategies"),
            ConfigError::LatencyBounds { .. } => Some("latency_floor"),
        }
    }
}
