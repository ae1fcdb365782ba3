use crate::backoff::BackoffStrategy;
use std::time::Duration;
use tokio::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Snapshot of a manager's reconnection state.
///
/// Published through a `watch` channel; every transition replaces the whole
/// value, so a snapshot is always internally consistent.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReconnectionState {
    /// True while a reconnection cycle is running.
    pub is_reconnecting: bool,
    /// Attempts made in the current (or last exhausted) cycle.
    pub current_attempt: u32,
    /// Delay until the next scheduled attempt, if one is armed.
    pub next_attempt_in: Option<Duration>,
    /// When the last attempt started.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub last_attempt_time: Option<Instant>,
    /// Backoff strategy of the current cycle.
    pub strategy: BackoffStrategy,
    /// Why the current cycle started.
    pub reason: Option<String>,
    /// Whether the circuit breaker is open.
    pub circuit_breaker_open: bool,
    /// Whether a fallback strategy is in use. Tracks `circuit_breaker_open`.
    pub fallback_mode_active: bool,
    /// Adaptive delay multiplier, between 1.0 and 4.0.
    pub adaptive_delay_multiplier: f64,
}

impl Default for ReconnectionState {
    fn default() -> Self {
        Self {
            is_reconnecting: false,
            current_attempt: 0,
            next_attempt_in: None,
            last_attempt_time: None,
            strategy: BackoffStrategy::default(),
            reason: None,
            circuit_breaker_open: false,
            fallback_mode_active: false,
            adaptive_delay_multiplier: 1.0,
        }
    }
}
