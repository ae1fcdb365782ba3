use crate::backoff::BackoffStrategy;
use crate::probe::ProbeError;
use linkwatch_core::LinkEvent;
use std::time::{Duration, Instant};

/// Events emitted by a [`ReconnectionManager`](crate::ReconnectionManager).
///
/// For one attempt they arrive in this order: `ReconnectionStart`, then
/// `ReconnectionSuccess` or `ReconnectionFailure`, then any of
/// `CircuitBreakerOpen`, `FallbackMode` and `MaxAttemptsReached`.
#[derive(Debug, Clone)]
pub enum ReconnectEvent {
    /// A scheduled attempt is starting.
    ReconnectionStart {
        manager: String,
        timestamp: Instant,
        attempt: u32,
    },
    /// The connection is back and the cycle ended.
    ReconnectionSuccess {
        manager: String,
        timestamp: Instant,
        attempts: u32,
        elapsed: Duration,
    },
    /// A scheduled attempt failed.
    ReconnectionFailure {
        manager: String,
        timestamp: Instant,
        attempt: u32,
        error: ProbeError,
    },
    /// The cycle used up its attempts; another starts after `retry_in`.
    MaxAttemptsReached {
        manager: String,
        timestamp: Instant,
        attempts: u32,
        retry_in: Duration,
    },
    /// The circuit breaker opened.
    CircuitBreakerOpen {
        manager: String,
        timestamp: Instant,
        consecutive_failures: u32,
    },
    /// Fallback mode switched on or off.
    FallbackMode {
        manager: String,
        timestamp: Instant,
        active: bool,
        strategy: BackoffStrategy,
    },
}

impl LinkEvent for ReconnectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReconnectEvent::ReconnectionStart { .. } => "ReconnectionStart",
            ReconnectEvent::ReconnectionSuccess { .. } => "ReconnectionSuccess",
            ReconnectEvent::ReconnectionFailure { .. } => "ReconnectionFailure",
            ReconnectEvent::MaxAttemptsReached { .. } => "MaxAttemptsReached",
            ReconnectEvent::CircuitBreakerOpen { .. } => "CircuitBreakerOpen",
            ReconnectEvent::FallbackMode { .. } => "FallbackMode",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ReconnectEvent::ReconnectionStart { timestamp, .. }
            | ReconnectEvent::ReconnectionSuccess { timestamp, .. }
            | ReconnectEvent::ReconnectionFailure { timestamp, .. }
            | ReconnectEvent::MaxAttemptsReached { timestamp, .. }
            | ReconnectEvent::CircuitBreakerOpen { timestamp, .. }
            | ReconnectEvent::FallbackMode { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            ReconnectEvent::ReconnectionStart { manager, .. }
            | ReconnectEvent::ReconnectionSuccess { manager, .. }
            | ReconnectEvent::ReconnectionFailure { manager, .. }
            | ReconnectEvent::MaxAttemptsReached { manager, .. }
            | ReconnectEvent::CircuitBreakerOpen { manager, .. }
            | ReconnectEvent::FallbackMode { manager, .. } => manager,
        }
    }
}
