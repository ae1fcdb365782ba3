use crate::QualityRating;
use std::time::{Duration, SystemTime};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What consumers see about the connection right now.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionStatus {
    /// True if the most recent probe succeeded.
    pub is_online: bool,
    /// Rating of the current sample window.
    pub quality: QualityRating,
    /// Latency of the most recent probe, `None` when it failed or no probe ran yet.
    pub latency: Option<Duration>,
    /// Wall-clock time of the most recent successful probe.
    pub last_connected_at: Option<SystemTime>,
    /// Attempts made in the current reconnection cycle.
    pub reconnect_attempts: u32,
}

impl ConnectionStatus {
    /// Latency in whole milliseconds, or -1 when unknown.
    pub fn latency_ms(&self) -> i64 {
        self.latency
            .map(|latency| i64::try_from(latency.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(-1)
    }
}
