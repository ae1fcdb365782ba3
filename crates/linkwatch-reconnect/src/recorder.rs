//! Reconnection counters and their export through the `metrics` facade.

use std::time::{Duration, SystemTime};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Snapshot of a manager's reconnection counters.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReconnectionMetrics {
    /// Scheduled attempts made, across all cycles.
    pub total_attempts: u64,
    /// Cycles that ended in a reconnection.
    pub successful_reconnections: u64,
    /// Scheduled attempts that failed.
    pub failed_attempts: u64,
    /// Mean time from cycle start to reconnection.
    pub average_reconnection_time: Duration,
    /// Wall-clock time of the last reconnection.
    pub last_successful_reconnection_at: Option<SystemTime>,
    /// Accumulated time seen online by the quality monitor.
    pub connection_uptime: Duration,
}

/// Accumulates [`ReconnectionMetrics`] and mirrors them to the `metrics`
/// facade when that feature is enabled.
#[derive(Debug)]
pub struct MetricsRecorder {
    name: String,
    metrics: ReconnectionMetrics,
    average_secs: f64,
}

impl MetricsRecorder {
    /// Creates a recorder whose exported metrics carry `manager = name`.
    pub fn new(name: impl Into<String>) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "reconnect_attempts_total",
                    "Total number of scheduled reconnection attempts"
                );
                describe_counter!(
                    "reconnect_outcomes_total",
                    "Reconnection attempt outcomes by result"
                );
                describe_counter!(
                    "reconnect_max_attempts_reached_total",
                    "Number of cycles that exhausted their attempt budget"
                );
                describe_histogram!(
                    "reconnect_duration_seconds",
                    "Time from cycle start to successful reconnection"
                );
                describe_gauge!(
                    "reconnect_state",
                    "1 while a reconnection cycle is running, 0 otherwise"
                );
                describe_gauge!(
                    "reconnect_circuit_open",
                    "1 while the reconnect circuit breaker is open, 0 otherwise"
                );
                describe_gauge!(
                    "connection_quality_score",
                    "Most recent connection quality score (0-100)"
                );
            });
        }

        Self {
            name: name.into(),
            metrics: ReconnectionMetrics::default(),
            average_secs: 0.0,
        }
    }

    /// Name used as the `manager` label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Counts a scheduled attempt.
    pub fn record_attempt(&mut self) {
        self.metrics.total_attempts += 1;

        #[cfg(feature = "metrics")]
        counter!("reconnect_attempts_total", "manager" => self.name.clone()).increment(1);
    }

    /// Counts a failed scheduled attempt.
    pub fn record_failure(&mut self) {
        self.metrics.failed_attempts += 1;

        #[cfg(feature = "metrics")]
        counter!("reconnect_outcomes_total", "manager" => self.name.clone(), "outcome" => "failure")
            .increment(1);
    }

    /// Counts a reconnection that took `elapsed` since its cycle started.
    pub fn record_success(&mut self, elapsed: Duration, at: SystemTime) {
        self.metrics.successful_reconnections += 1;
        let count = self.metrics.successful_reconnections as f64;
        self.average_secs += (elapsed.as_secs_f64() - self.average_secs) / count;
        self.metrics.average_reconnection_time = Duration::from_secs_f64(self.average_secs.max(0.0));
        self.metrics.last_successful_reconnection_at = Some(at);

        #[cfg(feature = "metrics")]
        {
            counter!("reconnect_outcomes_total", "manager" => self.name.clone(), "outcome" => "success")
                .increment(1);
            histogram!("reconnect_duration_seconds", "manager" => self.name.clone())
                .record(elapsed.as_secs_f64());
        }
    }

    /// Counts a cycle that ran out of attempts.
    pub fn record_max_attempts_reached(&mut self) {
        #[cfg(feature = "metrics")]
        counter!("reconnect_max_attempts_reached_total", "manager" => self.name.clone())
            .increment(1);
    }

    /// Adds time observed online.
    pub fn add_uptime(&mut self, uptime: Duration) {
        self.metrics.connection_uptime = self.metrics.connection_uptime.saturating_add(uptime);
    }

    /// Exports whether a cycle is running.
    pub fn record_reconnecting(&self, reconnecting: bool) {
        #[cfg(feature = "metrics")]
        gauge!("reconnect_state", "manager" => self.name.clone())
            .set(if reconnecting { 1.0 } else { 0.0 });
        #[cfg(not(feature = "metrics"))]
        let _ = reconnecting;
    }

    /// Exports whether the breaker is open.
    pub fn record_circuit_open(&self, open: bool) {
        #[cfg(feature = "metrics")]
        gauge!("reconnect_circuit_open", "manager" => self.name.clone())
            .set(if open { 1.0 } else { 0.0 });
        #[cfg(not(feature = "metrics"))]
        let _ = open;
    }

    /// Exports the latest quality score.
    pub fn record_quality(&self, score: u8) {
        #[cfg(feature = "metrics")]
        gauge!("connection_quality_score", "manager" => self.name.clone()).set(f64::from(score));
        #[cfg(not(feature = "metrics"))]
        let _ = score;
    }

    /// Returns the current counters.
    pub fn snapshot(&self) -> ReconnectionMetrics {
        self.metrics.clone()
    }

    /// Zeroes every counter.
    pub fn reset(&mut self) {
        self.metrics = ReconnectionMetrics::default();
        self.average_secs = 0.0;
    }
}
