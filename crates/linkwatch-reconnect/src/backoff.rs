//! Backoff strategies for spacing out reconnection attempts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Delay ceiling of the [`BackoffStrategy::Immediate`] strategy.
pub const IMMEDIATE_DELAY_CAP: Duration = Duration::from_millis(250);

/// Post-processing hook applied to every computed delay, e.g. to add jitter.
///
/// The result is clamped to the configured `max_delay`.
pub type Jitter = Arc<dyn Fn(Duration) -> Duration + Send + Sync>;

/// How the delay between reconnection attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BackoffStrategy {
    /// `base * 2^(attempt - 1) * multiplier`
    #[default]
    Exponential,
    /// `base * attempt * multiplier`
    Linear,
    /// `base`, but never more than 250 ms. Ignores attempt and multiplier.
    Immediate,
}

impl BackoffStrategy {
    /// Computes the delay before `attempt` (1-based; 0 is treated as 1).
    ///
    /// The result never exceeds `max_delay`. Multipliers below 1.0 and
    /// non-finite multipliers are treated as 1.0.
    ///
    /// # Examples
    ///
    /// ```
    /// use linkwatch_reconnect::BackoffStrategy;
    /// use std::time::Duration;
    ///
    /// let base = Duration::from_secs(1);
    /// let max = Duration::from_secs(5);
    /// let delays: Vec<_> = (1..=5)
    ///     .map(|attempt| BackoffStrategy::Exponential.compute_delay(attempt, base, max, 1.0))
    ///     .collect();
    ///
    /// assert_eq!(
    ///     delays,
    ///     [1, 2, 4, 5, 5].map(Duration::from_secs).to_vec()
    /// );
    /// ```
    pub fn compute_delay(
        &self,
        attempt: u32,
        base_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Duration {
        let attempt = attempt.max(1);
        let multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };

        let factor = match self {
            BackoffStrategy::Exponential => 2f64.powi(attempt.saturating_sub(1).min(1023) as i32),
            BackoffStrategy::Linear => f64::from(attempt),
            BackoffStrategy::Immediate => return base_delay.min(IMMEDIATE_DELAY_CAP).min(max_delay),
        };

        let nanos = base_delay.as_nanos() as f64 * factor * multiplier;
        if !nanos.is_finite() || nanos >= max_delay.as_nanos() as f64 {
            return max_delay;
        }
        Duration::from_nanos(nanos.round() as u64).min(max_delay)
    }

    /// Short lowercase name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackoffStrategy::Exponential => "exponential",
            BackoffStrategy::Linear => "linear",
            BackoffStrategy::Immediate => "immediate",
        }
    }
}

impl fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
