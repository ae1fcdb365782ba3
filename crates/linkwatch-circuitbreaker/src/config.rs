use linkwatch_core::ConfigError;
use std::time::Duration;

/// Settings consulted on every breaker update.
///
/// The breaker itself holds no configuration: callers pass the settings in
/// with each update, so a configuration change applies from the next
/// recorded outcome on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub(crate) threshold: u32,
    pub(crate) reset_cooldown: Duration,
    pub(crate) strategy_count: usize,
}

impl BreakerSettings {
    /// Default time the breaker stays open before a success may close it.
    pub const DEFAULT_RESET_COOLDOWN: Duration = Duration::from_secs(60);

    /// Creates validated settings.
    ///
    /// * `threshold` - consecutive failures that open the breaker
    /// * `reset_cooldown` - minimum time open before a success closes it
    /// * `strategy_count` - length of the fallback rotation
    pub fn new(
        threshold: u32,
        reset_cooldown: Duration,
        strategy_count: usize,
    ) -> Result<Self, ConfigError> {
        if threshold == 0 {
            return Err(ConfigError::zero("circuit_breaker_threshold"));
        }
        if strategy_count == 0 {
            return Err(ConfigError::NoStrategies);
        }
        Ok(Self {
            threshold,
            reset_cooldown,
            strategy_count,
        })
    }

    /// Consecutive failures that open the breaker.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Minimum time open before a success may close the breaker.
    pub fn reset_cooldown(&self) -> Duration {
        self.reset_cooldown
    }

    /// Number of strategies in the fallback rotation.
    pub fn strategy_count(&self) -> usize {
        self.strategy_count
    }
}

impl Default for BreakerSettings {
    /// Threshold 5, 60 second cooldown, rotation of 3 strategies.
    fn default() -> Self {
        Self {
            threshold: 5,
            reset_cooldown: Self::DEFAULT_RESET_COOLDOWN,
            strategy_count: 3,
        }
    }
}
