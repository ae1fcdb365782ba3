use crate::backoff::{BackoffStrategy, Jitter};
use linkwatch_circuitbreaker::BreakerSettings;
use linkwatch_core::ConfigError;
use std::fmt;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for a [`ReconnectionManager`](crate::ReconnectionManager).
///
/// Built through [`ReconnectConfig::builder`], which validates every value.
/// A running manager can be reconfigured with a [`ConfigUpdate`].
#[derive(Clone)]
pub struct ReconnectConfig {
    pub(crate) max_attempts: u32,
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) adaptive_backoff: bool,
    pub(crate) fallback_strategies: Vec<BackoffStrategy>,
    pub(crate) breaker: BreakerSettings,
    pub(crate) probe_timeout: Duration,
    pub(crate) assessment_interval: Duration,
    pub(crate) poor_quality_threshold: u8,
    pub(crate) poor_quality_consecutive: u32,
    pub(crate) jitter: Option<Jitter>,
}

impl ReconnectConfig {
    /// Largest adaptive delay multiplier.
    pub const MAX_MULTIPLIER: f64 = 4.0;

    /// Factor applied to the adaptive multiplier on each failure, and
    /// divided out on each success.
    pub const MULTIPLIER_STEP: f64 = 1.2;

    /// Creates a new builder with default settings.
    pub fn builder() -> ReconnectConfigBuilder {
        ReconnectConfigBuilder::new()
    }

    /// Attempts per cycle before the manager gives up and schedules a
    /// deferred cycle.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay unit for the backoff strategies.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on any computed delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Whether the delay multiplier adapts to recent outcomes.
    pub fn adaptive_backoff(&self) -> bool {
        self.adaptive_backoff
    }

    /// Consecutive failures that open the circuit breaker.
    pub fn circuit_breaker_threshold(&self) -> u32 {
        self.breaker.threshold()
    }

    /// Strategy rotation; the first entry is used while the breaker is closed.
    pub fn fallback_strategies(&self) -> &[BackoffStrategy] {
        &self.fallback_strategies
    }

    /// Minimum time the breaker stays open before a success may close it.
    pub fn reset_cooldown(&self) -> Duration {
        self.breaker.reset_cooldown()
    }

    /// Upper bound on a single probe.
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Period of the background quality assessment.
    pub fn assessment_interval(&self) -> Duration {
        self.assessment_interval
    }

    /// Score below which a `Poor` assessment counts toward a reconnect.
    pub fn poor_quality_threshold(&self) -> u8 {
        self.poor_quality_threshold
    }

    /// Consecutive poor assessments that start a reconnection cycle.
    pub fn poor_quality_consecutive(&self) -> u32 {
        self.poor_quality_consecutive
    }

    /// Deferred cycle delay after the attempt limit is hit.
    pub fn fallback_retry_delay(&self) -> Duration {
        self.max_delay.saturating_mul(2)
    }

    pub(crate) fn breaker_settings(&self) -> &BreakerSettings {
        &self.breaker
    }

    /// Delay before `attempt` with `strategy`, jitter applied and clamped.
    pub(crate) fn delay_for(
        &self,
        strategy: BackoffStrategy,
        attempt: u32,
        multiplier: f64,
    ) -> Duration {
        let delay = strategy.compute_delay(attempt, self.base_delay, self.max_delay, multiplier);
        match &self.jitter {
            Some(jitter) => jitter(delay).min(self.max_delay),
            None => delay,
        }
    }

    /// Returns a copy with `update` applied, or the first invalid value.
    pub fn merged(&self, update: &ConfigUpdate) -> Result<Self, ConfigError> {
        let mut builder = ReconnectConfigBuilder::from(self.clone());
        if let Some(max_attempts) = update.max_attempts {
            builder = builder.max_attempts(max_attempts);
        }
        if let Some(base_delay) = update.base_delay {
            builder = builder.base_delay(base_delay);
        }
        if let Some(max_delay) = update.max_delay {
            builder = builder.max_delay(max_delay);
        }
        if let Some(adaptive) = update.adaptive_backoff {
            builder = builder.adaptive_backoff(adaptive);
        }
        if let Some(threshold) = update.circuit_breaker_threshold {
            builder = builder.circuit_breaker_threshold(threshold);
        }
        if let Some(strategies) = &update.fallback_strategies {
            builder = builder.fallback_strategies(strategies.clone());
        }
        if let Some(cooldown) = update.reset_cooldown {
            builder = builder.reset_cooldown(cooldown);
        }
        if let Some(timeout) = update.probe_timeout {
            builder = builder.probe_timeout(timeout);
        }
        if let Some(interval) = update.assessment_interval {
            builder = builder.assessment_interval(interval);
        }
        if let Some(threshold) = update.poor_quality_threshold {
            builder = builder.poor_quality_threshold(threshold);
        }
        if let Some(consecutive) = update.poor_quality_consecutive {
            builder = builder.poor_quality_consecutive(consecutive);
        }
        builder.build()
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            adaptive_backoff: true,
            fallback_strategies: default_strategies(),
            breaker: BreakerSettings::default(),
            probe_timeout: Duration::from_secs(5),
            assessment_interval: Duration::from_secs(30),
            poor_quality_threshold: 60,
            poor_quality_consecutive: 5,
            jitter: None,
        }
    }
}

impl fmt::Debug for ReconnectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectConfig")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("adaptive_backoff", &self.adaptive_backoff)
            .field("fallback_strategies", &self.fallback_strategies)
            .field("breaker", &self.breaker)
            .field("probe_timeout", &self.probe_timeout)
            .field("assessment_interval", &self.assessment_interval)
            .field("poor_quality_threshold", &self.poor_quality_threshold)
            .field("poor_quality_consecutive", &self.poor_quality_consecutive)
            .field("jitter", &self.jitter.is_some())
            .finish()
    }
}

fn default_strategies() -> Vec<BackoffStrategy> {
    vec![
        BackoffStrategy::Exponential,
        BackoffStrategy::Linear,
        BackoffStrategy::Immediate,
    ]
}

/// Builder for [`ReconnectConfig`].
#[derive(Clone)]
pub struct ReconnectConfigBuilder {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    adaptive_backoff: bool,
    circuit_breaker_threshold: u32,
    fallback_strategies: Vec<BackoffStrategy>,
    reset_cooldown: Duration,
    probe_timeout: Duration,
    assessment_interval: Duration,
    poor_quality_threshold: u8,
    poor_quality_consecutive: u32,
    jitter: Option<Jitter>,
}

impl ReconnectConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from(ReconnectConfig::default())
    }

    /// Sets the number of attempts per cycle.
    ///
    /// Default: 10
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the base delay of the backoff strategies.
    ///
    /// Default: 1 second
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the upper bound on computed delays.
    ///
    /// Default: 30 seconds
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enables or disables the adaptive delay multiplier.
    ///
    /// When enabled, each failed attempt multiplies the delay by 1.2 (up to
    /// 4.0) and each success divides it back down toward 1.0.
    ///
    /// Default: true
    pub fn adaptive_backoff(mut self, enabled: bool) -> Self {
        self.adaptive_backoff = enabled;
        self
    }

    /// Sets the consecutive failures that open the circuit breaker.
    ///
    /// Default: 5
    pub fn circuit_breaker_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker_threshold = threshold;
        self
    }

    /// Sets the fallback strategy rotation.
    ///
    /// Default: exponential, linear, immediate
    pub fn fallback_strategies(mut self, strategies: impl Into<Vec<BackoffStrategy>>) -> Self {
        self.fallback_strategies = strategies.into();
        self
    }

    /// Sets how long the breaker stays open before a success may close it.
    ///
    /// Default: 60 seconds
    pub fn reset_cooldown(mut self, cooldown: Duration) -> Self {
        self.reset_cooldown = cooldown;
        self
    }

    /// Sets the upper bound on a single probe.
    ///
    /// Default: 5 seconds
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the period of the background quality assessment.
    ///
    /// Default: 30 seconds
    pub fn assessment_interval(mut self, interval: Duration) -> Self {
        self.assessment_interval = interval;
        self
    }

    /// Sets the score below which a `Poor` assessment counts toward a reconnect.
    ///
    /// Must be at most 100. Default: 60
    pub fn poor_quality_threshold(mut self, threshold: u8) -> Self {
        self.poor_quality_threshold = threshold;
        self
    }

    /// Sets how many consecutive poor assessments start a reconnection cycle.
    ///
    /// Default: 5
    pub fn poor_quality_consecutive(mut self, count: u32) -> Self {
        self.poor_quality_consecutive = count;
        self
    }

    /// Installs a function applied to every computed delay.
    ///
    /// Its result is clamped to `max_delay`.
    ///
    /// Default: none
    pub fn jitter<F>(mut self, jitter: F) -> Self
    where
        F: Fn(Duration) -> Duration + Send + Sync + 'static,
    {
        self.jitter = Some(std::sync::Arc::new(jitter));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<ReconnectConfig, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::zero("max_attempts"));
        }
        if self.base_delay.is_zero() {
            return Err(ConfigError::zero("base_delay"));
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::DelayRange {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::zero("probe_timeout"));
        }
        if self.assessment_interval.is_zero() {
            return Err(ConfigError::zero("assessment_interval"));
        }
        if self.poor_quality_threshold > 100 {
            return Err(ConfigError::OutOfRange {
                field: "poor_quality_threshold",
                value: u64::from(self.poor_quality_threshold),
                max: 100,
            });
        }
        if self.poor_quality_consecutive == 0 {
            return Err(ConfigError::zero("poor_quality_consecutive"));
        }
        let breaker = BreakerSettings::new(
            self.circuit_breaker_threshold,
            self.reset_cooldown,
            self.fallback_strategies.len(),
        )?;

        Ok(ReconnectConfig {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            adaptive_backoff: self.adaptive_backoff,
            fallback_strategies: self.fallback_strategies,
            breaker,
            probe_timeout: self.probe_timeout,
            assessment_interval: self.assessment_interval,
            poor_quality_threshold: self.poor_quality_threshold,
            poor_quality_consecutive: self.poor_quality_consecutive,
            jitter: self.jitter,
        })
    }
}

impl Default for ReconnectConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ReconnectConfig> for ReconnectConfigBuilder {
    fn from(config: ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            adaptive_backoff: config.adaptive_backoff,
            circuit_breaker_threshold: config.breaker.threshold(),
            fallback_strategies: config.fallback_strategies,
            reset_cooldown: config.breaker.reset_cooldown(),
            probe_timeout: config.probe_timeout,
            assessment_interval: config.assessment_interval,
            poor_quality_threshold: config.poor_quality_threshold,
            poor_quality_consecutive: config.poor_quality_consecutive,
            jitter: config.jitter,
        }
    }
}

impl fmt::Debug for ReconnectConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectConfigBuilder")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("circuit_breaker_threshold", &self.circuit_breaker_threshold)
            .field("fallback_strategies", &self.fallback_strategies)
            .field("jitter", &self.jitter.is_some())
            .finish_non_exhaustive()
    }
}

/// A partial configuration change for a running manager.
///
/// `None` fields keep their current value. The merged result is validated as
/// a whole; if any value is rejected nothing changes.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConfigUpdate {
    /// Attempts per cycle. Lowering it below the attempts made ends the cycle.
    pub max_attempts: Option<u32>,
    /// Delay unit the backoff strategies scale.
    pub base_delay: Option<Duration>,
    /// Upper bound on any single delay.
    pub max_delay: Option<Duration>,
    /// Whether failures stretch delays through the adaptive multiplier.
    pub adaptive_backoff: Option<bool>,
    /// Consecutive failures that open the breaker.
    pub circuit_breaker_threshold: Option<u32>,
    /// Strategies the breaker rotates through, primary first.
    pub fallback_strategies: Option<Vec<BackoffStrategy>>,
    /// How long the breaker stays open before a success may close it.
    pub reset_cooldown: Option<Duration>,
    /// Deadline for a single probe.
    pub probe_timeout: Option<Duration>,
    /// Period of background quality assessment. Applies from the next tick.
    pub assessment_interval: Option<Duration>,
    /// Score below which a poor assessment counts toward a reconnection.
    pub poor_quality_threshold: Option<u8>,
    /// Poor assessments in a row that start a reconnection.
    pub poor_quality_consecutive: Option<u32>,
}
