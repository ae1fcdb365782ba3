use crate::sample::{QualitySample, SampleWindow};
use crate::{ConnectionStatus, QualityFactors, QualityReport};
use linkwatch_core::ConfigError;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// Settings for a [`QualityAssessor`].
#[derive(Debug, Clone, PartialEq)]
pub struct QualityConfig {
    pub(crate) capacity: usize,
    pub(crate) max_age: Duration,
    pub(crate) latency_floor: Duration,
    pub(crate) latency_ceiling: Duration,
}

impl QualityConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> QualityConfigBuilder {
        QualityConfigBuilder::new()
    }

    /// Maximum number of samples kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples older than this are ignored.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Mean latency at or below which the latency factor is 1.0.
    pub fn latency_floor(&self) -> Duration {
        self.latency_floor
    }

    /// Mean latency at or above which the latency factor is 0.0.
    pub fn latency_ceiling(&self) -> Duration {
        self.latency_ceiling
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            max_age: Duration::from_secs(60),
            latency_floor: Duration::from_millis(100),
            latency_ceiling: Duration::from_millis(1000),
        }
    }
}

/// Builder for [`QualityConfig`].
#[derive(Debug, Clone)]
pub struct QualityConfigBuilder {
    config: QualityConfig,
}

impl QualityConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: QualityConfig::default(),
        }
    }

    /// Sets how many samples the window keeps.
    ///
    /// Default: 10
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Sets the maximum sample age.
    ///
    /// Default: 60 seconds
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.config.max_age = max_age;
        self
    }

    /// Sets the latency below which a probe counts as fast.
    ///
    /// Default: 100 milliseconds
    pub fn latency_floor(mut self, floor: Duration) -> Self {
        self.config.latency_floor = floor;
        self
    }

    /// Sets the latency at which the latency factor reaches zero.
    ///
    /// Default: 1 second
    pub fn latency_ceiling(mut self, ceiling: Duration) -> Self {
        self.config.latency_ceiling = ceiling;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<QualityConfig, ConfigError> {
        let config = self.config;
        if config.capacity == 0 {
            return Err(ConfigError::zero("capacity"));
        }
        if config.max_age.is_zero() {
            return Err(ConfigError::zero("max_age"));
        }
        if config.latency_floor >= config.latency_ceiling {
            return Err(ConfigError::LatencyBounds {
                floor: config.latency_floor,
                ceiling: config.latency_ceiling,
            });
        }
        Ok(config)
    }
}

impl Default for QualityConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns a rolling window of probe outcomes into a quality score.
///
/// The window is the source of truth; reports are recomputed on demand.
///
/// # Examples
///
/// ```
/// use linkwatch_quality::{QualityAssessor, QualityRating};
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// let mut assessor = QualityAssessor::default();
/// let now = Instant::now();
/// for _ in 0..5 {
///     assessor.record_sample(now, true, Duration::from_millis(40));
/// }
///
/// let report = assessor.assess(now);
/// assert_eq!(report.rating, QualityRating::Excellent);
/// assert!(assessor.is_online(now));
/// ```
#[derive(Debug, Clone)]
pub struct QualityAssessor {
    config: QualityConfig,
    window: SampleWindow,
    last_latency: Option<Duration>,
    last_connected_at: Option<SystemTime>,
}

impl QualityAssessor {
    /// Creates an assessor with an empty window.
    pub fn new(config: QualityConfig) -> Self {
        Self {
            window: SampleWindow::new(config.capacity, config.max_age),
            config,
            last_latency: None,
            last_connected_at: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Appends a probe outcome, dropping samples past capacity or age.
    pub fn record_sample(&mut self, now: Instant, success: bool, latency: Duration) {
        self.window.push(QualitySample {
            timestamp: now,
            success,
            latency,
        });

        if success {
            self.last_latency = Some(latency);
            self.last_connected_at = Some(SystemTime::now());
        } else {
            self.last_latency = None;
        }
    }

    /// Scores the current window.
    ///
    /// A window without any successful sample scores 0 (`Offline`): latency
    /// and stability carry no meaning when nothing got through.
    pub fn assess(&mut self, now: Instant) -> QualityReport {
        self.window.evict_expired(now);

        let samples: Vec<&QualitySample> = self.window.iter().collect();
        let total = samples.len();
        let successes = samples.iter().filter(|sample| sample.success).count();
        if successes == 0 {
            return QualityReport::offline();
        }

        let success_rate = successes as f64 / total as f64;
        let mean_latency = mean(samples.iter().filter(|s| s.success).map(|s| millis(s.latency)));
        let latency = self.latency_factor(mean_latency);

        // Judge stability on the newer half so one stale blip ages out quickly.
        let recent = if total >= 4 {
            &samples[total / 2..]
        } else {
            &samples[..]
        };
        let stability = stability_factor(recent);

        QualityReport::from_factors(QualityFactors {
            latency,
            success_rate,
            stability,
        })
    }

    /// True iff the most recent sample still inside `max_age` succeeded.
    pub fn is_online(&mut self, now: Instant) -> bool {
        self.window.evict_expired(now);
        self.window.latest().is_some_and(|sample| sample.success)
    }

    /// Returns the status view of the connection.
    ///
    /// `reconnect_attempts` is always 0 here; the reconnection manager owns
    /// that number and fills it in.
    pub fn status(&mut self, now: Instant) -> ConnectionStatus {
        let report = self.assess(now);
        ConnectionStatus {
            is_online: self.is_online(now),
            quality: report.rating,
            latency: self.last_latency,
            last_connected_at: self.last_connected_at,
            reconnect_attempts: 0,
        }
    }

    /// Number of samples currently in the window.
    pub fn sample_count(&self) -> usize {
        self.window.len()
    }

    /// Forgets every sample.
    pub fn clear(&mut self) {
        self.window.clear();
        self.last_latency = None;
        self.last_connected_at = None;
    }

    fn latency_factor(&self, mean_ms: f64) -> f64 {
        let floor = millis(self.config.latency_floor);
        let ceiling = millis(self.config.latency_ceiling);
        if mean_ms <= floor {
            1.0
        } else if mean_ms >= ceiling {
            0.0
        } else {
            1.0 - (mean_ms - floor) / (ceiling - floor)
        }
    }
}

impl Default for QualityAssessor {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

/// Outcome flips and latency spread both pull stability down.
fn stability_factor(samples: &[&QualitySample]) -> f64 {
    let flips = samples
        .windows(2)
        .filter(|pair| pair[0].success != pair[1].success)
        .count();
    let steadiness = if samples.len() > 1 {
        1.0 - flips as f64 / (samples.len() - 1) as f64
    } else {
        1.0
    };

    let latencies: Vec<f64> = samples
        .iter()
        .filter(|sample| sample.success)
        .map(|sample| millis(sample.latency))
        .collect();
    let consistency = match latencies.len() {
        0 => 0.0,
        1 => 1.0,
        _ => {
            let mean = mean(latencies.iter().copied());
            if mean <= 0.0 {
                1.0
            } else {
                let variance = latencies
                    .iter()
                    .map(|latency| (latency - mean).powi(2))
                    .sum::<f64>()
                    / latencies.len() as f64;
                1.0 / (1.0 + variance.sqrt() / mean)
            }
        }
    };

    steadiness * consistency
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
