//! Rolling window of probe samples.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one probe, as recorded in the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySample {
    /// When the probe finished.
    pub timestamp: Instant,
    /// Whether the backend was reachable.
    pub success: bool,
    /// Measured round trip. For failed probes this is the time spent before
    /// giving up and carries no latency meaning.
    pub latency: Duration,
}

/// Bounded window of samples, limited both by count and by age.
#[derive(Debug, Clone)]
pub(crate) struct SampleWindow {
    samples: VecDeque<QualitySample>,
    capacity: usize,
    max_age: Duration,
}

impl SampleWindow {
    pub(crate) fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            max_age,
        }
    }

    pub(crate) fn push(&mut self, sample: QualitySample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        self.evict_expired(sample.timestamp);
    }

    /// Drops samples older than `max_age` relative to `now`.
    pub(crate) fn evict_expired(&mut self, now: Instant) {
        while let Some(sample) = self.samples.front() {
            if now.saturating_duration_since(sample.timestamp) > self.max_age {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub(crate) fn latest(&self) -> Option<&QualitySample> {
        self.samples.back()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &QualitySample> {
        self.samples.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }

    pub(crate) fn clear(&mut self) {
        self.samples.clear();
    }
}
