use crate::BreakerSettings;
use std::time::Duration;
use tokio::time::Instant;

/// A change in breaker state caused by a recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTransition {
    /// The failure threshold was reached; fallback mode is now active.
    Opened {
        /// Consecutive failures at the moment of opening.
        consecutive_failures: u32,
        /// Rotation index now in use.
        fallback_index: usize,
    },
    /// Another full threshold of failures while open moved the rotation on.
    Rotated {
        /// Rotation index now in use.
        fallback_index: usize,
    },
    /// A success after the cooldown closed the breaker.
    Closed,
}

/// Point-in-time view of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Whether the breaker is open (and fallback mode active).
    pub open: bool,
    /// When the breaker last opened, while it is open.
    pub opened_at: Option<Instant>,
    /// Index into the fallback rotation.
    pub fallback_index: usize,
}

/// Consecutive-failure circuit breaker that selects a backoff strategy
/// instead of rejecting calls.
///
/// Closed, the breaker points at rotation index 0. Once `threshold`
/// consecutive failures accumulate it opens, records when, and advances the
/// rotation; each further `threshold` failures while open advance it again.
/// Any success clears the failure count, and a success at least
/// `reset_cooldown` after opening closes the breaker and rewinds the rotation.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreaker {
    consecutive_failures: u32,
    open: bool,
    opened_at: Option<Instant>,
    fallback_index: usize,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed attempt.
    pub fn record_failure(
        &mut self,
        now: Instant,
        settings: &BreakerSettings,
    ) -> Option<BreakerTransition> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if !self.open {
            if self.consecutive_failures < settings.threshold {
                return None;
            }
            self.open = true;
            self.opened_at = Some(now);
            self.advance(settings);

            #[cfg(feature = "tracing")]
            tracing::info!(
                consecutive_failures = self.consecutive_failures,
                fallback_index = self.fallback_index,
                "circuit breaker opened"
            );

            return Some(BreakerTransition::Opened {
                consecutive_failures: self.consecutive_failures,
                fallback_index: self.fallback_index,
            });
        }

        if self.consecutive_failures % settings.threshold == 0 {
            self.advance(settings);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                fallback_index = self.fallback_index,
                "fallback strategy rotated"
            );

            return Some(BreakerTransition::Rotated {
                fallback_index: self.fallback_index,
            });
        }

        None
    }

    /// Records a successful attempt.
    pub fn record_success(
        &mut self,
        now: Instant,
        settings: &BreakerSettings,
    ) -> Option<BreakerTransition> {
        self.consecutive_failures = 0;

        if !self.open || self.cooldown_remaining(now, settings).is_some() {
            return None;
        }

        self.open = false;
        self.opened_at = None;
        self.fallback_index = 0;

        #[cfg(feature = "tracing")]
        tracing::info!("circuit breaker closed");

        Some(BreakerTransition::Closed)
    }

    /// Time left before a success may close the open breaker; `None` when
    /// closed or when the cooldown has elapsed.
    pub fn cooldown_remaining(&self, now: Instant, settings: &BreakerSettings) -> Option<Duration> {
        let opened_at = self.opened_at.filter(|_| self.open)?;
        let elapsed = now.saturating_duration_since(opened_at);
        settings
            .reset_cooldown
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }

    /// Picks the strategy at the current rotation index.
    ///
    /// Falls back to the first entry if the list shrank below the index.
    pub fn select<'a, S>(&self, strategies: &'a [S]) -> Option<&'a S> {
        strategies
            .get(self.fallback_index)
            .or_else(|| strategies.first())
    }

    /// Whether the breaker is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Fallback mode is active exactly while the breaker is open.
    pub fn fallback_mode_active(&self) -> bool {
        self.open
    }

    /// Failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Current index into the fallback rotation.
    pub fn fallback_index(&self) -> usize {
        self.fallback_index
    }

    /// Returns a snapshot of the breaker.
    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            consecutive_failures: self.consecutive_failures,
            open: self.open,
            opened_at: self.opened_at,
            fallback_index: self.fallback_index,
        }
    }

    /// Closes the breaker and rewinds the rotation without emitting a transition.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn advance(&mut self, settings: &BreakerSettings) {
        self.fallback_index = (self.fallback_index + 1) % settings.strategy_count.max(1);
    }
}
