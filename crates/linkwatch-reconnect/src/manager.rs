use crate::config::{ConfigUpdate, ReconnectConfig};
use crate::cycle::{self, Inner};
use crate::events::ReconnectEvent;
use crate::probe::{ConnectionProbe, ProbeError};
use crate::recorder::ReconnectionMetrics;
use crate::signal::ConnectivitySignal;
use crate::state::ReconnectionState;
use linkwatch_core::{ConfigError, EventListener, Subscription};
use linkwatch_quality::{ConnectionStatus, QualityAssessor, QualityConfig, QualityReport};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

#[cfg(feature = "tracing")]
use tracing::{debug, info};

/// Keeps one connection alive.
///
/// The manager watches connection quality in the background, reacts to
/// platform connectivity signals, and runs reconnection cycles: a sequence of
/// probes spaced by a backoff strategy, with a circuit breaker that switches
/// strategies after repeated failures. Everything it does is reported through
/// events and a `watch` channel of [`ReconnectionState`].
///
/// Cloning yields another handle to the same manager.
///
/// # Example
///
/// ```rust
/// use linkwatch_reconnect::{BoxError, ProbeOutcome, ReconnectConfig, ReconnectionManager};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let probe = |_timeout: Duration| async move {
///     Ok::<_, BoxError>(ProbeOutcome::reachable(Duration::from_millis(30)))
/// };
///
/// let manager = ReconnectionManager::builder(probe)
///     .name("uplink")
///     .config(
///         ReconnectConfig::builder()
///             .max_attempts(5)
///             .base_delay(Duration::from_millis(500))
///             .build()
///             .unwrap(),
///     )
///     .build();
///
/// manager.on_reconnection_success(|| println!("back online"));
/// manager.start();
///
/// assert!(manager.force_reconnection("user request").await);
/// manager.stop();
/// # }
/// ```
pub struct ReconnectionManager<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for ReconnectionManager<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for ReconnectionManager<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectionManager")
            .field("name", &self.inner.name)
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<P> ReconnectionManager<P>
where
    P: ConnectionProbe + 'static,
{
    /// Starts building a manager around `probe`.
    pub fn builder(probe: P) -> ReconnectionManagerBuilder<P> {
        ReconnectionManagerBuilder::new(probe)
    }

    /// Name used in logs, events and metric labels.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Starts background quality assessment and, if a signal channel was
    /// registered, connectivity signal handling.
    ///
    /// Must be called from within a Tokio runtime. Calling it on a started
    /// manager does nothing.
    pub fn start(&self) {
        let mut control = self.inner.control.lock();
        if control.started {
            #[cfg(feature = "tracing")]
            debug!(manager = %self.inner.name, "already started");
            return;
        }
        control.started = true;

        let weak = Arc::downgrade(&self.inner);
        control.tasks.monitor = Some(tokio::spawn(cycle::monitor(weak.clone())));
        if let Some(signals) = &self.inner.signals {
            control.tasks.listener = Some(tokio::spawn(cycle::listen(weak, signals.subscribe())));
        }

        #[cfg(feature = "tracing")]
        info!(
            manager = %self.inner.name,
            interval = ?self.inner.config().assessment_interval(),
            "reconnection manager started"
        );
    }

    /// Stops background work, cancels every pending attempt and returns to
    /// idle. Calling it again does nothing.
    ///
    /// The circuit breaker and the reconnection state return to their
    /// defaults. A probe already running is left to finish and its result is
    /// discarded; no new probe starts until it has. Metrics and listeners are
    /// kept; see [`cleanup`](Self::cleanup).
    pub fn stop(&self) {
        let _was_active = self.inner.halt();

        #[cfg(feature = "tracing")]
        if _was_active {
            info!(manager = %self.inner.name, "reconnection manager stopped");
        }
    }

    /// [`stop`](Self::stop), then clears metrics, the quality window and
    /// every event listener.
    pub fn cleanup(&self) {
        self.inner.reset();

        #[cfg(feature = "tracing")]
        debug!(manager = %self.inner.name, "reconnection manager reset");
    }

    /// Applies a partial configuration change.
    ///
    /// The change takes effect from the next scheduled attempt; a delay
    /// already armed is not resized. If any value is invalid nothing changes.
    ///
    /// Lowering `max_attempts` to or below the attempts already made ends the
    /// running cycle at once, as if its last attempt had failed.
    pub fn update_config(&self, update: ConfigUpdate) -> Result<(), ConfigError> {
        {
            let mut config = self.inner.config.write();
            let merged = config.merged(&update)?;
            *config = Arc::new(merged);
        }

        #[cfg(feature = "tracing")]
        info!(manager = %self.inner.name, ?update, "configuration updated");

        if update.max_attempts.is_some() {
            self.inner.enforce_attempt_limit();
        }
        Ok(())
    }

    /// Probes once, outside the attempt schedule.
    ///
    /// On success returns `true`; a running cycle ends as a success. On
    /// failure starts a cycle with `reason` (unless one is running) and
    /// returns `false`. A probe already in flight is joined rather than
    /// duplicated.
    pub async fn force_reconnection(&self, reason: &str) -> bool {
        let session = self.inner.session();
        let result = self.inner.probe_once().await;
        if self.inner.session() != session {
            return result.is_ok();
        }

        #[cfg(feature = "tracing")]
        debug!(manager = %self.inner.name, reason, ok = result.is_ok(), "forced probe");

        self.inner.after_forced_probe(reason, &result);
        result.is_ok()
    }

    /// Probes once and scores the quality window. Never starts a cycle.
    pub async fn assess_connection_quality(&self) -> QualityReport {
        self.inner.assess().await
    }

    /// Feeds a connectivity signal to the manager directly.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn handle_signal(&self, signal: ConnectivitySignal) {
        self.inner.handle_signal(signal);
    }

    /// Whether a reconnection cycle is running.
    pub fn is_reconnecting(&self) -> bool {
        self.inner.state.borrow().is_reconnecting
    }

    /// Current reconnection state.
    pub fn reconnection_state(&self) -> ReconnectionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ReconnectionState> {
        self.inner.state.subscribe()
    }

    /// Current reconnection counters.
    pub fn reconnection_metrics(&self) -> ReconnectionMetrics {
        self.inner.recorder.lock().snapshot()
    }

    /// What is known about the connection right now.
    pub fn connection_status(&self) -> ConnectionStatus {
        let mut status = self.inner.assessor.lock().status(Instant::now());
        status.reconnect_attempts = self.inner.state.borrow().current_attempt;
        status
    }

    /// Active configuration.
    pub fn config(&self) -> Arc<ReconnectConfig> {
        self.inner.config()
    }

    /// Registers a listener for every event.
    pub fn subscribe<L>(&self, listener: L) -> Subscription
    where
        L: EventListener<ReconnectEvent> + 'static,
    {
        self.inner.events.subscribe(listener)
    }

    /// Calls `f` with the attempt number when an attempt starts.
    pub fn on_reconnection_start<F>(&self, f: F) -> Subscription
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.inner.events.on(move |event| {
            if let ReconnectEvent::ReconnectionStart { attempt, .. } = event {
                f(*attempt);
            }
        })
    }

    /// Calls `f` when a cycle ends in a reconnection.
    pub fn on_reconnection_success<F>(&self, f: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.on(move |event| {
            if let ReconnectEvent::ReconnectionSuccess { .. } = event {
                f();
            }
        })
    }

    /// Calls `f` with the attempt number and error when an attempt fails.
    pub fn on_reconnection_failure<F>(&self, f: F) -> Subscription
    where
        F: Fn(u32, &ProbeError) + Send + Sync + 'static,
    {
        self.inner.events.on(move |event| {
            if let ReconnectEvent::ReconnectionFailure { attempt, error, .. } = event {
                f(*attempt, error);
            }
        })
    }

    /// Calls `f` when a cycle runs out of attempts.
    pub fn on_max_attempts_reached<F>(&self, f: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.on(move |event| {
            if let ReconnectEvent::MaxAttemptsReached { .. } = event {
                f();
            }
        })
    }

    /// Calls `f` when the circuit breaker opens.
    pub fn on_circuit_breaker_open<F>(&self, f: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.on(move |event| {
            if let ReconnectEvent::CircuitBreakerOpen { .. } = event {
                f();
            }
        })
    }

    /// Calls `f` when fallback mode switches on (`true`) or off (`false`).
    pub fn on_fallback_mode<F>(&self, f: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.events.on(move |event| {
            if let ReconnectEvent::FallbackMode { active, .. } = event {
                f(*active);
            }
        })
    }
}

/// Builder for [`ReconnectionManager`].
pub struct ReconnectionManagerBuilder<P> {
    probe: P,
    name: String,
    config: ReconnectConfig,
    quality: QualityConfig,
    signals: Option<broadcast::Sender<ConnectivitySignal>>,
}

impl<P> ReconnectionManagerBuilder<P>
where
    P: ConnectionProbe + 'static,
{
    fn new(probe: P) -> Self {
        Self {
            probe,
            name: String::from("<unnamed>"),
            config: ReconnectConfig::default(),
            quality: QualityConfig::default(),
            signals: None,
        }
    }

    /// Sets the name used in logs, events and metric labels.
    ///
    /// Default: `<unnamed>`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the reconnection configuration.
    ///
    /// Default: [`ReconnectConfig::default`]
    pub fn config(mut self, config: ReconnectConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the quality window and latency bounds.
    ///
    /// Default: [`QualityConfig::default`]
    pub fn quality(mut self, quality: QualityConfig) -> Self {
        self.quality = quality;
        self
    }

    /// Subscribes to platform connectivity signals once the manager starts.
    ///
    /// Default: none
    pub fn signals(mut self, sender: broadcast::Sender<ConnectivitySignal>) -> Self {
        self.signals = Some(sender);
        self
    }

    /// Builds the manager. Nothing runs until [`ReconnectionManager::start`].
    pub fn build(self) -> ReconnectionManager<P> {
        ReconnectionManager {
            inner: Arc::new(Inner::new(
                self.name,
                self.probe,
                self.config,
                QualityAssessor::new(self.quality),
                self.signals,
            )),
        }
    }
}

impl<P> fmt::Debug for ReconnectionManagerBuilder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectionManagerBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("quality", &self.quality)
            .field("signals", &self.signals.is_some())
            .finish()
    }
}
