//! Shared manager state and the reconnection cycle itself.
//!
//! Every state transition happens while holding the `control` lock and
//! produces a list of events; the events are emitted after the lock is
//! released so listeners may call back into the manager.

use crate::backoff::BackoffStrategy;
use crate::config::ReconnectConfig;
use crate::events::ReconnectEvent;
use crate::probe::{ConnectionProbe, ProbeError};
use crate::recorder::MetricsRecorder;
use crate::signal::ConnectivitySignal;
use crate::state::ReconnectionState;
use futures::future::{BoxFuture, FutureExt, Shared};
use linkwatch_circuitbreaker::{BreakerTransition, CircuitBreaker};
use linkwatch_core::EventBus;
use linkwatch_quality::{QualityAssessor, QualityRating, QualityReport};
use parking_lot::{Mutex, RwLock};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[cfg(feature = "tracing")]
use tracing::{debug, info, trace, warn};

/// Latency of a successful probe, or why it failed.
pub(crate) type ProbeResult = Result<Duration, ProbeError>;

type SharedProbe = Shared<BoxFuture<'static, ProbeResult>>;

/// The single probe allowed to run at a time.
struct InFlight {
    id: u64,
    session: u64,
    probe: SharedProbe,
}

pub(crate) const REASON_DEFERRED: &str = "Scheduled fallback attempt";
pub(crate) const REASON_OFFLINE: &str = "Connection quality offline";
pub(crate) const REASON_POOR: &str = "Poor connection quality";
pub(crate) const REASON_LOST: &str = "Connection lost";
pub(crate) const REASON_CHANGED: &str = "Connection changed to offline";

#[derive(Default)]
pub(crate) struct Tasks {
    cycle: Option<JoinHandle<()>>,
    deferred: Option<JoinHandle<()>>,
    pub(crate) monitor: Option<JoinHandle<()>>,
    pub(crate) listener: Option<JoinHandle<()>>,
}

impl Tasks {
    fn abort_all(&mut self) {
        for handle in [
            self.cycle.take(),
            self.deferred.take(),
            self.monitor.take(),
            self.listener.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }

    fn abort_deferred(&mut self) {
        if let Some(handle) = self.deferred.take() {
            handle.abort();
        }
    }
}

/// Bookkeeping guarded by a single lock.
#[derive(Default)]
pub(crate) struct Control {
    /// Bumped whenever a cycle ends or the manager stops; a cycle task whose
    /// generation no longer matches exits without touching anything.
    generation: u64,
    pub(crate) started: bool,
    cycle_started_at: Option<Instant>,
    poor_streak: u32,
    breaker: CircuitBreaker,
    pub(crate) tasks: Tasks,
}

pub(crate) struct Inner<P> {
    pub(crate) name: String,
    probe: Arc<P>,
    pub(crate) config: RwLock<Arc<ReconnectConfig>>,
    pub(crate) state: watch::Sender<ReconnectionState>,
    pub(crate) recorder: Mutex<MetricsRecorder>,
    pub(crate) assessor: Mutex<QualityAssessor>,
    pub(crate) events: EventBus<ReconnectEvent>,
    pub(crate) control: Mutex<Control>,
    in_flight: Mutex<Option<InFlight>>,
    probe_ids: AtomicU64,
    /// Bumped by `stop`; probes started in an older session drop their sample.
    session: AtomicU64,
    pub(crate) signals: Option<broadcast::Sender<ConnectivitySignal>>,
}

impl<P> Inner<P>
where
    P: ConnectionProbe + 'static,
{
    pub(crate) fn new(
        name: String,
        probe: P,
        config: ReconnectConfig,
        assessor: QualityAssessor,
        signals: Option<broadcast::Sender<ConnectivitySignal>>,
    ) -> Self {
        let (state, _) = watch::channel(ReconnectionState::default());
        Self {
            recorder: Mutex::new(MetricsRecorder::new(name.clone())),
            name,
            probe: Arc::new(probe),
            config: RwLock::new(Arc::new(config)),
            state,
            assessor: Mutex::new(assessor),
            events: EventBus::new(),
            control: Mutex::new(Control::default()),
            in_flight: Mutex::new(None),
            probe_ids: AtomicU64::new(0),
            session: AtomicU64::new(0),
            signals,
        }
    }

    pub(crate) fn config(&self) -> Arc<ReconnectConfig> {
        Arc::clone(&self.config.read())
    }

    pub(crate) fn session(&self) -> u64 {
        self.session.load(Ordering::Acquire)
    }

    fn emit_all(&self, events: Vec<ReconnectEvent>) {
        for event in &events {
            self.events.emit(event);
        }
    }

    fn event_time() -> std::time::Instant {
        std::time::Instant::now()
    }

    /// Runs a probe, or joins the one already in flight.
    ///
    /// A probe left over from before a `stop` is waited out, never joined:
    /// its result belongs to the old session.
    pub(crate) async fn probe_once(self: &Arc<Self>) -> ProbeResult {
        loop {
            let session = self.session();
            let (id, shared, stale) = {
                let mut slot = self.in_flight.lock();
                match slot.as_ref() {
                    Some(running) => (
                        running.id,
                        running.probe.clone(),
                        running.session != session,
                    ),
                    None => {
                        let id = self.probe_ids.fetch_add(1, Ordering::Relaxed);
                        let handle = tokio::spawn(Arc::clone(self).execute_probe(id, session));
                        let probe = async move {
                            handle.await.unwrap_or_else(|error| {
                                if error.is_panic() {
                                    Err(ProbeError::Panicked)
                                } else {
                                    Err(ProbeError::Failed("probe task cancelled".to_string()))
                                }
                            })
                        }
                        .boxed()
                        .shared();
                        *slot = Some(InFlight {
                            id,
                            session,
                            probe: probe.clone(),
                        });
                        (id, probe, false)
                    }
                }
            };

            if !stale {
                return shared.await;
            }

            #[cfg(feature = "tracing")]
            trace!(manager = %self.name, "waiting out probe from a stopped session");

            let _ = shared.await;
            self.release_slot(id);
        }
    }

    fn release_slot(&self, id: u64) {
        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|running| running.id == id) {
            *slot = None;
        }
    }

    async fn execute_probe(self: Arc<Self>, id: u64, session: u64) -> ProbeResult {
        let timeout = self.config().probe_timeout();
        let probe = Arc::clone(&self.probe);
        let started = Instant::now();

        let outcome = tokio::time::timeout(
            timeout,
            AssertUnwindSafe(async move { probe.probe(timeout).await }).catch_unwind(),
        )
        .await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Err(_) => Err(ProbeError::Timeout(timeout)),
            Ok(Err(_)) => Err(ProbeError::Panicked),
            Ok(Ok(Err(error))) => Err(ProbeError::from(error)),
            Ok(Ok(Ok(outcome))) if outcome.success => Ok(outcome.latency),
            Ok(Ok(Ok(_))) => Err(ProbeError::Unreachable),
        };

        #[cfg(feature = "tracing")]
        trace!(manager = %self.name, ?result, ?elapsed, "probe finished");

        if self.session() == session {
            let (success, latency) = match &result {
                Ok(latency) => (true, *latency),
                Err(_) => (false, elapsed),
            };
            self.assessor
                .lock()
                .record_sample(Instant::now(), success, latency);
        }

        self.release_slot(id);
        result
    }

    /// Probes and scores the window without triggering anything.
    pub(crate) async fn assess(self: &Arc<Self>) -> QualityReport {
        let _ = self.probe_once().await;
        let report = self.assessor.lock().assess(Instant::now());
        self.recorder.lock().record_quality(report.score);
        report
    }

    /// Starts a cycle unless one is already running.
    pub(crate) fn begin_cycle(self: &Arc<Self>, reason: &str, initial_delay: Duration) -> bool {
        let config = self.config();
        let mut control = self.control.lock();
        let strategy = current_strategy(&control.breaker, &config);

        let started = self.state.send_if_modified(|state| {
            if state.is_reconnecting {
                return false;
            }
            *state = ReconnectionState {
                is_reconnecting: true,
                current_attempt: 0,
                next_attempt_in: Some(initial_delay),
                last_attempt_time: None,
                strategy,
                reason: Some(reason.to_string()),
                ..state.clone()
            };
            true
        });
        if !started {
            #[cfg(feature = "tracing")]
            debug!(manager = %self.name, reason, "already reconnecting, trigger ignored");
            return false;
        }

        control.generation += 1;
        control.cycle_started_at = Some(Instant::now());
        control.poor_streak = 0;
        control.tasks.abort_deferred();
        let generation = control.generation;
        let task = tokio::spawn(Arc::clone(self).run_cycle(generation, initial_delay));
        if let Some(previous) = control.tasks.cycle.replace(task) {
            previous.abort();
        }
        self.recorder.lock().record_reconnecting(true);

        #[cfg(feature = "tracing")]
        info!(manager = %self.name, reason, %strategy, delay = ?initial_delay, "reconnection started");

        true
    }

    async fn run_cycle(self: Arc<Self>, generation: u64, initial_delay: Duration) {
        let mut delay = initial_delay;
        loop {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let Some(attempt) = self.begin_attempt(generation) else {
                return;
            };
            let result = self.probe_once().await;
            match self.finish_attempt(generation, attempt, result) {
                Some(next) => delay = next,
                None => return,
            }
        }
    }

    fn begin_attempt(self: &Arc<Self>, generation: u64) -> Option<u32> {
        let config = self.config();
        let mut events = Vec::new();
        let attempt = {
            let mut control = self.control.lock();
            if control.generation != generation {
                return None;
            }

            // A lowered max_attempts can still land here if it raced the timer.
            let made = self.state.borrow().current_attempt;
            if made >= config.max_attempts() {
                self.give_up(&mut control, &config, made, &mut events);
                None
            } else {
                let now = Instant::now();
                let mut attempt = 0;
                self.state.send_modify(|state| {
                    state.current_attempt += 1;
                    state.next_attempt_in = None;
                    state.last_attempt_time = Some(now);
                    attempt = state.current_attempt;
                });
                self.recorder.lock().record_attempt();

                #[cfg(feature = "tracing")]
                debug!(manager = %self.name, attempt, "reconnection attempt");

                events.push(ReconnectEvent::ReconnectionStart {
                    manager: self.name.clone(),
                    timestamp: Self::event_time(),
                    attempt,
                });
                Some(attempt)
            }
        };
        self.emit_all(events);
        attempt
    }

    /// Applies an attempt's result; returns the delay before the next one.
    fn finish_attempt(
        self: &Arc<Self>,
        generation: u64,
        attempt: u32,
        result: ProbeResult,
    ) -> Option<Duration> {
        let config = self.config();
        let mut events = Vec::new();
        let next = {
            let mut control = self.control.lock();
            if control.generation != generation {
                return None;
            }

            match result {
                Ok(_) => {
                    // Our own handle; dropping it detaches rather than aborts.
                    control.tasks.cycle = None;
                    self.complete(&mut control, &config, &mut events);
                    None
                }
                Err(error) => self.fail(&mut control, &config, attempt, error, &mut events),
            }
        };
        self.emit_all(events);
        next
    }

    fn fail(
        self: &Arc<Self>,
        control: &mut Control,
        config: &ReconnectConfig,
        attempt: u32,
        error: ProbeError,
        events: &mut Vec<ReconnectEvent>,
    ) -> Option<Duration> {
        #[cfg(feature = "tracing")]
        warn!(manager = %self.name, attempt, %error, "reconnection attempt failed");

        self.recorder.lock().record_failure();
        events.push(ReconnectEvent::ReconnectionFailure {
            manager: self.name.clone(),
            timestamp: Self::event_time(),
            attempt,
            error,
        });

        let transition = control
            .breaker
            .record_failure(Instant::now(), config.breaker_settings());
        let strategy = current_strategy(&control.breaker, config);
        let open = control.breaker.is_open();
        let multiplier = {
            let current = self.state.borrow().adaptive_delay_multiplier;
            if config.adaptive_backoff() {
                (current * ReconnectConfig::MULTIPLIER_STEP).min(ReconnectConfig::MAX_MULTIPLIER)
            } else {
                current
            }
        };

        match transition {
            Some(BreakerTransition::Opened {
                consecutive_failures,
                ..
            }) => {
                self.recorder.lock().record_circuit_open(true);
                events.push(ReconnectEvent::CircuitBreakerOpen {
                    manager: self.name.clone(),
                    timestamp: Self::event_time(),
                    consecutive_failures,
                });
                events.push(ReconnectEvent::FallbackMode {
                    manager: self.name.clone(),
                    timestamp: Self::event_time(),
                    active: true,
                    strategy,
                });
            }
            Some(BreakerTransition::Rotated { .. }) => {
                #[cfg(feature = "tracing")]
                debug!(manager = %self.name, %strategy, "rotated to next fallback strategy");
            }
            _ => {}
        }

        if attempt >= config.max_attempts() {
            self.state.send_modify(|state| {
                state.strategy = strategy;
                state.circuit_breaker_open = open;
                state.fallback_mode_active = open;
                state.adaptive_delay_multiplier = multiplier;
            });
            self.give_up(control, config, attempt, events);
            return None;
        }

        let delay = config.delay_for(strategy, attempt, multiplier);
        self.state.send_modify(|state| {
            state.strategy = strategy;
            state.circuit_breaker_open = open;
            state.fallback_mode_active = open;
            state.adaptive_delay_multiplier = multiplier;
            state.next_attempt_in = Some(delay);
        });

        #[cfg(feature = "tracing")]
        debug!(manager = %self.name, next_attempt = attempt + 1, ?delay, %strategy, "next attempt scheduled");

        Some(delay)
    }

    /// Ends the cycle after its last attempt and arms the deferred cycle.
    fn give_up(
        self: &Arc<Self>,
        control: &mut Control,
        config: &ReconnectConfig,
        attempts: u32,
        events: &mut Vec<ReconnectEvent>,
    ) {
        let retry_in = config.fallback_retry_delay();
        control.generation += 1;
        control.cycle_started_at = None;
        control.tasks.cycle = None;

        self.state.send_modify(|state| {
            state.is_reconnecting = false;
            state.next_attempt_in = Some(retry_in);
            state.reason = None;
        });
        {
            let mut recorder = self.recorder.lock();
            recorder.record_max_attempts_reached();
            recorder.record_reconnecting(false);
        }

        #[cfg(feature = "tracing")]
        warn!(manager = %self.name, attempts, ?retry_in, "max reconnection attempts reached");

        events.push(ReconnectEvent::MaxAttemptsReached {
            manager: self.name.clone(),
            timestamp: Self::event_time(),
            attempts,
            retry_in,
        });

        let weak = Arc::downgrade(self);
        let deferred = tokio::spawn(async move {
            tokio::time::sleep(retry_in).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.control.lock().tasks.deferred = None;
            inner.begin_cycle(REASON_DEFERRED, Duration::ZERO);
        });
        if let Some(previous) = control.tasks.deferred.replace(deferred) {
            previous.abort();
        }
    }

    /// Ends a running cycle that a lowered `max_attempts` has already used up.
    ///
    /// The armed delay is cancelled rather than resized. An attempt still in
    /// flight is allowed to finish when it is the last one permitted.
    pub(crate) fn enforce_attempt_limit(self: &Arc<Self>) {
        let config = self.config();
        let mut events = Vec::new();
        {
            let mut control = self.control.lock();
            let (reconnecting, made, waiting) = {
                let state = self.state.borrow();
                (
                    state.is_reconnecting,
                    state.current_attempt,
                    state.next_attempt_in.is_some(),
                )
            };
            let max = config.max_attempts();
            if !reconnecting || made < max || (made == max && !waiting) {
                return;
            }
            if let Some(cycle) = control.tasks.cycle.take() {
                cycle.abort();
            }
            self.give_up(&mut control, &config, made, &mut events);
        }
        self.emit_all(events);
    }

    /// Ends the running cycle as a success.
    fn complete(
        &self,
        control: &mut Control,
        config: &ReconnectConfig,
        events: &mut Vec<ReconnectEvent>,
    ) {
        let now = Instant::now();
        let elapsed = control
            .cycle_started_at
            .take()
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        control.generation += 1;
        control.tasks.abort_deferred();

        let closed = matches!(
            control
                .breaker
                .record_success(now, config.breaker_settings()),
            Some(BreakerTransition::Closed)
        );
        let open = control.breaker.is_open();
        let strategy = current_strategy(&control.breaker, config);
        let (attempts, multiplier) = {
            let state = self.state.borrow();
            let multiplier = if config.adaptive_backoff() {
                (state.adaptive_delay_multiplier / ReconnectConfig::MULTIPLIER_STEP).max(1.0)
            } else {
                state.adaptive_delay_multiplier
            };
            (state.current_attempt, multiplier)
        };

        self.state.send_replace(ReconnectionState {
            strategy,
            circuit_breaker_open: open,
            fallback_mode_active: open,
            adaptive_delay_multiplier: multiplier,
            ..ReconnectionState::default()
        });
        {
            let mut recorder = self.recorder.lock();
            recorder.record_success(elapsed, SystemTime::now());
            recorder.record_reconnecting(false);
            if closed {
                recorder.record_circuit_open(false);
            }
        }

        #[cfg(feature = "tracing")]
        info!(manager = %self.name, attempts, ?elapsed, "reconnected");

        events.push(ReconnectEvent::ReconnectionSuccess {
            manager: self.name.clone(),
            timestamp: Self::event_time(),
            attempts,
            elapsed,
        });
        if closed {
            events.push(ReconnectEvent::FallbackMode {
                manager: self.name.clone(),
                timestamp: Self::event_time(),
                active: false,
                strategy,
            });
        }
    }

    /// The connection came back outside the attempt schedule.
    pub(crate) fn on_reconnected(&self) {
        let config = self.config();
        let mut events = Vec::new();
        {
            let mut control = self.control.lock();
            control.tasks.abort_deferred();
            if self.state.borrow().is_reconnecting {
                if let Some(cycle) = control.tasks.cycle.take() {
                    cycle.abort();
                }
                self.complete(&mut control, &config, &mut events);
            } else {
                // Drop the deferred delay left visible by a give-up.
                self.state.send_if_modified(|state| state.next_attempt_in.take().is_some());
                self.settle_breaker(&mut control, &config, &mut events);
            }
        }
        self.emit_all(events);
    }

    /// Feeds a success to the breaker without a cycle to complete.
    fn settle_breaker(
        &self,
        control: &mut Control,
        config: &ReconnectConfig,
        events: &mut Vec<ReconnectEvent>,
    ) {
        let transition = control
            .breaker
            .record_success(Instant::now(), config.breaker_settings());
        if transition != Some(BreakerTransition::Closed) {
            return;
        }

        let strategy = current_strategy(&control.breaker, config);
        self.state.send_modify(|state| {
            state.circuit_breaker_open = false;
            state.fallback_mode_active = false;
            state.strategy = strategy;
        });
        self.recorder.lock().record_circuit_open(false);
        events.push(ReconnectEvent::FallbackMode {
            manager: self.name.clone(),
            timestamp: Self::event_time(),
            active: false,
            strategy,
        });
    }

    pub(crate) fn handle_signal(self: &Arc<Self>, signal: ConnectivitySignal) {
        #[cfg(feature = "tracing")]
        debug!(manager = %self.name, ?signal, "connectivity signal");

        match signal {
            ConnectivitySignal::ConnectionLost => {
                self.begin_cycle(REASON_LOST, Duration::ZERO);
            }
            ConnectivitySignal::Reconnected => self.on_reconnected(),
            ConnectivitySignal::ConnectionChanged(status) => {
                if !status.is_online {
                    self.begin_cycle(REASON_CHANGED, Duration::ZERO);
                } else if self.state.borrow().is_reconnecting {
                    self.on_reconnected();
                }
            }
        }
    }

    /// Outcome of a forced probe.
    pub(crate) fn after_forced_probe(self: &Arc<Self>, reason: &str, result: &ProbeResult) {
        match result {
            Ok(_) => self.on_reconnected(),
            Err(_) => {
                let config = self.config();
                let (strategy, multiplier) = {
                    let control = self.control.lock();
                    let multiplier = self.state.borrow().adaptive_delay_multiplier;
                    (current_strategy(&control.breaker, &config), multiplier)
                };
                let delay = config.delay_for(strategy, 1, multiplier);
                self.begin_cycle(reason, delay);
            }
        }
    }

    /// One background assessment.
    async fn monitor_tick(self: &Arc<Self>) {
        let reconnecting = self.state.borrow().is_reconnecting;
        if reconnecting {
            #[cfg(feature = "tracing")]
            trace!(manager = %self.name, "reconnecting, assessment skipped");
            return;
        }

        let report = self.assess().await;
        let config = self.config();
        if self.assessor.lock().is_online(Instant::now()) {
            self.recorder.lock().add_uptime(config.assessment_interval());
        }

        #[cfg(feature = "tracing")]
        debug!(manager = %self.name, score = report.score, rating = %report.rating, "quality assessed");

        match report.rating {
            QualityRating::Offline => {
                self.begin_cycle(REASON_OFFLINE, Duration::ZERO);
            }
            QualityRating::Poor if report.score < config.poor_quality_threshold() => {
                let trigger = {
                    let mut control = self.control.lock();
                    control.poor_streak += 1;
                    control.poor_streak >= config.poor_quality_consecutive()
                };
                if trigger {
                    self.begin_cycle(REASON_POOR, Duration::ZERO);
                }
            }
            _ => self.control.lock().poor_streak = 0,
        }
    }

    /// Stops every task, resets the breaker and returns the state to its
    /// defaults. Counters and listeners survive.
    ///
    /// A probe still in flight keeps its slot until it settles, so nothing
    /// can start a second one alongside it.
    pub(crate) fn halt(&self) -> bool {
        let (was_active, was_open) = {
            let mut control = self.control.lock();
            let was_active = control.started || self.state.borrow().is_reconnecting;
            let was_open = control.breaker.is_open();
            control.started = false;
            control.generation += 1;
            control.cycle_started_at = None;
            control.poor_streak = 0;
            control.tasks.abort_all();
            control.breaker.reset();
            self.session.fetch_add(1, Ordering::AcqRel);
            self.state.send_replace(ReconnectionState::default());
            (was_active, was_open)
        };
        {
            let recorder = self.recorder.lock();
            recorder.record_reconnecting(false);
            if was_open {
                recorder.record_circuit_open(false);
            }
        }
        was_active
    }

    /// `halt` plus a reset of counters, the quality window and listeners.
    pub(crate) fn reset(&self) {
        self.halt();
        self.recorder.lock().reset();
        self.assessor.lock().clear();
        self.events.clear();
    }
}

fn current_strategy(breaker: &CircuitBreaker, config: &ReconnectConfig) -> BackoffStrategy {
    breaker
        .select(config.fallback_strategies())
        .copied()
        .unwrap_or_default()
}

/// Periodic assessment loop. Holds only a weak handle so a dropped manager
/// ends the loop.
pub(crate) async fn monitor<P>(inner: Weak<Inner<P>>)
where
    P: ConnectionProbe + 'static,
{
    loop {
        let Some(interval) = inner
            .upgrade()
            .map(|inner| inner.config().assessment_interval())
        else {
            return;
        };
        tokio::time::sleep(interval).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.monitor_tick().await;
    }
}

/// Forwards broadcast connectivity signals to the manager.
pub(crate) async fn listen<P>(
    inner: Weak<Inner<P>>,
    mut signals: broadcast::Receiver<ConnectivitySignal>,
) where
    P: ConnectionProbe + 'static,
{
    loop {
        match signals.recv().await {
            Ok(signal) => {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                inner.handle_signal(signal);
            }
            Err(broadcast::error::RecvError::Lagged(_skipped)) => {
                #[cfg(feature = "tracing")]
                warn!(skipped = _skipped, "connectivity signals dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
