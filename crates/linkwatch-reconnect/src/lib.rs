//! Connection supervision: quality monitoring, reconnection cycles and
//! fallback backoff strategies.
//!
//! A [`ReconnectionManager`] owns one connection's recovery. It is driven by
//! three kinds of trigger:
//!
//! - **Quality**: every `assessment_interval` it probes the connection and
//!   scores the recent sample window. An `Offline` rating, or a run of `Poor`
//!   ratings below `poor_quality_threshold`, starts a cycle.
//! - **Signals**: [`ConnectivitySignal`]s from the host platform, pushed with
//!   [`ReconnectionManager::handle_signal`] or delivered over a broadcast
//!   channel.
//! - **Explicit**: [`ReconnectionManager::force_reconnection`].
//!
//! # Cycles
//!
//! A cycle probes immediately, then keeps probing with delays from the
//! current [`BackoffStrategy`] until a probe succeeds or `max_attempts` is
//! used up. Failed, erroring, timed-out and panicking probes are all treated
//! the same. With adaptive backoff each failure stretches the delay by 1.2x
//! (up to 4x) and each success shrinks it back.
//!
//! After `circuit_breaker_threshold` consecutive failures the circuit
//! breaker opens and the manager switches to the next strategy in
//! `fallback_strategies`; attempts continue. A success at least
//! `reset_cooldown` after opening closes the breaker again.
//!
//! When a cycle runs out of attempts, the manager goes idle and schedules one
//! more cycle after twice `max_delay`.
//!
//! # Observability
//!
//! - Events: typed callbacks such as
//!   [`on_reconnection_failure`](ReconnectionManager::on_reconnection_failure),
//!   or [`subscribe`](ReconnectionManager::subscribe) for all [`ReconnectEvent`]s
//! - State: [`subscribe_state`](ReconnectionManager::subscribe_state)
//! - Counters: [`reconnection_metrics`](ReconnectionManager::reconnection_metrics)
//!
//! # Feature Flags
//!
//! - `tracing` (default): structured logs for transitions and attempts
//! - `metrics`: export through the `metrics` facade
//! - `serde`: serialization of state, counters and [`ConfigUpdate`]
//!
//! # Metrics
//!
//! With the `metrics` feature, every manager exports, labelled `manager`:
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `reconnect_attempts_total` | Counter | Scheduled attempts |
//! | `reconnect_outcomes_total` | Counter | Attempt outcomes (`outcome` = success/failure) |
//! | `reconnect_duration_seconds` | Histogram | Cycle start to reconnection |
//! | `reconnect_max_attempts_reached_total` | Counter | Exhausted cycles |
//! | `reconnect_state` | Gauge | 1 while reconnecting |
//! | `reconnect_circuit_open` | Gauge | 1 while the breaker is open |
//! | `connection_quality_score` | Gauge | Latest quality score |

mod backoff;
mod config;
mod cycle;
mod events;
mod manager;
mod probe;
mod recorder;
mod signal;
mod state;

pub use backoff::{BackoffStrategy, Jitter, IMMEDIATE_DELAY_CAP};
pub use config::{ConfigUpdate, ReconnectConfig, ReconnectConfigBuilder};
pub use events::ReconnectEvent;
pub use manager::{ReconnectionManager, ReconnectionManagerBuilder};
pub use probe::{ConnectionProbe, ProbeError, ProbeOutcome};
pub use recorder::{MetricsRecorder, ReconnectionMetrics};
pub use signal::ConnectivitySignal;
pub use state::ReconnectionState;

pub use linkwatch_core::{BoxError, ConfigError, EventListener, Subscription};
pub use linkwatch_quality::{ConnectionStatus, QualityConfig, QualityRating, QualityReport};
