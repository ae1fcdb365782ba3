//! Client-side connectivity resilience.
//!
//! `linkwatch` keeps a connection alive: it scores connection quality from
//! probe samples, runs reconnection cycles with adaptive backoff, and falls
//! back to alternative backoff strategies through a circuit breaker when a
//! link keeps failing. Each piece is available as its own crate and
//! re-exported here.
//!
//! # Crates
//!
//! - [`quality`]: rolling-window quality scoring
//! - [`circuitbreaker`]: consecutive-failure breaker with strategy rotation
//! - [`reconnect`]: the reconnection manager tying it all together
//! - [`core`]: event bus and shared error types
//!
//! # Example
//!
//! ```rust,no_run
//! use linkwatch::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), ConfigError> {
//! let probe = |timeout: Duration| async move {
//!     // e.g. an HTTP HEAD request bounded by `timeout`
//!     let _ = timeout;
//!     Ok::<_, BoxError>(ProbeOutcome::reachable(Duration::from_millis(40)))
//! };
//!
//! let manager = ReconnectionManager::builder(probe)
//!     .name("api")
//!     .config(
//!         ReconnectConfig::builder()
//!             .max_attempts(8)
//!             .circuit_breaker_threshold(3)
//!             .build()?,
//!     )
//!     .build();
//!
//! manager.on_reconnection_failure(|attempt, error| {
//!     eprintln!("attempt {attempt} failed: {error}");
//! });
//! manager.on_fallback_mode(|active| eprintln!("fallback mode: {active}"));
//!
//! manager.start();
//! # Ok(())
//! # }
//! ```

pub use linkwatch_core as core;

pub use linkwatch_circuitbreaker as circuitbreaker;

pub use linkwatch_quality as quality;

pub use linkwatch_reconnect as reconnect;

/// The types most applications need.
pub mod prelude {
    pub use linkwatch_core::{BoxError, ConfigError, EventListener, LinkEvent, Subscription};
    pub use linkwatch_quality::{
        ConnectionStatus, QualityConfig, QualityRating, QualityReport,
    };
    pub use linkwatch_reconnect::{
        BackoffStrategy, ConfigUpdate, ConnectionProbe, ConnectivitySignal, ProbeError,
        ProbeOutcome, ReconnectConfig, ReconnectEvent, ReconnectionManager, ReconnectionMetrics,
        ReconnectionState,
    };
}
