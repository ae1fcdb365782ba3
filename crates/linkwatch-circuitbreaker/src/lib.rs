//! Consecutive-failure circuit breaker with fallback strategy rotation.
//!
//! Unlike a request-path breaker, this one never rejects anything. Reconnect
//! attempts keep flowing while it is open; what changes is the backoff
//! strategy used between them. The breaker owns an index into a caller-held
//! strategy list and moves it along as failures pile up.
//!
//! # Example
//!
//! ```rust
//! use linkwatch_circuitbreaker::{BreakerSettings, BreakerTransition, CircuitBreaker};
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! let settings = BreakerSettings::new(3, Duration::from_secs(60), 3).unwrap();
//! let strategies = ["exponential", "linear", "immediate"];
//! let mut breaker = CircuitBreaker::new();
//! let now = Instant::now();
//!
//! breaker.record_failure(now, &settings);
//! breaker.record_failure(now, &settings);
//! let transition = breaker.record_failure(now, &settings);
//!
//! assert!(matches!(transition, Some(BreakerTransition::Opened { .. })));
//! assert_eq!(breaker.select(&strategies), Some(&"linear"));
//! ```

mod breaker;
mod config;

pub use breaker::{BreakerSnapshot, BreakerTransition, CircuitBreaker};
pub use config::BreakerSettings;
