//! Reconnection manager metrics regression tests

use super::helpers::*;
use linkwatch_reconnect::{
    BoxError, ConnectivitySignal, ProbeOutcome, ReconnectConfig, ReconnectionManager,
};
use serial_test::serial;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn config() -> ReconnectConfig {
    ReconnectConfig::builder()
        .max_attempts(2)
        .base_delay(Duration::from_millis(100))
        .max_delay(Duration::from_millis(500))
        .circuit_breaker_threshold(2)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
#[serial]
async fn reconnect_attempt_metrics_exist() {
    init_recorder();

    let up = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&up);
    let manager = ReconnectionManager::builder(move |_timeout: Duration| {
        let up = flag.load(Ordering::SeqCst);
        async move {
            Ok::<_, BoxError>(if up {
                ProbeOutcome::reachable(Duration::from_millis(10))
            } else {
                ProbeOutcome::unreachable(Duration::from_millis(10))
            })
        }
    })
    .name("metrics_attempts")
    .config(config())
    .build();

    // Two failures exhaust the cycle and open the breaker.
    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_counter_exists("reconnect_attempts_total");
    assert_metric_has_label("reconnect_attempts_total", "manager", "metrics_attempts");

    assert_counter_exists("reconnect_outcomes_total");
    assert_metric_has_label("reconnect_outcomes_total", "outcome", "failure");

    assert_counter_exists("reconnect_max_attempts_reached_total");
    assert_metric_has_label(
        "reconnect_max_attempts_reached_total",
        "manager",
        "metrics_attempts",
    );

    assert_gauge_exists("reconnect_circuit_open");
    assert_eq!(
        gauge_value("reconnect_circuit_open", "manager", "metrics_attempts"),
        Some(1.0)
    );
    assert_eq!(
        gauge_value("reconnect_state", "manager", "metrics_attempts"),
        Some(0.0)
    );

    // The deferred cycle succeeds.
    up.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_metric_has_label("reconnect_outcomes_total", "outcome", "success");
    assert_histogram_exists("reconnect_duration_seconds");
    assert_metric_has_label("reconnect_duration_seconds", "manager", "metrics_attempts");
}

#[tokio::test(start_paused = true)]
#[serial]
async fn reconnect_state_gauge_tracks_cycle() {
    init_recorder();

    let manager = ReconnectionManager::builder(|_timeout: Duration| async {
        Ok::<_, BoxError>(ProbeOutcome::unreachable(Duration::from_millis(10)))
    })
    .name("metrics_state")
    .config(config())
    .build();

    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_gauge_exists("reconnect_state");
    assert_eq!(
        gauge_value("reconnect_state", "manager", "metrics_state"),
        Some(1.0)
    );

    manager.stop();
    assert_eq!(
        gauge_value("reconnect_state", "manager", "metrics_state"),
        Some(0.0)
    );
}

#[tokio::test(start_paused = true)]
#[serial]
async fn connection_quality_gauge_exists() {
    init_recorder();

    let manager = ReconnectionManager::builder(|_timeout: Duration| async {
        Ok::<_, BoxError>(ProbeOutcome::reachable(Duration::from_millis(10)))
    })
    .name("metrics_quality")
    .build();

    let report = manager.assess_connection_quality().await;

    assert_gauge_exists("connection_quality_score");
    assert_eq!(
        gauge_value("connection_quality_score", "manager", "metrics_quality"),
        Some(f64::from(report.score))
    );
}

#[tokio::test(start_paused = true)]
#[serial]
async fn circuit_open_gauge_clears_on_stop() {
    init_recorder();

    let manager = ReconnectionManager::builder(|_timeout: Duration| async {
        Ok::<_, BoxError>(ProbeOutcome::unreachable(Duration::from_millis(10)))
    })
    .name("metrics_stop")
    .config(config())
    .build();

    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        gauge_value("reconnect_circuit_open", "manager", "metrics_stop"),
        Some(1.0)
    );

    manager.stop();
    assert_eq!(
        gauge_value("reconnect_circuit_open", "manager", "metrics_stop"),
        Some(0.0)
    );
}
