use super::support::*;
use linkwatch_reconnect::{
    BackoffStrategy, ConnectivitySignal, QualityConfig, ReconnectConfig, ReconnectionManager,
    ReconnectionState,
};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn monitor_starts_cycle_when_offline() {
    let probe = ScriptedProbe::new(Mode::Down);
    let (manager, log) = manager_with_log(&probe, fixed_config().build().unwrap());
    manager.start();

    advance_ms(29_999).await;
    assert!(!manager.is_reconnecting());
    assert_eq!(probe.calls(), 0);

    advance_ms(2).await;
    let state = manager.reconnection_state();
    assert!(state.is_reconnecting);
    assert_eq!(state.reason.as_deref(), Some("Connection quality offline"));
    assert_eq!(state.current_attempt, 1);
    assert_eq!(log.count("ReconnectionStart"), 1);
    // One assessment probe plus the first attempt.
    assert_eq!(probe.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn healthy_connection_accumulates_uptime() {
    let probe = ScriptedProbe::new(Mode::Up);
    let (manager, log) = manager_with_log(&probe, fixed_config().build().unwrap());
    manager.start();

    advance_ms(95_000).await;

    assert!(!manager.is_reconnecting());
    assert!(log.events().is_empty());
    assert_eq!(probe.calls(), 3);

    let metrics = manager.reconnection_metrics();
    assert_eq!(metrics.connection_uptime, Duration::from_secs(90));
    assert_eq!(metrics.total_attempts, 0);

    let status = manager.connection_status();
    assert!(status.is_online);
    assert_eq!(status.latency_ms(), 50);
}

#[tokio::test(start_paused = true)]
async fn sustained_poor_quality_starts_cycle() {
    // Slow and flapping: every window of two samples scores 25.
    let probe = ScriptedProbe::new(Mode::Flapping).with_latency(Duration::from_millis(1000));
    let manager = ReconnectionManager::builder(probe.clone())
        .name("test")
        .config(fixed_config().poor_quality_consecutive(3).build().unwrap())
        .quality(QualityConfig::builder().capacity(2).build().unwrap())
        .build();
    let log = EventLog::default();
    manager.subscribe(log.clone());
    manager.start();

    // Ticks at 30 s (good), 60 s, 90 s (poor, poor).
    advance_ms(119_999).await;
    assert!(log.events().is_empty());

    // Third poor tick at 120 s; the first attempt lands on an up probe.
    advance_ms(2).await;
    assert_eq!(
        log.types(),
        vec!["ReconnectionStart", "ReconnectionSuccess"]
    );
    assert_eq!(manager.reconnection_metrics().successful_reconnections, 1);
}

#[tokio::test(start_paused = true)]
async fn good_assessment_resets_poor_streak() {
    let probe = ScriptedProbe::new(Mode::Flapping).with_latency(Duration::from_millis(1000));
    let manager = ReconnectionManager::builder(probe.clone())
        .name("test")
        .config(fixed_config().poor_quality_consecutive(3).build().unwrap())
        .quality(QualityConfig::builder().capacity(2).build().unwrap())
        .build();
    let log = EventLog::default();
    manager.subscribe(log.clone());
    manager.start();

    // 30 s good, 60 s poor.
    advance_ms(60_001).await;
    // 90 s poor, 120 s good.
    probe.set(Mode::Up);
    advance_ms(60_000).await;
    // 150 s good, 180 s poor, 210 s poor.
    probe.set(Mode::Flapping);
    advance_ms(90_000).await;
    assert!(log.events().is_empty());

    // 240 s is the third poor tick in a row.
    advance_ms(30_000).await;
    assert_eq!(
        log.types(),
        vec!["ReconnectionStart", "ReconnectionSuccess"]
    );
}

#[tokio::test(start_paused = true)]
async fn start_twice_runs_one_monitor() {
    let probe = ScriptedProbe::new(Mode::Up);
    let (manager, _log) = manager_with_log(&probe, fixed_config().build().unwrap());

    manager.start();
    manager.start();
    advance_ms(30_001).await;

    assert_eq!(probe.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_attempt() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config()
        .adaptive_backoff(true)
        .circuit_breaker_threshold(2)
        .build()
        .unwrap();
    let (manager, log) = manager_with_log(&probe, config);
    manager.start();

    // Attempts at 0 and 1200; the second opens the breaker.
    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    advance_ms(1_201).await;
    let state = manager.reconnection_state();
    assert_eq!(state.current_attempt, 2);
    assert!(state.circuit_breaker_open);
    assert!(state.fallback_mode_active);
    assert_eq!(state.strategy, BackoffStrategy::Linear);
    assert!(state.adaptive_delay_multiplier > 1.0);

    manager.stop();
    manager.stop();
    assert_eq!(manager.reconnection_state(), ReconnectionState::default());

    advance_ms(60_000).await;
    assert_eq!(probe.calls(), 2);
    assert_eq!(log.count("ReconnectionStart"), 2);
    // Counters survive a stop.
    assert_eq!(manager.reconnection_metrics().total_attempts, 2);

    // The breaker starts over: one failure is not enough to open it.
    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    settle().await;
    let state = manager.reconnection_state();
    assert_eq!(state.current_attempt, 1);
    assert!(!state.circuit_breaker_open);
    assert_eq!(state.strategy, BackoffStrategy::Exponential);
    assert_eq!(state.adaptive_delay_multiplier, 1.2);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_deferred_cycle() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config().max_attempts(1).build().unwrap();
    let (manager, log) = manager_with_log(&probe, config);

    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    settle().await;
    assert_eq!(log.count("MaxAttemptsReached"), 1);

    manager.stop();
    advance_ms(30_000).await;

    assert_eq!(log.count("ReconnectionStart"), 1);
    assert!(!manager.is_reconnecting());
}

#[tokio::test(start_paused = true)]
async fn stopped_manager_can_restart() {
    let probe = ScriptedProbe::new(Mode::Down);
    let (manager, _log) = manager_with_log(&probe, fixed_config().build().unwrap());

    manager.start();
    manager.stop();
    manager.start();
    advance_ms(30_001).await;

    assert!(manager.is_reconnecting());
}

#[tokio::test(start_paused = true)]
async fn cleanup_resets_counters_breaker_and_listeners() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config().circuit_breaker_threshold(2).build().unwrap();
    let (manager, log) = manager_with_log(&probe, config);

    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    advance_ms(1_001).await;
    assert!(manager.reconnection_state().circuit_breaker_open);

    manager.cleanup();

    assert_eq!(manager.reconnection_state(), ReconnectionState::default());
    let metrics = manager.reconnection_metrics();
    assert_eq!(metrics.total_attempts, 0);
    assert_eq!(metrics.failed_attempts, 0);
    assert!(!manager.connection_status().is_online);

    log.clear();
    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    settle().await;

    // Listeners are gone and the breaker starts closed again.
    assert!(log.events().is_empty());
    let state = manager.reconnection_state();
    assert!(state.is_reconnecting);
    assert!(!state.circuit_breaker_open);
    assert_eq!(manager.reconnection_metrics().total_attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_last_handle_ends_background_work() {
    let probe = ScriptedProbe::new(Mode::Down);
    let manager = ReconnectionManager::builder(probe.clone())
        .config(ReconnectConfig::default())
        .build();
    manager.start();

    drop(manager);
    advance_ms(120_000).await;

    assert_eq!(probe.calls(), 0);
}
