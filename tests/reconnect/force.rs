use super::support::*;
use linkwatch_reconnect::{ConnectivitySignal, QualityRating, ReconnectEvent};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn successful_force_while_idle_starts_nothing() {
    let probe = ScriptedProbe::new(Mode::Up);
    let (manager, log) = manager_with_log(&probe, fixed_config().build().unwrap());

    assert!(manager.force_reconnection("user request").await);

    assert!(!manager.is_reconnecting());
    assert!(log.events().is_empty());
    let status = manager.connection_status();
    assert!(status.is_online);
    assert_eq!(status.latency, Some(Duration::from_millis(50)));
    assert_eq!(manager.reconnection_metrics().total_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_force_starts_cycle_after_first_delay() {
    let probe = ScriptedProbe::new(Mode::Down);
    let (manager, log) = manager_with_log(&probe, fixed_config().build().unwrap());

    assert!(!manager.force_reconnection("user request").await);

    let state = manager.reconnection_state();
    assert!(state.is_reconnecting);
    assert_eq!(state.reason.as_deref(), Some("user request"));
    assert_eq!(state.current_attempt, 0);
    assert_eq!(state.next_attempt_in, Some(Duration::from_secs(1)));
    // The forced probe is not an attempt.
    assert_eq!(manager.reconnection_metrics().total_attempts, 0);
    assert!(log.events().is_empty());

    advance_ms(999).await;
    assert_eq!(probe.calls(), 1);

    advance_ms(2).await;
    assert_eq!(manager.reconnection_state().current_attempt, 1);
    assert_eq!(probe.calls(), 2);
    assert_eq!(log.types(), vec!["ReconnectionStart", "ReconnectionFailure"]);
}

#[tokio::test(start_paused = true)]
async fn successful_force_ends_running_cycle() {
    let probe = ScriptedProbe::new(Mode::Down);
    let (manager, log) = manager_with_log(&probe, fixed_config().build().unwrap());

    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    settle().await;

    probe.set(Mode::Up);
    assert!(manager.force_reconnection("user request").await);

    assert!(!manager.is_reconnecting());
    assert!(matches!(
        log.events().last(),
        Some(ReconnectEvent::ReconnectionSuccess { attempts: 1, .. })
    ));
    assert_eq!(manager.reconnection_metrics().successful_reconnections, 1);

    advance_ms(10_000).await;
    assert_eq!(log.count("ReconnectionStart"), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_force_leaves_running_cycle_alone() {
    let probe = ScriptedProbe::new(Mode::Down);
    let (manager, _log) = manager_with_log(&probe, fixed_config().build().unwrap());

    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    settle().await;

    assert!(!manager.force_reconnection("user request").await);

    let state = manager.reconnection_state();
    assert!(state.is_reconnecting);
    assert_eq!(state.current_attempt, 1);
    assert_eq!(state.reason.as_deref(), Some("Connection lost"));
    assert_eq!(manager.reconnection_metrics().failed_attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_forces_share_one_probe() {
    let probe = ScriptedProbe::new(Mode::Hang);
    let config = fixed_config()
        .probe_timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let (manager, _log) = manager_with_log(&probe, config);

    let (first, second) = tokio::join!(
        manager.force_reconnection("first"),
        manager.force_reconnection("second"),
    );

    assert!(!first);
    assert!(!second);
    assert_eq!(probe.calls(), 1);
    assert!(manager.is_reconnecting());
}

#[tokio::test(start_paused = true)]
async fn assessment_never_starts_cycle() {
    let probe = ScriptedProbe::new(Mode::Down);
    let (manager, _log) = manager_with_log(&probe, fixed_config().build().unwrap());

    let report = manager.assess_connection_quality().await;
    assert_eq!(report.score, 0);
    assert_eq!(report.rating, QualityRating::Offline);
    assert!(!manager.is_reconnecting());

    probe.set(Mode::Up);
    let report = manager.assess_connection_quality().await;
    assert_eq!(report.rating, QualityRating::Poor);
    assert!(!manager.is_reconnecting());
}

#[tokio::test(start_paused = true)]
async fn healthy_assessment_scores_excellent() {
    let probe = ScriptedProbe::new(Mode::Up);
    let (manager, _log) = manager_with_log(&probe, fixed_config().build().unwrap());

    let report = manager.assess_connection_quality().await;
    assert_eq!(report.score, 100);
    assert_eq!(report.rating, QualityRating::Excellent);
}
