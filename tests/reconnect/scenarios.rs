use super::support::*;
use linkwatch_reconnect::{BackoffStrategy, ConnectivitySignal, ReconnectEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn first_attempt_is_immediate_and_delays_follow_exponential_backoff() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config()
        .max_attempts(6)
        .circuit_breaker_threshold(10)
        .build()
        .unwrap();
    let (manager, _log) = manager_with_log(&probe, config);

    let starts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&starts);
    manager.on_reconnection_start(move |_| sink.lock().unwrap().push(Instant::now()));

    let began = Instant::now();
    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    advance_ms(20_000).await;

    let starts = starts.lock().unwrap().clone();
    assert_eq!(starts.len(), 6);
    assert_eq!(starts[0], began);

    let gaps: Vec<u128> = starts
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).as_millis())
        .collect();
    assert_eq!(gaps, vec![1000, 2000, 4000, 5000, 5000]);
}

#[tokio::test(start_paused = true)]
async fn success_ends_cycle_and_updates_metrics() {
    let probe = ScriptedProbe::new(Mode::Down);
    let (manager, log) = manager_with_log(&probe, fixed_config().build().unwrap());

    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    settle().await;
    assert!(manager.is_reconnecting());
    assert_eq!(manager.reconnection_state().current_attempt, 1);
    assert_eq!(
        manager.reconnection_state().reason.as_deref(),
        Some("Connection lost")
    );

    probe.set(Mode::Up);
    advance_ms(1_001).await;

    assert!(!manager.is_reconnecting());
    let state = manager.reconnection_state();
    assert_eq!(state.current_attempt, 0);
    assert_eq!(state.next_attempt_in, None);
    assert_eq!(state.reason, None);

    let metrics = manager.reconnection_metrics();
    assert_eq!(metrics.total_attempts, 2);
    assert_eq!(metrics.failed_attempts, 1);
    assert_eq!(metrics.successful_reconnections, 1);
    assert_eq!(metrics.average_reconnection_time, Duration::from_secs(1));
    assert!(metrics.last_successful_reconnection_at.is_some());

    assert_eq!(
        log.types(),
        vec![
            "ReconnectionStart",
            "ReconnectionFailure",
            "ReconnectionStart",
            "ReconnectionSuccess"
        ]
    );
    match log.events().last() {
        Some(ReconnectEvent::ReconnectionSuccess {
            attempts, elapsed, ..
        }) => {
            assert_eq!(*attempts, 2);
            assert_eq!(*elapsed, Duration::from_secs(1));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn breaker_opens_at_threshold_and_switches_strategy() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config().circuit_breaker_threshold(3).build().unwrap();
    let (manager, log) = manager_with_log(&probe, config);

    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    advance_ms(2_999).await;
    assert!(!manager.reconnection_state().circuit_breaker_open);
    assert_eq!(
        manager.reconnection_state().strategy,
        BackoffStrategy::Exponential
    );

    advance_ms(2).await;
    let state = manager.reconnection_state();
    assert_eq!(state.current_attempt, 3);
    assert!(state.circuit_breaker_open);
    assert!(state.fallback_mode_active);
    assert_eq!(state.strategy, BackoffStrategy::Linear);
    assert_eq!(state.next_attempt_in, Some(Duration::from_millis(3000)));

    let types = log.types();
    assert_eq!(
        &types[types.len() - 4..],
        &[
            "ReconnectionStart",
            "ReconnectionFailure",
            "CircuitBreakerOpen",
            "FallbackMode"
        ]
    );
    match log.events().last() {
        Some(ReconnectEvent::FallbackMode {
            active, strategy, ..
        }) => {
            assert!(*active);
            assert_eq!(*strategy, BackoffStrategy::Linear);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn rotation_continues_while_breaker_stays_open() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config()
        .circuit_breaker_threshold(3)
        .max_attempts(20)
        .build()
        .unwrap();
    let (manager, log) = manager_with_log(&probe, config);

    // Attempts at 0, 1000, 3000 (open), 6000, 10000, 15000 (rotate)
    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    advance_ms(15_001).await;

    let state = manager.reconnection_state();
    assert_eq!(state.current_attempt, 6);
    assert_eq!(state.strategy, BackoffStrategy::Immediate);
    assert_eq!(state.next_attempt_in, Some(Duration::from_millis(250)));
    assert_eq!(log.count("CircuitBreakerOpen"), 1);
    assert_eq!(log.count("FallbackMode"), 1);
}

#[tokio::test(start_paused = true)]
async fn success_after_cooldown_closes_breaker() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config()
        .circuit_breaker_threshold(3)
        .reset_cooldown(Duration::from_secs(2))
        .build()
        .unwrap();
    let (manager, log) = manager_with_log(&probe, config);

    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    advance_ms(3_001).await;
    assert!(manager.reconnection_state().circuit_breaker_open);

    probe.set(Mode::Up);
    log.clear();
    advance_ms(3_000).await;

    let state = manager.reconnection_state();
    assert!(!state.is_reconnecting);
    assert!(!state.circuit_breaker_open);
    assert!(!state.fallback_mode_active);
    assert_eq!(state.strategy, BackoffStrategy::Exponential);
    assert_eq!(
        log.types(),
        vec!["ReconnectionStart", "ReconnectionSuccess", "FallbackMode"]
    );
    assert!(matches!(
        log.events().last(),
        Some(ReconnectEvent::FallbackMode { active: false, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn success_within_cooldown_keeps_fallback_strategy() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config().circuit_breaker_threshold(3).build().unwrap();
    let (manager, log) = manager_with_log(&probe, config);

    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    advance_ms(3_001).await;
    probe.set(Mode::Up);
    advance_ms(3_000).await;

    let state = manager.reconnection_state();
    assert!(!state.is_reconnecting);
    assert!(state.circuit_breaker_open);
    assert!(state.fallback_mode_active);
    assert_eq!(manager.reconnection_metrics().successful_reconnections, 1);
    assert_eq!(log.count("FallbackMode"), 1);

    // The next cycle starts on the fallback strategy.
    probe.set(Mode::Down);
    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    settle().await;
    assert_eq!(manager.reconnection_state().strategy, BackoffStrategy::Linear);
}

#[tokio::test(start_paused = true)]
async fn exhausted_cycle_goes_idle_and_schedules_deferred_cycle() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config().max_attempts(3).build().unwrap();
    let (manager, log) = manager_with_log(&probe, config);

    // Attempts at 0, 1000, 3000; deferred cycle at 3000 + 2 * 5000.
    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    advance_ms(3_001).await;

    let state = manager.reconnection_state();
    assert!(!state.is_reconnecting);
    assert_eq!(state.current_attempt, 3);
    assert_eq!(state.next_attempt_in, Some(Duration::from_secs(10)));
    assert_eq!(log.count("MaxAttemptsReached"), 1);
    assert!(matches!(
        log.events().last(),
        Some(ReconnectEvent::MaxAttemptsReached {
            attempts: 3,
            retry_in,
            ..
        }) if *retry_in == Duration::from_secs(10)
    ));

    let metrics = manager.reconnection_metrics();
    assert_eq!(metrics.total_attempts, 3);
    assert_eq!(metrics.failed_attempts, 3);

    advance_ms(9_998).await;
    assert!(!manager.is_reconnecting());
    assert_eq!(log.count("ReconnectionStart"), 3);
    assert_eq!(log.count("MaxAttemptsReached"), 1);

    advance_ms(2).await;
    let state = manager.reconnection_state();
    assert!(state.is_reconnecting);
    assert_eq!(state.reason.as_deref(), Some("Scheduled fallback attempt"));
    assert_eq!(state.current_attempt, 1);
    assert_eq!(log.count("ReconnectionStart"), 4);
}

#[tokio::test(start_paused = true)]
async fn adaptive_multiplier_stretches_then_recovers() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config().adaptive_backoff(true).build().unwrap();
    let (manager, _log) = manager_with_log(&probe, config);

    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    settle().await;

    let state = manager.reconnection_state();
    assert!((state.adaptive_delay_multiplier - 1.2).abs() < 1e-9);
    assert_eq!(state.next_attempt_in, Some(Duration::from_millis(1200)));

    probe.set(Mode::Up);
    advance_ms(1_201).await;

    let state = manager.reconnection_state();
    assert!(!state.is_reconnecting);
    assert!((state.adaptive_delay_multiplier - 1.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn adaptive_multiplier_is_capped() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config()
        .adaptive_backoff(true)
        .circuit_breaker_threshold(20)
        .build()
        .unwrap();
    let (manager, _log) = manager_with_log(&probe, config);

    // Ten attempts span about 39 s; the deferred cycle would follow 10 s later.
    manager.handle_signal(ConnectivitySignal::ConnectionLost);
    advance_ms(45_000).await;

    let state = manager.reconnection_state();
    assert!(!state.is_reconnecting);
    assert_eq!(state.current_attempt, 10);
    assert_eq!(state.adaptive_delay_multiplier, 4.0);
}

#[tokio::test(start_paused = true)]
async fn attempt_count_never_exceeds_limit() {
    let probe = ScriptedProbe::new(Mode::Down);
    let config = fixed_config().max_attempts(4).build().unwrap();
    let (manager, _log) = manager_with_log(&probe, config);

    let mut states = manager.subscribe_state();
    manager.handle_signal(ConnectivitySignal::ConnectionLost);

    let watcher = tokio::spawn(async move {
        let mut highest = 0;
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            if state.is_reconnecting {
                assert!(state.current_attempt <= 4);
            }
            highest = highest.max(state.current_attempt);
            if !state.is_reconnecting && state.current_attempt == 4 {
                break;
            }
        }
        highest
    });

    advance_ms(20_000).await;
    assert_eq!(watcher.await.unwrap(), 4);
}
