//! A manager supervising a link that drops out and comes back.
//!
//! Run with: cargo run --example flaky_uplink
//!
//! The probe fails for the first few seconds, then recovers. Watch the
//! attempts back off, the circuit breaker switch strategies, and the final
//! reconnection.

use linkwatch::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Simulated remote end that can be toggled up or down.
#[derive(Clone)]
struct Uplink {
    up: Arc<AtomicBool>,
}

impl Uplink {
    fn new() -> Self {
        Self {
            up: Arc::new(AtomicBool::new(true)),
        }
    }

    fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }
}

impl ConnectionProbe for Uplink {
    async fn probe(&self, _timeout: Duration) -> Result<ProbeOutcome, BoxError> {
        tokio::time::sleep(Duration::from_millis(30)).await;
        if self.up.load(Ordering::SeqCst) {
            Ok(ProbeOutcome::reachable(Duration::from_millis(30)))
        } else {
            Err("no route to host".into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("Flaky Uplink Example");
    println!("====================\n");

    let uplink = Uplink::new();
    let (signals, _) = broadcast::channel(8);

    let manager = ReconnectionManager::builder(uplink.clone())
        .name("uplink")
        .config(
            ReconnectConfig::builder()
                .max_attempts(8)
                .base_delay(Duration::from_millis(200))
                .max_delay(Duration::from_secs(2))
                .circuit_breaker_threshold(3)
                .reset_cooldown(Duration::from_secs(1))
                .assessment_interval(Duration::from_secs(2))
                .build()?,
        )
        .signals(signals.clone())
        .build();

    manager.on_reconnection_start(|attempt| println!("  attempt {attempt}"));
    manager.on_reconnection_failure(|attempt, error| println!("  attempt {attempt} failed: {error}"));
    manager.on_fallback_mode(|active| println!("  fallback mode: {active}"));
    manager.on_reconnection_success(|| println!("  reconnected"));

    manager.start();

    println!("Link goes down");
    uplink.set_up(false);
    signals.send(ConnectivitySignal::ConnectionLost)?;

    tokio::time::sleep(Duration::from_secs(3)).await;
    let state = manager.reconnection_state();
    println!(
        "\nState: attempt {} via {}, breaker open: {}\n",
        state.current_attempt, state.strategy, state.circuit_breaker_open
    );

    println!("Link comes back");
    uplink.set_up(true);
    tokio::time::sleep(Duration::from_secs(3)).await;

    let metrics = manager.reconnection_metrics();
    println!("\nMetrics:");
    println!("  attempts:       {}", metrics.total_attempts);
    println!("  failed:         {}", metrics.failed_attempts);
    println!("  reconnections:  {}", metrics.successful_reconnections);
    println!("  average time:   {:?}", metrics.average_reconnection_time);

    let status = manager.connection_status();
    println!("  online:         {} ({} ms)", status.is_online, status.latency_ms());

    manager.stop();
    Ok(())
}
