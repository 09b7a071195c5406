//! tourneyclock daemon entry point.
//!
//! Wires the clock service over the in-memory reference stores, logs
//! every outbound notification, and runs until interrupted.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tourneyclock::config::EngineConfig;
use tourneyclock::engine::ClockService;
use tourneyclock::store::{EventStore, MemoryEventStore, MemorySnapshotStore, SnapshotStore};
use tourneyclock::time::{SystemTime, TimeSource};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = EngineConfig::from_env();
    tracing::info!(
        tick_interval_ms = config.tick_interval_ms,
        snapshot_every = config.snapshot_every_events,
        "starting tourneyclock"
    );

    // Build storage and service layers
    let events: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new());
    let snapshots: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());
    let time: Arc<dyn TimeSource> = Arc::new(SystemTime);
    let service = ClockService::new(config, events, snapshots, time);

    // Log every outbound notification until the gateway takes over
    let mut notifications = service.notifier().subscribe();
    tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            tracing::debug!(
                kind = notification.notification_type_str(),
                tournament = %notification.tournament_id(),
                "notification"
            );
        }
    });

    tracing::info!("clock engine ready");
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutdown signal received");
    service.shutdown().await;
    Ok(())
}
