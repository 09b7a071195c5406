//! In-memory reference implementations of the storage traits.
//!
//! Used by unit tests and the default daemon wiring. A mutex around each
//! map makes the version check and insert one atomic step, which is all
//! the optimistic concurrency contract requires.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use super::snapshot::SnapshotRecord;
use super::{EventRecord, EventStore, NewEvent, SnapshotStore};
use crate::domain::{TenantId, TournamentId};
use crate::error::StoreError;

/// Capacity of the append tap ring buffer.
const APPEND_TAP_CAPACITY: usize = 1_024;

type StreamKey = (TenantId, TournamentId);

/// Mutex-guarded in-memory event log with the atomic version check.
#[derive(Debug)]
pub struct MemoryEventStore {
    streams: Mutex<HashMap<StreamKey, Vec<EventRecord>>>,
    tap: broadcast::Sender<EventRecord>,
}

impl MemoryEventStore {
    /// Creates an empty event store.
    #[must_use]
    pub fn new() -> Self {
        let (tap, _) = broadcast::channel(APPEND_TAP_CAPACITY);
        Self {
            streams: Mutex::new(HashMap::new()),
            tap,
        }
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(
        &self,
        event: NewEvent,
        expected_version: u64,
    ) -> Result<EventRecord, StoreError> {
        if event.event_type.is_empty() {
            return Err(StoreError::Validation("empty event type".to_string()));
        }

        let mut streams = self.streams.lock().await;
        let stream = streams
            .entry((event.tenant_id.clone(), event.tournament_id))
            .or_default();

        let current = stream.len() as u64;
        if expected_version != current {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: current,
            });
        }

        let record = EventRecord {
            id: Uuid::new_v4(),
            tenant_id: event.tenant_id,
            tournament_id: event.tournament_id,
            aggregate_type: event.aggregate_type,
            event_type: event.event_type,
            version: current + 1,
            payload: event.payload,
            metadata: event.metadata,
            recorded_at: Utc::now(),
        };
        stream.push(record.clone());
        drop(streams);

        // At-least-once tap; send fails only with no subscribers.
        let _ = self.tap.send(record.clone());
        Ok(record)
    }

    async fn read(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        from_version: u64,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let streams = self.streams.lock().await;
        Ok(streams
            .get(&(tenant_id.clone(), tournament_id))
            .map(|stream| {
                stream
                    .iter()
                    .filter(|record| record.version > from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.tap.subscribe()
    }
}

/// Mutex-guarded in-memory snapshot store.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<StreamKey, SnapshotRecord>>,
}

impl MemorySnapshotStore {
    /// Creates an empty snapshot store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: SnapshotRecord) -> Result<(), StoreError> {
        let mut snapshots = self.snapshots.lock().await;
        snapshots.insert(
            (snapshot.tenant_id.clone(), snapshot.tournament_id),
            snapshot,
        );
        Ok(())
    }

    async fn load_latest(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
    ) -> Result<Option<SnapshotRecord>, StoreError> {
        let snapshots = self.snapshots.lock().await;
        Ok(snapshots.get(&(tenant_id.clone(), tournament_id)).cloned())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ClockEvent;
    use crate::store::EventMetadata;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    fn instant() -> DateTime<Utc> {
        let Some(instant) = DateTime::from_timestamp(1_750_000_000, 0) else {
            panic!("valid timestamp");
        };
        instant
    }

    fn make_event(tenant: &TenantId, tournament: TournamentId) -> NewEvent {
        let event = ClockEvent::ClockCompleted {
            completed_at: instant(),
        };
        let Ok(new_event) = NewEvent::from_clock_event(
            tenant.clone(),
            tournament,
            &event,
            EventMetadata::new(Uuid::new_v4(), instant()),
        ) else {
            panic!("envelope build failed");
        };
        new_event
    }

    #[tokio::test]
    async fn append_assigns_sequential_versions() {
        let store = MemoryEventStore::new();
        let tenant = TenantId::new("acme");
        let tournament = TournamentId::new();

        for expected in 0..3 {
            let result = store.append(make_event(&tenant, tournament), expected).await;
            let Ok(record) = result else {
                panic!("append failed at version {expected}");
            };
            assert_eq!(record.version, expected + 1);
        }

        let Ok(records) = store.read(&tenant, tournament, 0).await else {
            panic!("read failed");
        };
        let versions: Vec<u64> = records.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = MemoryEventStore::new();
        let tenant = TenantId::new("acme");
        let tournament = TournamentId::new();

        let _ = store.append(make_event(&tenant, tournament), 0).await;
        let result = store.append(make_event(&tenant, tournament), 0).await;
        let Err(StoreError::Conflict { expected, actual }) = result else {
            panic!("expected conflict");
        };
        assert_eq!(expected, 0);
        assert_eq!(actual, 1);
    }

    #[tokio::test]
    async fn read_returns_tail_after_version() {
        let store = MemoryEventStore::new();
        let tenant = TenantId::new("acme");
        let tournament = TournamentId::new();

        for expected in 0..5 {
            let _ = store.append(make_event(&tenant, tournament), expected).await;
        }

        let Ok(tail) = store.read(&tenant, tournament, 3).await else {
            panic!("read failed");
        };
        let versions: Vec<u64> = tail.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![4, 5]);
    }

    #[tokio::test]
    async fn streams_are_isolated_per_tenant() {
        let store = MemoryEventStore::new();
        let tournament = TournamentId::new();
        let tenant_a = TenantId::new("a");
        let tenant_b = TenantId::new("b");

        let _ = store.append(make_event(&tenant_a, tournament), 0).await;

        let Ok(other) = store.read(&tenant_b, tournament, 0).await else {
            panic!("read failed");
        };
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn append_tap_publishes_records() {
        let store = MemoryEventStore::new();
        let mut rx = store.subscribe();
        let tenant = TenantId::new("acme");
        let tournament = TournamentId::new();

        let _ = store.append(make_event(&tenant, tournament), 0).await;

        let Ok(record) = rx.recv().await else {
            panic!("expected tapped record");
        };
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn concurrent_appends_stay_gapless() {
        let store = Arc::new(MemoryEventStore::new());
        let tenant = TenantId::new("acme");
        let tournament = TournamentId::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let tenant = tenant.clone();
            handles.push(tokio::spawn(async move {
                // Optimistic retry loop: re-read the current version on
                // every conflict, as a real writer would.
                loop {
                    let Ok(records) = store.read(&tenant, tournament, 0).await else {
                        panic!("read failed");
                    };
                    let current = records.last().map_or(0, |r| r.version);
                    match store.append(make_event(&tenant, tournament), current).await {
                        Ok(record) => break record.version,
                        Err(StoreError::Conflict { .. }) => continue,
                        Err(other) => panic!("unexpected store error: {other}"),
                    }
                }
            }));
        }

        for handle in handles {
            let Ok(_version) = handle.await else {
                panic!("writer task failed");
            };
        }

        let Ok(records) = store.read(&tenant, tournament, 0).await else {
            panic!("read failed");
        };
        let versions: Vec<u64> = records.iter().map(|r| r.version).collect();
        assert_eq!(versions, (1..=8).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn snapshot_store_keeps_one_current() {
        let store = MemorySnapshotStore::new();
        let tenant = TenantId::new("acme");
        let tournament = TournamentId::new();
        let state = crate::domain::ClockState::new(tournament, tenant.clone());

        let Ok(mut snapshot) = SnapshotRecord::from_state(&state, instant()) else {
            panic!("snapshot build failed");
        };
        snapshot.version = 100;
        let _ = store.save(snapshot.clone()).await;

        snapshot.version = 200;
        let _ = store.save(snapshot).await;

        let Ok(Some(latest)) = store.load_latest(&tenant, tournament).await else {
            panic!("expected snapshot");
        };
        assert_eq!(latest.version, 200);
    }

    #[tokio::test]
    async fn empty_event_type_is_rejected() {
        let store = MemoryEventStore::new();
        let tenant = TenantId::new("acme");
        let tournament = TournamentId::new();

        let mut event = make_event(&tenant, tournament);
        event.event_type = String::new();

        let result = store.append(event, 0).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }
}
