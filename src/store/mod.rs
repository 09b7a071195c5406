//! Storage boundary: append-only event log and snapshot store traits.
//!
//! The durable engine behind these traits is an external collaborator; the
//! crate ships in-memory reference implementations used by unit tests and
//! the default daemon wiring. All failures surface through
//! [`crate::error::StoreError`], which the service layer maps onto the
//! caller-facing retry taxonomy.

pub mod event;
pub mod memory;
pub mod snapshot;

pub use event::{AGGREGATE_TYPE, EventMetadata, EventRecord, NewEvent};
pub use memory::{MemoryEventStore, MemorySnapshotStore};
pub use snapshot::SnapshotRecord;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{TenantId, TournamentId};
use crate::error::StoreError;

/// Append-only ledger of immutable, versioned facts per aggregate.
#[async_trait]
pub trait EventStore: Send + Sync + std::fmt::Debug {
    /// Appends an event at `expected_version + 1`.
    ///
    /// Atomically compares the aggregate's current max version against
    /// `expected_version`; on match the event is inserted at the next
    /// version and published on the append tap.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when `expected_version` is stale,
    /// [`StoreError::Validation`] for malformed records, or
    /// [`StoreError::Unavailable`] on transient storage failure.
    async fn append(&self, event: NewEvent, expected_version: u64)
    -> Result<EventRecord, StoreError>;

    /// Reads the gapless ascending tail with `version > from_version`.
    ///
    /// Repeatable and idempotent: the same arguments always return the
    /// same prefix-stable sequence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on transient storage failure.
    async fn read(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        from_version: u64,
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// Subscribes to the append tap.
    ///
    /// Delivery is at-least-once; consumers must dedupe by event id.
    fn subscribe(&self) -> broadcast::Receiver<EventRecord>;
}

/// Key/value store holding at most one current snapshot per aggregate.
#[async_trait]
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Saves a snapshot, replacing the aggregate's previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on transient storage failure or
    /// [`StoreError::Validation`] for malformed records.
    async fn save(&self, snapshot: SnapshotRecord) -> Result<(), StoreError>;

    /// Loads the aggregate's current snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on transient storage failure.
    async fn load_latest(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
    ) -> Result<Option<SnapshotRecord>, StoreError>;
}
