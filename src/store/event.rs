//! Event record envelopes for the append-only log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ClockEvent, TenantId, TournamentId};

/// Aggregate type discriminator for tournament clock streams.
pub const AGGREGATE_TYPE: &str = "tournament_clock";

/// Metadata attached to every persisted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Already-authorized actor that issued the command, if any.
    pub actor_id: Option<String>,
    /// Correlates all events appended by one command.
    pub correlation_id: Uuid,
    /// The event that caused this one, for multi-event commands.
    pub causation_id: Option<Uuid>,
    /// When the command was processed.
    pub timestamp: DateTime<Utc>,
}

impl EventMetadata {
    /// Creates metadata for a new command.
    #[must_use]
    pub const fn new(correlation_id: Uuid, timestamp: DateTime<Utc>) -> Self {
        Self {
            actor_id: None,
            correlation_id,
            causation_id: None,
            timestamp,
        }
    }

    /// Sets the actor that issued the command.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor_id = Some(actor.into());
        self
    }

    /// Sets the causing event.
    #[must_use]
    pub const fn with_causation(mut self, cause: Uuid) -> Self {
        self.causation_id = Some(cause);
        self
    }
}

/// An event that has not been appended yet: everything but the fields the
/// store assigns (id, version, `recorded_at`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    /// Tenant owning the stream.
    pub tenant_id: TenantId,
    /// Aggregate the event belongs to.
    pub tournament_id: TournamentId,
    /// Aggregate type discriminator.
    pub aggregate_type: String,
    /// Event type discriminator (e.g. `"clock_started"`).
    pub event_type: String,
    /// Self-describing JSON payload.
    pub payload: serde_json::Value,
    /// Command metadata.
    pub metadata: EventMetadata,
}

impl NewEvent {
    /// Builds the envelope for a typed clock event.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the payload cannot be serialized.
    pub fn from_clock_event(
        tenant_id: TenantId,
        tournament_id: TournamentId,
        event: &ClockEvent,
        metadata: EventMetadata,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tenant_id,
            tournament_id,
            aggregate_type: AGGREGATE_TYPE.to_string(),
            event_type: event.event_type_str().to_string(),
            payload: serde_json::to_value(event)?,
            metadata,
        })
    }
}

/// An immutable, versioned fact as stored in the log.
///
/// For a fixed `(tenant_id, tournament_id)` pair, versions form a gapless
/// sequence starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Store-assigned unique event identifier.
    pub id: Uuid,
    /// Tenant owning the stream.
    pub tenant_id: TenantId,
    /// Aggregate the event belongs to.
    pub tournament_id: TournamentId,
    /// Aggregate type discriminator.
    pub aggregate_type: String,
    /// Event type discriminator.
    pub event_type: String,
    /// Position in the aggregate's stream, starting at 1.
    pub version: u64,
    /// Self-describing JSON payload.
    pub payload: serde_json::Value,
    /// Command metadata.
    pub metadata: EventMetadata,
    /// Store-side insertion timestamp. Never read by the projection fold.
    pub recorded_at: DateTime<Utc>,
}
