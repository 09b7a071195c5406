//! Snapshot record envelope for the key/value snapshot store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::AGGREGATE_TYPE;
use crate::domain::{ClockState, TenantId, TournamentId};

/// Materialized aggregate state at a version.
///
/// At most one current snapshot exists per aggregate, and its version is
/// never greater than the latest event version. Snapshots only bound
/// replay cost; correctness never depends on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Tenant owning the stream.
    pub tenant_id: TenantId,
    /// Aggregate the snapshot belongs to.
    pub tournament_id: TournamentId,
    /// Aggregate type discriminator.
    pub aggregate_type: String,
    /// Event version the state was captured at.
    pub version: u64,
    /// Full aggregate state as JSON.
    pub state: serde_json::Value,
    /// When the snapshot was captured.
    pub captured_at: DateTime<Utc>,
}

impl SnapshotRecord {
    /// Captures a snapshot of the given clock state.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the state cannot be serialized.
    pub fn from_state(
        state: &ClockState,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tenant_id: state.tenant_id.clone(),
            tournament_id: state.tournament_id,
            aggregate_type: AGGREGATE_TYPE.to_string(),
            version: state.version,
            state: serde_json::to_value(state)?,
            captured_at,
        })
    }
}
