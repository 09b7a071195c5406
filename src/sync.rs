//! Time synchronization protocol: drift measurement, correction rule,
//! severity classification, and ephemeral client-connection tracking.
//!
//! Drift is measured as `client_reported − server_instant`. A correction
//! of exactly `−drift` is issued only when the magnitude exceeds the
//! per-tournament threshold; smaller drift is ignored so observers do not
//! see their displays jitter on every exchange.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{ClientId, TournamentId};

/// Drift above this magnitude is classified [`DriftSeverity::High`].
pub const HIGH_DRIFT_MS: i64 = 5_000;

/// Severity of a detected drift threshold breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftSeverity {
    /// Above the correction threshold, at most [`HIGH_DRIFT_MS`].
    Medium,
    /// Above [`HIGH_DRIFT_MS`].
    High,
}

/// Measures client drift against server time in milliseconds.
///
/// Positive drift means the client clock is ahead of the server.
#[must_use]
pub fn drift_ms(client_reported: DateTime<Utc>, server_instant: DateTime<Utc>) -> i64 {
    (client_reported - server_instant).num_milliseconds()
}

/// Applies the correction rule: `−drift` above the threshold, else zero.
#[must_use]
pub fn correction_ms(drift_ms: i64, threshold_ms: i64) -> i64 {
    if drift_ms.abs() > threshold_ms {
        drift_ms.saturating_neg()
    } else {
        0
    }
}

/// Classifies a threshold-breaching drift by magnitude.
#[must_use]
pub fn classify(drift_ms: i64) -> DriftSeverity {
    if drift_ms.abs() > HIGH_DRIFT_MS {
        DriftSeverity::High
    } else {
        DriftSeverity::Medium
    }
}

/// Result of one time-sync exchange, returned to the requesting client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Echo of the client's request identifier.
    pub request_id: Uuid,
    /// Server time at the moment the request was processed.
    pub server_instant: DateTime<Utc>,
    /// Measured drift (`client − server`) in milliseconds.
    pub drift_ms: i64,
    /// Correction the client should apply; zero below the threshold.
    pub correction_ms: i64,
}

/// Ephemeral record of one connected observer. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ClientConnection {
    /// Transport-assigned client identifier.
    pub client_id: ClientId,
    /// When the connection was registered.
    pub connected_at: DateTime<Utc>,
    /// Server instant of the client's last sync exchange.
    pub last_sync: Option<DateTime<Utc>>,
    /// Drift measured at the last sync exchange.
    pub observed_drift_ms: i64,
    /// Whether this client may issue control commands.
    pub is_controller: bool,
}

/// Per-tournament registry of connected observers.
///
/// Created on connect, destroyed on disconnect; cleared wholesale when a
/// tournament completes. Purely in-memory.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    clients: RwLock<HashMap<TournamentId, HashMap<ClientId, ClientConnection>>>,
}

impl ConnectionTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly connected client for a tournament.
    pub async fn register(
        &self,
        tournament_id: TournamentId,
        client_id: ClientId,
        connected_at: DateTime<Utc>,
        is_controller: bool,
    ) {
        let mut map = self.clients.write().await;
        map.entry(tournament_id).or_default().insert(
            client_id.clone(),
            ClientConnection {
                client_id,
                connected_at,
                last_sync: None,
                observed_drift_ms: 0,
                is_controller,
            },
        );
    }

    /// Drops a client on disconnect. Returns `true` if it was tracked.
    pub async fn disconnect(&self, tournament_id: TournamentId, client_id: &ClientId) -> bool {
        let mut map = self.clients.write().await;
        let Some(clients) = map.get_mut(&tournament_id) else {
            return false;
        };
        let removed = clients.remove(client_id).is_some();
        if clients.is_empty() {
            map.remove(&tournament_id);
        }
        removed
    }

    /// Records the outcome of a sync exchange for a tracked client.
    pub async fn record_sync(
        &self,
        tournament_id: TournamentId,
        client_id: &ClientId,
        at: DateTime<Utc>,
        observed_drift_ms: i64,
    ) {
        let mut map = self.clients.write().await;
        if let Some(connection) = map
            .get_mut(&tournament_id)
            .and_then(|clients| clients.get_mut(client_id))
        {
            connection.last_sync = Some(at);
            connection.observed_drift_ms = observed_drift_ms;
        }
    }

    /// Returns a snapshot of all connections for a tournament.
    pub async fn connections(&self, tournament_id: TournamentId) -> Vec<ClientConnection> {
        let map = self.clients.read().await;
        map.get(&tournament_id)
            .map(|clients| clients.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of tracked clients for a tournament.
    pub async fn count(&self, tournament_id: TournamentId) -> usize {
        let map = self.clients.read().await;
        map.get(&tournament_id).map_or(0, HashMap::len)
    }

    /// Drops all connections for a tournament (on completion/shutdown).
    pub async fn clear(&self, tournament_id: TournamentId) {
        self.clients.write().await.remove(&tournament_id);
    }
}
