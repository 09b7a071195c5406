//! Outbound notifications delivered to observers.
//!
//! Every successful mutation publishes one or more [`ClockNotification`]s
//! through the [`super::ClockNotifier`]. The Broadcast Gateway subscribes
//! and forwards them over its own transport; the serde tags use the dotted
//! wire names that gateway clients filter on.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::clock::ClockState;
use super::ids::{ClientId, TournamentId};
use super::level::Level;
use crate::sync::DriftSeverity;

/// Typed outbound notification, the transport-facing twin of the
/// persisted event catalogue.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "notification_type")]
pub enum ClockNotification {
    /// The clock was initialized.
    #[serde(rename = "clock.initialized")]
    Initialized {
        /// Full state after the command.
        state: ClockState,
    },

    /// The clock started counting.
    #[serde(rename = "clock.started")]
    Started {
        /// Full state after the command.
        state: ClockState,
    },

    /// The clock was paused.
    #[serde(rename = "clock.paused")]
    Paused {
        /// Full state after the command.
        state: ClockState,
    },

    /// The clock resumed.
    #[serde(rename = "clock.resumed")]
    Resumed {
        /// Full state after the command.
        state: ClockState,
    },

    /// The clock reached its terminal completed state.
    #[serde(rename = "clock.completed")]
    Completed {
        /// Full state after the command.
        state: ClockState,
    },

    /// The clock moved to a different level.
    #[serde(rename = "clock.levelChanged")]
    LevelChanged {
        /// Affected tournament.
        tournament_id: TournamentId,
        /// Level before the change.
        previous_level: Level,
        /// Level now counting.
        new_level: Level,
        /// Why the level changed.
        reason: String,
        /// Whether the engine advanced on its own.
        auto_advanced: bool,
    },

    /// A break level began counting.
    #[serde(rename = "clock.breakStarted")]
    BreakStarted {
        /// Affected tournament.
        tournament_id: TournamentId,
        /// The break level.
        level: Level,
        /// Break length in seconds.
        duration_seconds: u32,
        /// Instant the break is scheduled to end.
        scheduled_end: DateTime<Utc>,
    },

    /// Periodic countdown tick. Rate limiting is the gateway's concern.
    #[serde(rename = "clock.tick")]
    Tick {
        /// Affected tournament.
        tournament_id: TournamentId,
        /// Elapsed running time of the current level in milliseconds.
        elapsed_ms: i64,
        /// Remaining time of the current level in milliseconds.
        remaining_ms: i64,
    },

    /// Periodic full-state broadcast so late joiners and silently-drifted
    /// observers self-correct without asking.
    #[serde(rename = "clock.sync")]
    Sync {
        /// Full current state.
        state: ClockState,
    },

    /// A client breached the drift threshold; targeted at that one client
    /// (the gateway filters on `client_id`).
    #[serde(rename = "clock.driftDetected")]
    DriftDetected {
        /// Affected tournament.
        tournament_id: TournamentId,
        /// Drifting client.
        client_id: ClientId,
        /// Measured drift in milliseconds.
        drift_ms: i64,
        /// Severity by magnitude.
        severity: DriftSeverity,
        /// Correction the client should apply.
        correction_ms: i64,
    },

    /// A configured warning threshold was reached.
    #[serde(rename = "clock.warning")]
    Warning {
        /// Affected tournament.
        tournament_id: TournamentId,
        /// Minutes remaining in the current level.
        minutes_remaining: u32,
        /// Human-readable warning message.
        message: String,
    },

    /// An internal failure occurred; the clock keeps running on its last
    /// valid state.
    #[serde(rename = "clock.error")]
    Error {
        /// Error taxonomy kind.
        kind: String,
        /// Failure description.
        message: String,
        /// Last-known-good state.
        state: ClockState,
    },

    /// Tournament counters were updated.
    #[serde(rename = "clock.statisticsUpdated")]
    StatisticsUpdated {
        /// Full state after the update.
        state: ClockState,
    },
}

impl ClockNotification {
    /// Returns the tournament this notification concerns.
    #[must_use]
    pub fn tournament_id(&self) -> TournamentId {
        match self {
            Self::Initialized { state }
            | Self::Started { state }
            | Self::Paused { state }
            | Self::Resumed { state }
            | Self::Completed { state }
            | Self::Sync { state }
            | Self::Error { state, .. }
            | Self::StatisticsUpdated { state } => state.tournament_id,
            Self::LevelChanged { tournament_id, .. }
            | Self::BreakStarted { tournament_id, .. }
            | Self::Tick { tournament_id, .. }
            | Self::DriftDetected { tournament_id, .. }
            | Self::Warning { tournament_id, .. } => *tournament_id,
        }
    }

    /// Returns the wire name as a static string slice.
    #[must_use]
    pub const fn notification_type_str(&self) -> &'static str {
        match self {
            Self::Initialized { .. } => "clock.initialized",
            Self::Started { .. } => "clock.started",
            Self::Paused { .. } => "clock.paused",
            Self::Resumed { .. } => "clock.resumed",
            Self::Completed { .. } => "clock.completed",
            Self::LevelChanged { .. } => "clock.levelChanged",
            Self::BreakStarted { .. } => "clock.breakStarted",
            Self::Tick { .. } => "clock.tick",
            Self::Sync { .. } => "clock.sync",
            Self::DriftDetected { .. } => "clock.driftDetected",
            Self::Warning { .. } => "clock.warning",
            Self::Error { .. } => "clock.error",
            Self::StatisticsUpdated { .. } => "clock.statisticsUpdated",
        }
    }
}
