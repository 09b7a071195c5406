//! Persisted clock event catalogue.
//!
//! Every state transition is recorded as one of these immutable facts in
//! the event log. The enum is internally tagged with `event_type`, so a
//! serialized payload is self-describing and can be folded back into
//! [`super::ClockState`] by [`crate::projection`] without consulting the
//! record envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::clock::{ClockSettings, ClockStatistics, ClockStatus};
use super::ids::ClientId;
use super::level::LevelSchedule;
use crate::sync::DriftSeverity;

/// Position of the clock within the schedule at one instant, recorded on
/// manual adjustments so the previous position survives in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelPosition {
    /// Level index at this position.
    pub level_index: usize,
    /// Remaining time of that level in milliseconds.
    pub time_remaining_ms: i64,
    /// Clock status at this position.
    pub status: ClockStatus,
}

/// Immutable fact describing one clock state transition.
///
/// All instants are taken from the engine's injected time source at the
/// moment the command was processed; the projection fold reads them back
/// from the payload, which is what makes replay deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ClockEvent {
    /// The aggregate was created (or re-created from `Error`) with a
    /// validated schedule and settings.
    ClockInitialized {
        /// The validated level schedule.
        schedule: LevelSchedule,
        /// Per-tournament settings.
        settings: ClockSettings,
        /// When the clock was initialized.
        initialized_at: DateTime<Utc>,
    },

    /// The clock started counting from idle or paused.
    ClockStarted {
        /// Index of the level that started counting.
        level_index: usize,
        /// Derived start instant (`started_at − accumulated_pause_ms`).
        level_start: DateTime<Utc>,
        /// Statistics supplied with the start command, if any.
        statistics: Option<ClockStatistics>,
        /// When the command was processed.
        started_at: DateTime<Utc>,
    },

    /// The countdown was frozen.
    ClockPaused {
        /// Elapsed running time frozen at the pause, in milliseconds.
        accumulated_pause_ms: i64,
        /// Operator-supplied reason.
        reason: String,
        /// Optional free-form notes.
        notes: Option<String>,
        /// When the clock was paused.
        paused_at: DateTime<Utc>,
    },

    /// The countdown resumed from a pause.
    ClockResumed {
        /// Re-derived start instant (`resumed_at − accumulated_pause_ms`).
        level_start: DateTime<Utc>,
        /// How long the clock was paused, in milliseconds.
        pause_duration_ms: i64,
        /// Optional free-form notes.
        notes: Option<String>,
        /// When the clock resumed.
        resumed_at: DateTime<Utc>,
    },

    /// The clock moved to the next level in the schedule.
    LevelAdvanced {
        /// Index of the level that just ended.
        previous_index: usize,
        /// Index of the level now counting.
        new_index: usize,
        /// Whether the engine advanced on its own at the level boundary.
        auto_advanced: bool,
        /// Start instant of the new level.
        level_start: DateTime<Utc>,
        /// When the advance was processed.
        advanced_at: DateTime<Utc>,
    },

    /// A break level began counting. Always follows a `LevelAdvanced`
    /// into a break level.
    BreakStarted {
        /// Index of the break level.
        level_index: usize,
        /// Break length in seconds.
        duration_seconds: u32,
        /// Instant the break is scheduled to end.
        scheduled_end: DateTime<Utc>,
        /// When the break started.
        started_at: DateTime<Utc>,
    },

    /// An operator moved the clock to an arbitrary level.
    ClockManuallyAdjusted {
        /// Position before the adjustment.
        previous: LevelPosition,
        /// Position after the adjustment.
        new: LevelPosition,
        /// Operator-supplied reason.
        reason: String,
        /// Start instant of the target level.
        level_start: DateTime<Utc>,
        /// When the adjustment was processed.
        adjusted_at: DateTime<Utc>,
    },

    /// The clock reached its terminal completed state.
    ClockCompleted {
        /// When the clock completed.
        completed_at: DateTime<Utc>,
    },

    /// Tournament counters were updated; carries the merged result so the
    /// fold never needs the previous value.
    StatisticsUpdated {
        /// Full statistics after the merge.
        statistics: ClockStatistics,
        /// When the update was processed.
        updated_at: DateTime<Utc>,
    },

    /// Audit record of one time-sync exchange.
    TimeSyncRequested {
        /// Requesting client.
        client_id: ClientId,
        /// Client-supplied request identifier.
        request_id: Uuid,
        /// Instant the client claimed it was.
        client_reported: DateTime<Utc>,
        /// Server time at processing.
        server_instant: DateTime<Utc>,
        /// Measured drift (`client − server`) in milliseconds.
        drift_ms: i64,
        /// Correction issued; zero below the threshold.
        correction_ms: i64,
    },

    /// A client breached the drift correction threshold.
    DriftDetected {
        /// Drifting client.
        client_id: ClientId,
        /// Measured drift in milliseconds.
        drift_ms: i64,
        /// Severity by magnitude.
        severity: DriftSeverity,
        /// Correction issued to the client.
        correction_ms: i64,
        /// When the breach was detected.
        detected_at: DateTime<Utc>,
    },

    /// A configured warning threshold was reached.
    ClockWarningIssued {
        /// Minutes remaining in the current level.
        minutes_remaining: u32,
        /// Human-readable warning message.
        message: String,
        /// When the warning fired.
        issued_at: DateTime<Utc>,
    },

    /// An internal failure was recorded.
    ///
    /// Non-fatal occurrences (a failed scheduler pass) leave the clock in
    /// its last valid state; fatal ones move it to `Error`.
    ClockErrorOccurred {
        /// Error taxonomy kind.
        kind: String,
        /// Failure description.
        message: String,
        /// Whether the clock must be re-initialized.
        fatal: bool,
        /// When the failure occurred.
        occurred_at: DateTime<Utc>,
    },
}

impl ClockEvent {
    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ClockInitialized { .. } => "clock_initialized",
            Self::ClockStarted { .. } => "clock_started",
            Self::ClockPaused { .. } => "clock_paused",
            Self::ClockResumed { .. } => "clock_resumed",
            Self::LevelAdvanced { .. } => "level_advanced",
            Self::BreakStarted { .. } => "break_started",
            Self::ClockManuallyAdjusted { .. } => "clock_manually_adjusted",
            Self::ClockCompleted { .. } => "clock_completed",
            Self::StatisticsUpdated { .. } => "statistics_updated",
            Self::TimeSyncRequested { .. } => "time_sync_requested",
            Self::DriftDetected { .. } => "drift_detected",
            Self::ClockWarningIssued { .. } => "clock_warning_issued",
            Self::ClockErrorOccurred { .. } => "clock_error_occurred",
        }
    }

    /// Returns the instant the fact occurred at.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::ClockInitialized { initialized_at, .. } => *initialized_at,
            Self::ClockStarted { started_at, .. } | Self::BreakStarted { started_at, .. } => {
                *started_at
            }
            Self::ClockPaused { paused_at, .. } => *paused_at,
            Self::ClockResumed { resumed_at, .. } => *resumed_at,
            Self::LevelAdvanced { advanced_at, .. } => *advanced_at,
            Self::ClockManuallyAdjusted { adjusted_at, .. } => *adjusted_at,
            Self::ClockCompleted { completed_at } => *completed_at,
            Self::StatisticsUpdated { updated_at, .. } => *updated_at,
            Self::TimeSyncRequested { server_instant, .. } => *server_instant,
            Self::DriftDetected { detected_at, .. } => *detected_at,
            Self::ClockWarningIssued { issued_at, .. } => *issued_at,
            Self::ClockErrorOccurred { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn instant() -> DateTime<Utc> {
        let Some(instant) = DateTime::from_timestamp(1_750_000_000, 0) else {
            panic!("valid timestamp");
        };
        instant
    }

    #[test]
    fn event_type_matches_serde_tag() {
        let event = ClockEvent::ClockCompleted {
            completed_at: instant(),
        };
        let json = serde_json::to_string(&event).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        assert!(json.contains("\"event_type\":\"clock_completed\""));
        assert_eq!(event.event_type_str(), "clock_completed");
    }

    #[test]
    fn payload_round_trips() {
        let event = ClockEvent::DriftDetected {
            client_id: ClientId::new("ws-1"),
            drift_ms: 6_200,
            severity: crate::sync::DriftSeverity::High,
            correction_ms: -6_200,
            detected_at: instant(),
        };
        let Ok(value) = serde_json::to_value(&event) else {
            panic!("serialization failed");
        };
        let Ok(decoded) = serde_json::from_value::<ClockEvent>(value) else {
            panic!("deserialization failed");
        };
        assert_eq!(decoded, event);
    }

    #[test]
    fn occurred_at_reads_payload_instant() {
        let event = ClockEvent::ClockWarningIssued {
            minutes_remaining: 5,
            message: "5 minutes remaining".to_string(),
            issued_at: instant(),
        };
        assert_eq!(event.occurred_at(), instant());
    }

    #[test]
    fn unknown_event_type_fails_decode() {
        let value = serde_json::json!({ "event_type": "clock_teleported", "at": "2026-01-01T00:00:00Z" });
        assert!(serde_json::from_value::<ClockEvent>(value).is_err());
    }
}
