//! Pure projection fold: `(state, event) -> state`.
//!
//! The same fold is used for live mutation after a successful append, for
//! crash recovery, and for historical read-only queries, so all three
//! produce identical state for the same event sequence. The fold never
//! consults the wall clock; every instant comes from the event payload.
//!
//! [`apply_record`] is total: payloads that do not decode into a known
//! [`ClockEvent`] pass state through unchanged except for the version,
//! which always becomes the record's version. That keeps replay working
//! across catalogue additions.

use crate::domain::{ClockEvent, ClockState, ClockStatus, TenantId, TournamentId};
use crate::error::ClockError;
use crate::store::{EventRecord, EventStore, SnapshotStore};

/// Status implied by the level at `index`: `Break` on break levels,
/// `Running` otherwise.
fn status_for_level(state: &ClockState, index: usize) -> ClockStatus {
    if state.schedule.get(index).is_some_and(|level| level.is_break) {
        ClockStatus::Break
    } else {
        ClockStatus::Running
    }
}

/// Folds one typed event into the state. Pure and total.
#[must_use]
pub fn apply(mut state: ClockState, event: &ClockEvent) -> ClockState {
    match event {
        ClockEvent::ClockInitialized {
            schedule, settings, ..
        } => {
            state.schedule = schedule.clone();
            state.settings = settings.clone();
            state.status = ClockStatus::Idle;
            state.current_level_index = 0;
            state.level_start = None;
            state.paused_at = None;
            state.accumulated_pause_ms = 0;
            state.total_pause_ms_this_level = 0;
            state.last_sync = None;
            state.statistics = Default::default();
        }
        ClockEvent::ClockStarted {
            level_index,
            level_start,
            statistics,
            ..
        } => {
            state.current_level_index = *level_index;
            state.status = status_for_level(&state, *level_index);
            state.level_start = Some(*level_start);
            state.paused_at = None;
            state.accumulated_pause_ms = 0;
            if let Some(statistics) = statistics {
                state.statistics = statistics.clone();
            }
        }
        ClockEvent::ClockPaused {
            accumulated_pause_ms,
            paused_at,
            ..
        } => {
            state.status = ClockStatus::Paused;
            state.accumulated_pause_ms = *accumulated_pause_ms;
            state.paused_at = Some(*paused_at);
        }
        ClockEvent::ClockResumed {
            level_start,
            pause_duration_ms,
            ..
        } => {
            state.status = status_for_level(&state, state.current_level_index);
            state.level_start = Some(*level_start);
            state.paused_at = None;
            state.accumulated_pause_ms = 0;
            state.total_pause_ms_this_level = state
                .total_pause_ms_this_level
                .saturating_add(*pause_duration_ms);
        }
        ClockEvent::LevelAdvanced {
            new_index,
            level_start,
            ..
        } => {
            state.current_level_index = *new_index;
            state.status = status_for_level(&state, *new_index);
            state.level_start = Some(*level_start);
            state.paused_at = None;
            state.accumulated_pause_ms = 0;
            state.total_pause_ms_this_level = 0;
        }
        ClockEvent::ClockManuallyAdjusted {
            new, level_start, ..
        } => {
            state.current_level_index = new.level_index;
            state.status = new.status;
            state.level_start = Some(*level_start);
            state.paused_at = None;
            state.accumulated_pause_ms = 0;
            state.total_pause_ms_this_level = 0;
        }
        ClockEvent::ClockCompleted { .. } => {
            state.status = ClockStatus::Completed;
        }
        ClockEvent::StatisticsUpdated { statistics, .. } => {
            state.statistics = statistics.clone();
        }
        ClockEvent::TimeSyncRequested { server_instant, .. } => {
            state.last_sync = Some(*server_instant);
        }
        ClockEvent::ClockErrorOccurred { fatal, .. } => {
            if *fatal {
                state.status = ClockStatus::Error;
            }
        }
        // Facts with no state effect beyond the audit trail.
        ClockEvent::BreakStarted { .. }
        | ClockEvent::DriftDetected { .. }
        | ClockEvent::ClockWarningIssued { .. } => {}
    }
    state
}

/// Folds one stored record into the state, decoding its payload.
///
/// Unknown or undecodable payloads pass state through unchanged; the
/// version always becomes the record's version.
#[must_use]
pub fn apply_record(state: ClockState, record: &EventRecord) -> ClockState {
    let mut next = match serde_json::from_value::<ClockEvent>(record.payload.clone()) {
        Ok(event) => apply(state, &event),
        Err(_) => state,
    };
    next.version = record.version;
    next
}

/// Rebuilds current state from the latest snapshot plus the event tail.
///
/// Loads the aggregate's snapshot (if any), reads events with
/// `version > snapshot.version`, and folds them sequentially. Used
/// identically for crash recovery and historical queries.
///
/// # Errors
///
/// Returns [`ClockError::CorruptRecord`] if a snapshot's state cannot be
/// decoded, or a store-mapped error if the log is unreachable.
pub async fn project(
    events: &dyn EventStore,
    snapshots: &dyn SnapshotStore,
    tenant_id: &TenantId,
    tournament_id: TournamentId,
    initial: ClockState,
) -> Result<ClockState, ClockError> {
    let snapshot = snapshots.load_latest(tenant_id, tournament_id).await?;

    let (mut state, from_version) = match snapshot {
        Some(snapshot) => {
            let state = serde_json::from_value::<ClockState>(snapshot.state)
                .map_err(|e| ClockError::CorruptRecord(format!("snapshot decode: {e}")))?;
            (state, snapshot.version)
        }
        None => (initial, 0),
    };

    let tail = events.read(tenant_id, tournament_id, from_version).await?;
    for record in &tail {
        state = apply_record(state, record);
    }
    Ok(state)
}
