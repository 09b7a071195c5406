//! Per-tournament clock state machine.
//!
//! [`TournamentClock`] owns the aggregate state and derives persisted
//! events from commands: each command method validates the transition
//! against the current status and returns the facts to append, without
//! mutating anything. State only changes through [`TournamentClock::apply`],
//! which folds a successfully appended record through the same projection
//! used for replay, so memory and log can never diverge on failure.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{
    ClientId, ClockEvent, ClockSettings, ClockState, ClockStatistics, ClockStatus, LevelPosition,
    LevelSchedule, StatisticsUpdate,
};
use crate::error::ClockError;
use crate::projection;
use crate::store::EventRecord;
use crate::sync::{self, SyncResponse};

/// State machine for one tournament's clock.
#[derive(Debug)]
pub struct TournamentClock {
    state: ClockState,
}

impl TournamentClock {
    /// Wraps an aggregate state (blank or recovered).
    #[must_use]
    pub const fn new(state: ClockState) -> Self {
        Self { state }
    }

    /// Returns the current aggregate state.
    #[must_use]
    pub const fn state(&self) -> &ClockState {
        &self.state
    }

    /// Folds a successfully appended record into the state.
    pub fn apply(&mut self, record: &EventRecord) {
        self.state = projection::apply_record(self.state.clone(), record);
    }

    fn ensure(&self, command: &'static str, legal: &[ClockStatus]) -> Result<(), ClockError> {
        if legal.contains(&self.state.status) {
            Ok(())
        } else {
            Err(ClockError::InvalidTransition {
                status: self.state.status,
                command,
            })
        }
    }

    fn ensure_not_terminal(&self, command: &'static str) -> Result<(), ClockError> {
        if self.state.status.is_terminal() {
            Err(ClockError::InvalidTransition {
                status: self.state.status,
                command,
            })
        } else {
            Ok(())
        }
    }

    fn current_level_duration_ms(&self) -> Result<i64, ClockError> {
        self.state
            .current_level()
            .map(crate::domain::Level::duration_ms)
            .ok_or_else(|| ClockError::Internal("current level outside schedule".to_string()))
    }

    /// Status implied by the level at `index`.
    fn status_for(&self, index: usize) -> ClockStatus {
        if self
            .state
            .schedule
            .get(index)
            .is_some_and(|level| level.is_break)
        {
            ClockStatus::Break
        } else {
            ClockStatus::Running
        }
    }

    /// Index of the next level to play, skipping break levels when breaks
    /// are disabled. `None` means the schedule is exhausted.
    fn next_level_index(&self) -> Option<usize> {
        let mut index = self.state.current_level_index.saturating_add(1);
        while let Some(level) = self.state.schedule.get(index) {
            if level.is_break && !self.state.settings.breaks_enabled {
                index = index.saturating_add(1);
                continue;
            }
            return Some(index);
        }
        None
    }

    /// Derives the initialization fact.
    ///
    /// Legal from `Idle` (a fresh aggregate) and from `Error`, the
    /// documented re-initialization path.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::AlreadyInitialized`] from any other status.
    pub fn initialize(
        &self,
        schedule: &LevelSchedule,
        settings: &ClockSettings,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClockEvent>, ClockError> {
        if !matches!(self.state.status, ClockStatus::Idle | ClockStatus::Error) {
            return Err(ClockError::AlreadyInitialized(self.state.tournament_id));
        }
        Ok(vec![ClockEvent::ClockInitialized {
            schedule: schedule.clone(),
            settings: settings.clone(),
            initialized_at: now,
        }])
    }

    /// Derives the start fact from idle or paused.
    ///
    /// The level start instant is back-dated by the frozen pause
    /// accumulator, so elapsed time continues where it left off.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] outside idle/paused.
    pub fn start(
        &self,
        now: DateTime<Utc>,
        statistics: Option<ClockStatistics>,
    ) -> Result<Vec<ClockEvent>, ClockError> {
        self.ensure("start", &[ClockStatus::Idle, ClockStatus::Paused])?;
        if self.state.schedule.is_empty() {
            return Err(ClockError::InvalidSchedule(
                "clock has no schedule; initialize first".to_string(),
            ));
        }
        let level_start = now - Duration::milliseconds(self.state.accumulated_pause_ms);
        Ok(vec![ClockEvent::ClockStarted {
            level_index: self.state.current_level_index,
            level_start,
            statistics,
            started_at: now,
        }])
    }

    /// Derives the pause fact, freezing elapsed time into the accumulator.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] unless running or on
    /// break.
    pub fn pause(
        &self,
        now: DateTime<Utc>,
        reason: &str,
        notes: Option<String>,
    ) -> Result<Vec<ClockEvent>, ClockError> {
        self.ensure("pause", &[ClockStatus::Running, ClockStatus::Break])?;
        let level_start = self
            .state
            .level_start
            .ok_or_else(|| ClockError::Internal("counting without a level start".to_string()))?;
        Ok(vec![ClockEvent::ClockPaused {
            accumulated_pause_ms: (now - level_start).num_milliseconds().max(0),
            reason: reason.to_string(),
            notes,
            paused_at: now,
        }])
    }

    /// Derives the resume fact, symmetric to [`TournamentClock::start`].
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] unless paused.
    pub fn resume(
        &self,
        now: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Vec<ClockEvent>, ClockError> {
        self.ensure("resume", &[ClockStatus::Paused])?;
        let level_start = now - Duration::milliseconds(self.state.accumulated_pause_ms);
        let pause_duration_ms = self
            .state
            .paused_at
            .map_or(0, |paused_at| (now - paused_at).num_milliseconds().max(0));
        Ok(vec![ClockEvent::ClockResumed {
            level_start,
            pause_duration_ms,
            notes,
            resumed_at: now,
        }])
    }

    /// Derives the advance facts: a `LevelAdvanced` plus, when the new
    /// level is a break, a `BreakStarted` with the scheduled end. At the
    /// end of the schedule this behaves as [`TournamentClock::complete`].
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] unless running or on
    /// break.
    pub fn advance(
        &self,
        now: DateTime<Utc>,
        auto_advanced: bool,
    ) -> Result<Vec<ClockEvent>, ClockError> {
        self.ensure("advance_level", &[ClockStatus::Running, ClockStatus::Break])?;

        let Some(new_index) = self.next_level_index() else {
            return Ok(vec![ClockEvent::ClockCompleted { completed_at: now }]);
        };

        let mut events = vec![ClockEvent::LevelAdvanced {
            previous_index: self.state.current_level_index,
            new_index,
            auto_advanced,
            level_start: now,
            advanced_at: now,
        }];
        if let Some(level) = self.state.schedule.get(new_index)
            && level.is_break
        {
            events.push(ClockEvent::BreakStarted {
                level_index: new_index,
                duration_seconds: level.duration_seconds,
                scheduled_end: now + Duration::seconds(i64::from(level.duration_seconds)),
                started_at: now,
            });
        }
        Ok(events)
    }

    /// Derives the manual-adjustment fact for a jump to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::LevelOutOfRange`] for an index outside the
    /// schedule and [`ClockError::InvalidTransition`] from terminal
    /// states.
    pub fn goto_level(
        &self,
        now: DateTime<Utc>,
        target: usize,
        reason: &str,
    ) -> Result<Vec<ClockEvent>, ClockError> {
        self.ensure_not_terminal("goto_level")?;
        if self.state.schedule.get(target).is_none() {
            return Err(ClockError::LevelOutOfRange {
                requested: target,
                len: self.state.schedule.len(),
            });
        }
        let previous = LevelPosition {
            level_index: self.state.current_level_index,
            time_remaining_ms: self.state.remaining_ms(now),
            status: self.state.status,
        };
        let new = LevelPosition {
            level_index: target,
            time_remaining_ms: self
                .state
                .schedule
                .get(target)
                .map_or(0, crate::domain::Level::duration_ms),
            status: self.status_for(target),
        };
        Ok(vec![ClockEvent::ClockManuallyAdjusted {
            previous,
            new,
            reason: reason.to_string(),
            level_start: now,
            adjusted_at: now,
        }])
    }

    /// Derives the terminal completion fact.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] from terminal states.
    pub fn complete(&self, now: DateTime<Utc>) -> Result<Vec<ClockEvent>, ClockError> {
        self.ensure_not_terminal("complete")?;
        Ok(vec![ClockEvent::ClockCompleted { completed_at: now }])
    }

    /// Derives a statistics fact carrying the merged counters.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] from terminal states.
    pub fn update_statistics(
        &self,
        now: DateTime<Utc>,
        update: &StatisticsUpdate,
    ) -> Result<Vec<ClockEvent>, ClockError> {
        self.ensure_not_terminal("update_statistics")?;
        Ok(vec![ClockEvent::StatisticsUpdated {
            statistics: update.merged(&self.state.statistics),
            updated_at: now,
        }])
    }

    /// Processes one time-sync exchange: measures drift, applies the
    /// correction rule, and derives the audit facts (a `TimeSyncRequested`
    /// always, plus a `DriftDetected` on threshold breach).
    #[must_use]
    pub fn request_sync(
        &self,
        now: DateTime<Utc>,
        client_id: &ClientId,
        request_id: Uuid,
        client_reported: DateTime<Utc>,
    ) -> (SyncResponse, Vec<ClockEvent>) {
        let drift_ms = sync::drift_ms(client_reported, now);
        let correction_ms =
            sync::correction_ms(drift_ms, self.state.settings.drift_correction_threshold_ms);

        let mut events = vec![ClockEvent::TimeSyncRequested {
            client_id: client_id.clone(),
            request_id,
            client_reported,
            server_instant: now,
            drift_ms,
            correction_ms,
        }];
        if correction_ms != 0 {
            events.push(ClockEvent::DriftDetected {
                client_id: client_id.clone(),
                drift_ms,
                severity: sync::classify(drift_ms),
                correction_ms,
                detected_at: now,
            });
        }

        let response = SyncResponse {
            request_id,
            server_instant: now,
            drift_ms,
            correction_ms,
        };
        (response, events)
    }

    /// Returns `true` when the tick loop should advance the level: the
    /// clock is counting, auto-advance is on, and the level duration has
    /// fully elapsed.
    #[must_use]
    pub fn auto_advance_due(&self, now: DateTime<Utc>) -> bool {
        if !self.state.status.is_counting() || !self.state.settings.auto_advance {
            return false;
        }
        self.current_level_duration_ms()
            .is_ok_and(|duration| self.state.elapsed_ms(now) >= duration)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Level, TenantId, TournamentId};

    fn instant(secs: i64) -> DateTime<Utc> {
        let Some(instant) = DateTime::from_timestamp(1_750_000_000 + secs, 0) else {
            panic!("valid timestamp");
        };
        instant
    }

    fn schedule() -> LevelSchedule {
        let Ok(schedule) = LevelSchedule::new(vec![
            Level::playing(0, 5, 10, 0, 60),
            Level::break_level(1, 30, "Break"),
            Level::playing(2, 10, 20, 0, 60),
        ]) else {
            panic!("valid schedule");
        };
        schedule
    }

    fn clock_with(status: ClockStatus) -> TournamentClock {
        let mut state = ClockState::new(TournamentId::new(), TenantId::new("t1"));
        state.schedule = schedule();
        state.settings = ClockSettings::default();
        state.status = status;
        if status.is_counting() {
            state.level_start = Some(instant(0));
        }
        TournamentClock::new(state)
    }

    #[test]
    fn pause_on_idle_is_a_state_conflict() {
        let clock = clock_with(ClockStatus::Idle);
        let result = clock.pause(instant(10), "floor call", None);
        assert!(matches!(
            result,
            Err(ClockError::InvalidTransition { command: "pause", .. })
        ));
    }

    #[test]
    fn resume_on_running_is_a_state_conflict() {
        let clock = clock_with(ClockStatus::Running);
        let result = clock.resume(instant(10), None);
        assert!(matches!(
            result,
            Err(ClockError::InvalidTransition { command: "resume", .. })
        ));
    }

    #[test]
    fn start_on_completed_is_a_state_conflict() {
        let clock = clock_with(ClockStatus::Completed);
        let result = clock.start(instant(10), None);
        assert!(matches!(
            result,
            Err(ClockError::InvalidTransition { command: "start", .. })
        ));
    }

    #[test]
    fn pause_freezes_elapsed_into_accumulator() {
        let clock = clock_with(ClockStatus::Running);
        let Ok(events) = clock.pause(instant(25), "color-up", None) else {
            panic!("pause failed");
        };
        let Some(ClockEvent::ClockPaused {
            accumulated_pause_ms,
            ..
        }) = events.first()
        else {
            panic!("expected ClockPaused");
        };
        assert_eq!(*accumulated_pause_ms, 25_000);
    }

    #[test]
    fn start_backdates_level_start_by_accumulator() {
        let mut clock = clock_with(ClockStatus::Paused);
        clock.state.accumulated_pause_ms = 15_000;
        let Ok(events) = clock.start(instant(100), None) else {
            panic!("start failed");
        };
        let Some(ClockEvent::ClockStarted { level_start, .. }) = events.first() else {
            panic!("expected ClockStarted");
        };
        assert_eq!(
            *level_start,
            instant(100) - Duration::milliseconds(15_000)
        );
    }

    #[test]
    fn resume_measures_pause_duration() {
        let mut clock = clock_with(ClockStatus::Paused);
        clock.state.accumulated_pause_ms = 30_000;
        clock.state.paused_at = Some(instant(30));
        let Ok(events) = clock.resume(instant(90), None) else {
            panic!("resume failed");
        };
        let Some(ClockEvent::ClockResumed {
            pause_duration_ms,
            level_start,
            ..
        }) = events.first()
        else {
            panic!("expected ClockResumed");
        };
        assert_eq!(*pause_duration_ms, 60_000);
        assert_eq!(*level_start, instant(60));
    }

    #[test]
    fn advance_into_break_emits_break_started() {
        let clock = clock_with(ClockStatus::Running);
        let Ok(events) = clock.advance(instant(60), true) else {
            panic!("advance failed");
        };
        assert_eq!(events.len(), 2);
        let Some(ClockEvent::BreakStarted { scheduled_end, .. }) = events.get(1) else {
            panic!("expected BreakStarted");
        };
        assert_eq!(*scheduled_end, instant(90));
    }

    #[test]
    fn advance_past_last_level_completes() {
        let mut clock = clock_with(ClockStatus::Running);
        clock.state.current_level_index = 2;
        let Ok(events) = clock.advance(instant(200), false) else {
            panic!("advance failed");
        };
        assert!(matches!(
            events.first(),
            Some(ClockEvent::ClockCompleted { .. })
        ));
    }

    #[test]
    fn advance_skips_breaks_when_disabled() {
        let mut clock = clock_with(ClockStatus::Running);
        clock.state.settings.breaks_enabled = false;
        let Ok(events) = clock.advance(instant(60), true) else {
            panic!("advance failed");
        };
        assert_eq!(events.len(), 1);
        let Some(ClockEvent::LevelAdvanced { new_index, .. }) = events.first() else {
            panic!("expected LevelAdvanced");
        };
        assert_eq!(*new_index, 2);
    }

    #[test]
    fn goto_out_of_range_is_rejected() {
        let clock = clock_with(ClockStatus::Running);
        let result = clock.goto_level(instant(10), 5, "operator jump");
        assert!(matches!(
            result,
            Err(ClockError::LevelOutOfRange { requested: 5, len: 3 })
        ));
    }

    #[test]
    fn goto_records_previous_and_new_positions() {
        let mut clock = clock_with(ClockStatus::Running);
        clock.state.current_level_index = 2;
        let Ok(events) = clock.goto_level(instant(10), 0, "restart level") else {
            panic!("goto failed");
        };
        let Some(ClockEvent::ClockManuallyAdjusted { previous, new, .. }) = events.first() else {
            panic!("expected ClockManuallyAdjusted");
        };
        assert_eq!(previous.level_index, 2);
        assert_eq!(previous.time_remaining_ms, 50_000);
        assert_eq!(new.level_index, 0);
        assert_eq!(new.time_remaining_ms, 60_000);
        assert_eq!(new.status, ClockStatus::Running);
    }

    #[test]
    fn auto_advance_due_only_at_boundary() {
        let clock = clock_with(ClockStatus::Running);
        assert!(!clock.auto_advance_due(instant(59)));
        assert!(clock.auto_advance_due(instant(60)));
        assert!(clock.auto_advance_due(instant(61)));
    }

    #[test]
    fn auto_advance_respects_setting() {
        let mut clock = clock_with(ClockStatus::Running);
        clock.state.settings.auto_advance = false;
        assert!(!clock.auto_advance_due(instant(120)));
    }

    #[test]
    fn sync_below_threshold_returns_zero_correction() {
        let clock = clock_with(ClockStatus::Running);
        let client_reported = instant(10) + Duration::milliseconds(300);
        let (response, events) =
            clock.request_sync(instant(10), &ClientId::new("ws-1"), Uuid::new_v4(), client_reported);
        assert_eq!(response.drift_ms, 300);
        assert_eq!(response.correction_ms, 0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn sync_above_threshold_derives_drift_fact() {
        let clock = clock_with(ClockStatus::Running);
        let client_reported = instant(10) + Duration::milliseconds(6_000);
        let (response, events) =
            clock.request_sync(instant(10), &ClientId::new("ws-1"), Uuid::new_v4(), client_reported);
        assert_eq!(response.correction_ms, -6_000);
        let Some(ClockEvent::DriftDetected { severity, .. }) = events.get(1) else {
            panic!("expected DriftDetected");
        };
        assert_eq!(*severity, crate::sync::DriftSeverity::High);
    }

    #[test]
    fn initialize_is_rejected_while_running() {
        let clock = clock_with(ClockStatus::Running);
        let result = clock.initialize(&schedule(), &ClockSettings::default(), instant(0));
        assert!(matches!(result, Err(ClockError::AlreadyInitialized(_))));
    }

    #[test]
    fn initialize_is_accepted_from_error() {
        let clock = clock_with(ClockStatus::Error);
        let result = clock.initialize(&schedule(), &ClockSettings::default(), instant(0));
        assert!(result.is_ok());
    }
}
