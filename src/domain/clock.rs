//! Clock aggregate state, status machine, statistics, and settings.
//!
//! [`ClockState`] is the reconstructed/live aggregate: it is only ever
//! mutated by folding persisted events (see [`crate::projection`]), so the
//! same value is reached whether the clock is driven live or replayed from
//! the log after a restart. All timing fields are taken from event
//! payloads, never from the wall clock inside the fold.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{TenantId, TournamentId};
use super::level::{Level, LevelSchedule};

/// Lifecycle status of a tournament clock.
///
/// `Idle → Running ⇄ Paused`; `Running → Break → Running`;
/// `Running/Break → Completed` (terminal); any → `Error` (terminal,
/// requires re-initialization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockStatus {
    /// Initialized but never started, or freshly re-initialized.
    Idle,
    /// A playing level is counting down.
    Running,
    /// Countdown frozen by an operator.
    Paused,
    /// A break level is counting down.
    Break,
    /// The schedule has been exhausted or the clock was completed manually.
    Completed,
    /// An unrecoverable fault was recorded; only `initialize` is accepted.
    Error,
}

impl ClockStatus {
    /// Returns `true` if no further transitions are possible without
    /// re-initialization.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Returns `true` while a level countdown is live (running or break).
    #[must_use]
    pub const fn is_counting(self) -> bool {
        matches!(self, Self::Running | Self::Break)
    }
}

impl fmt::Display for ClockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Break => "break",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Live tournament counters carried alongside the clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockStatistics {
    /// Players still seated.
    pub players_remaining: u32,
    /// Average stack across remaining players.
    pub avg_stack: u64,
    /// Total chips in play.
    pub total_chips: u64,
    /// Eliminations so far.
    pub eliminations: u32,
    /// Rebuys so far.
    pub rebuys: u32,
    /// Add-ons so far.
    pub addons: u32,
}

/// Partial statistics update; only the set fields are merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsUpdate {
    /// New player count, if changed.
    pub players_remaining: Option<u32>,
    /// New average stack, if changed.
    pub avg_stack: Option<u64>,
    /// New total chips, if changed.
    pub total_chips: Option<u64>,
    /// New elimination count, if changed.
    pub eliminations: Option<u32>,
    /// New rebuy count, if changed.
    pub rebuys: Option<u32>,
    /// New add-on count, if changed.
    pub addons: Option<u32>,
}

impl StatisticsUpdate {
    /// Merges this partial update over a base, field by field.
    #[must_use]
    pub fn merged(&self, base: &ClockStatistics) -> ClockStatistics {
        ClockStatistics {
            players_remaining: self.players_remaining.unwrap_or(base.players_remaining),
            avg_stack: self.avg_stack.unwrap_or(base.avg_stack),
            total_chips: self.total_chips.unwrap_or(base.total_chips),
            eliminations: self.eliminations.unwrap_or(base.eliminations),
            rebuys: self.rebuys.unwrap_or(base.rebuys),
            addons: self.addons.unwrap_or(base.addons),
        }
    }
}

/// Per-tournament clock settings, fixed at initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSettings {
    /// Advance automatically when a level's duration elapses.
    pub auto_advance: bool,
    /// Minute marks at which a warning notification is issued.
    pub warning_thresholds_minutes: Vec<u32>,
    /// Client drift below this magnitude is ignored to avoid visible jitter.
    pub drift_correction_threshold_ms: i64,
    /// Interval of the periodic full-state broadcast sync.
    pub sync_interval_ms: u64,
    /// When `false`, break levels are skipped over on advance.
    pub breaks_enabled: bool,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            auto_advance: true,
            warning_thresholds_minutes: vec![5, 1],
            drift_correction_threshold_ms: 500,
            sync_interval_ms: 10_000,
            breaks_enabled: true,
        }
    }
}

/// The tournament clock aggregate.
///
/// Invariants:
/// - `current_level_index` is in range whenever the schedule is non-empty.
/// - `status == Break` exactly when the current level `is_break`.
/// - `version` strictly increases and equals the version of the last
///   applied event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    /// The tournament this clock belongs to.
    pub tournament_id: TournamentId,
    /// The tenant owning the tournament.
    pub tenant_id: TenantId,
    /// Current lifecycle status.
    pub status: ClockStatus,
    /// Index of the current level in the schedule.
    pub current_level_index: usize,
    /// Instant the current level (re)started counting. `None` before the
    /// first start.
    pub level_start: Option<DateTime<Utc>>,
    /// Instant the clock was paused. `None` unless status is `Paused`.
    pub paused_at: Option<DateTime<Utc>>,
    /// Elapsed running time frozen at the last pause, in milliseconds.
    pub accumulated_pause_ms: i64,
    /// Total time spent paused during the current level, for reporting.
    pub total_pause_ms_this_level: i64,
    /// Server instant of the last time-sync exchange.
    pub last_sync: Option<DateTime<Utc>>,
    /// Live tournament counters.
    pub statistics: ClockStatistics,
    /// Per-tournament settings.
    pub settings: ClockSettings,
    /// The level schedule. Empty only before initialization.
    pub schedule: LevelSchedule,
    /// Version of the last applied event; 0 before the first event.
    pub version: u64,
}

impl ClockState {
    /// Creates the blank pre-initialization state for an aggregate.
    ///
    /// Holds an empty schedule and version 0; the `ClockInitialized` event
    /// fills in schedule and settings.
    #[must_use]
    pub fn new(tournament_id: TournamentId, tenant_id: TenantId) -> Self {
        Self {
            tournament_id,
            tenant_id,
            status: ClockStatus::Idle,
            current_level_index: 0,
            level_start: None,
            paused_at: None,
            accumulated_pause_ms: 0,
            total_pause_ms_this_level: 0,
            last_sync: None,
            statistics: ClockStatistics::default(),
            settings: ClockSettings::default(),
            schedule: LevelSchedule::placeholder(),
            version: 0,
        }
    }

    /// Returns the current level, if the schedule has been initialized.
    #[must_use]
    pub fn current_level(&self) -> Option<&Level> {
        self.schedule.get(self.current_level_index)
    }

    /// Elapsed running time of the current level in milliseconds.
    ///
    /// Frozen at `accumulated_pause_ms` while paused; zero when the clock
    /// is idle or terminal.
    #[must_use]
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        match self.status {
            ClockStatus::Running | ClockStatus::Break => self
                .level_start
                .map_or(0, |start| (now - start).num_milliseconds().max(0)),
            ClockStatus::Paused => self.accumulated_pause_ms,
            ClockStatus::Idle | ClockStatus::Completed | ClockStatus::Error => 0,
        }
    }

    /// Remaining time of the current level in milliseconds, floored at zero.
    #[must_use]
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        self.current_level()
            .map_or(0, |level| (level.duration_ms() - self.elapsed_ms(now)).max(0))
    }

    /// Returns `true` if the clock reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
