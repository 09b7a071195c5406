//! Blind levels and the validated tournament level schedule.

use serde::{Deserialize, Serialize};

use crate::error::ClockError;

/// One segment of the tournament structure.
///
/// Either a playing level (blinds/ante posted for `duration_seconds`) or a
/// break. Break levels carry zero blinds and an optional label shown to
/// observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Position of this level in the schedule (0-based, contiguous).
    pub index: usize,
    /// Small blind for this level. Zero on breaks.
    pub small_blind: u64,
    /// Big blind for this level. Zero on breaks.
    pub big_blind: u64,
    /// Ante posted by every player. Zero on breaks and ante-free levels.
    pub ante: u64,
    /// Length of the level in seconds.
    pub duration_seconds: u32,
    /// Whether this level is a break.
    pub is_break: bool,
    /// Optional break label (e.g. `"Dinner break"`). Only set on breaks.
    pub break_label: Option<String>,
}

impl Level {
    /// Creates a playing level.
    #[must_use]
    pub fn playing(
        index: usize,
        small_blind: u64,
        big_blind: u64,
        ante: u64,
        duration_seconds: u32,
    ) -> Self {
        Self {
            index,
            small_blind,
            big_blind,
            ante,
            duration_seconds,
            is_break: false,
            break_label: None,
        }
    }

    /// Creates a break level.
    pub fn break_level(index: usize, duration_seconds: u32, label: impl Into<String>) -> Self {
        Self {
            index,
            small_blind: 0,
            big_blind: 0,
            ante: 0,
            duration_seconds,
            is_break: true,
            break_label: Some(label.into()),
        }
    }

    /// Returns the level duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        i64::from(self.duration_seconds).saturating_mul(1_000)
    }
}

/// Ordered, non-empty, contiguously-indexed list of [`Level`]s.
///
/// Constructed once at initialization through [`LevelSchedule::new`] and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelSchedule(Vec<Level>);

impl LevelSchedule {
    /// Validates and wraps a list of levels.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidSchedule`] if the list is empty or the
    /// level indices are not the contiguous sequence `0..len`.
    pub fn new(levels: Vec<Level>) -> Result<Self, ClockError> {
        if levels.is_empty() {
            return Err(ClockError::InvalidSchedule(
                "schedule must contain at least one level".to_string(),
            ));
        }
        for (position, level) in levels.iter().enumerate() {
            if level.index != position {
                return Err(ClockError::InvalidSchedule(format!(
                    "level at position {position} carries index {}",
                    level.index
                )));
            }
        }
        Ok(Self(levels))
    }

    /// Empty placeholder for an aggregate that has not been initialized.
    pub(crate) fn placeholder() -> Self {
        Self(Vec::new())
    }

    /// Returns the number of levels in the schedule.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the schedule holds no levels (pre-initialization).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the level at the given index, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Level> {
        self.0.get(index)
    }

    /// Returns the index of the last level.
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Returns the levels as a slice.
    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn empty_schedule_is_rejected() {
        let result = LevelSchedule::new(Vec::new());
        assert!(matches!(result, Err(ClockError::InvalidSchedule(_))));
    }

    #[test]
    fn non_contiguous_indices_are_rejected() {
        let levels = vec![
            Level::playing(0, 5, 10, 0, 60),
            Level::playing(2, 10, 20, 0, 60),
        ];
        let result = LevelSchedule::new(levels);
        assert!(matches!(result, Err(ClockError::InvalidSchedule(_))));
    }

    #[test]
    fn valid_schedule_round_trips() {
        let levels = vec![
            Level::playing(0, 5, 10, 0, 60),
            Level::break_level(1, 30, "Break"),
            Level::playing(2, 10, 20, 20, 60),
        ];
        let Ok(schedule) = LevelSchedule::new(levels) else {
            panic!("valid schedule");
        };
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule.last_index(), 2);
        assert!(schedule.get(1).is_some_and(|l| l.is_break));
        assert!(schedule.get(3).is_none());
    }

    #[test]
    fn duration_ms_scales_seconds() {
        let level = Level::playing(0, 5, 10, 0, 90);
        assert_eq!(level.duration_ms(), 90_000);
    }

    #[test]
    fn break_level_carries_label() {
        let level = Level::break_level(1, 600, "Dinner break");
        assert!(level.is_break);
        assert_eq!(level.break_label.as_deref(), Some("Dinner break"));
        assert_eq!(level.big_blind, 0);
    }
}
