//! Engine error types with retry-contract classification.
//!
//! [`ClockError`] is the central error type for the engine. Each variant
//! maps to an [`ErrorKind`] that tells the caller whether the failure is
//! retryable and how.

use crate::domain::{ClockStatus, TournamentId};

/// Coarse error taxonomy exposed to command callers.
///
/// | Kind                  | Retry contract                                  |
/// |-----------------------|-------------------------------------------------|
/// | `Validation`          | bad input, rejected pre-mutation, never retried |
/// | `StateConflict`       | illegal transition, inspect state then retry    |
/// | `ConcurrencyConflict` | version race, re-read and retry                 |
/// | `StoreUnavailable`    | transient, retry with backoff                   |
/// | `Internal`            | unexpected failure, surfaced as a warning       |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input. Rejected before any mutation.
    Validation,
    /// The command is illegal for the clock's current status.
    StateConflict,
    /// Optimistic concurrency check lost a version race.
    ConcurrencyConflict,
    /// The durable store is unreachable or timed out.
    StoreUnavailable,
    /// Unexpected internal failure.
    Internal,
}

impl ErrorKind {
    /// Returns the kind as a static string slice, as recorded in error
    /// facts and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::StateConflict => "state_conflict",
            Self::ConcurrencyConflict => "concurrency_conflict",
            Self::StoreUnavailable => "store_unavailable",
            Self::Internal => "internal",
        }
    }
}

/// Failures surfaced by the opaque storage seam.
///
/// Implementations of [`crate::store::EventStore`] and
/// [`crate::store::SnapshotStore`] report all failures through this type;
/// the service layer converts it into [`ClockError`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The caller's assumed version is stale.
    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Version the caller assumed was current.
        expected: u64,
        /// Version actually found in the log.
        actual: u64,
    },

    /// The store is unreachable; transient.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The record itself is malformed; fatal, never retried.
    #[error("store validation failed: {0}")]
    Validation(String),
}

/// Server-side error enum for all clock engine operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// No clock with the given tournament ID is known.
    #[error("tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    /// A clock for this tournament already exists and is not re-initializable.
    #[error("tournament already initialized: {0}")]
    AlreadyInitialized(TournamentId),

    /// The level schedule failed validation.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A level index outside the schedule was requested.
    #[error("level index {requested} out of range (schedule has {len} levels)")]
    LevelOutOfRange {
        /// Requested target index.
        requested: usize,
        /// Number of levels in the schedule.
        len: usize,
    },

    /// The command is not legal in the clock's current status.
    #[error("cannot {command} while {status}")]
    InvalidTransition {
        /// Status the clock was in when the command arrived.
        status: ClockStatus,
        /// The rejected command, for diagnostics.
        command: &'static str,
    },

    /// The event log rejected an append because the expected version was stale.
    #[error("concurrent modification: expected version {expected}, log at {actual}")]
    VersionConflict {
        /// Version the engine assumed was current.
        expected: u64,
        /// Version actually found in the log.
        actual: u64,
    },

    /// The durable store is unreachable or timed out.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A persisted record could not be decoded during replay.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClockError {
    /// Returns the taxonomy kind for this variant.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TournamentNotFound(_)
            | Self::InvalidSchedule(_)
            | Self::LevelOutOfRange { .. } => ErrorKind::Validation,
            Self::AlreadyInitialized(_) | Self::InvalidTransition { .. } => {
                ErrorKind::StateConflict
            }
            Self::VersionConflict { .. } => ErrorKind::ConcurrencyConflict,
            Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Self::CorruptRecord(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if the caller may retry the operation.
    ///
    /// State conflicts are retryable only after re-reading state, so they
    /// count as retryable here; validation and internal failures do not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StateConflict | ErrorKind::ConcurrencyConflict | ErrorKind::StoreUnavailable
        )
    }
}

impl From<StoreError> for ClockError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { expected, actual } => {
                Self::VersionConflict { expected, actual }
            }
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::Validation(msg) => Self::CorruptRecord(msg),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_not_retryable() {
        let err = ClockError::InvalidSchedule("empty".to_string());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
    }

    #[test]
    fn transition_errors_are_state_conflicts() {
        let err = ClockError::InvalidTransition {
            status: ClockStatus::Idle,
            command: "pause",
        };
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert!(err.is_retryable());
    }

    #[test]
    fn store_conflict_maps_to_concurrency_conflict() {
        let err: ClockError = StoreError::Conflict {
            expected: 3,
            actual: 5,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::ConcurrencyConflict);
        let ClockError::VersionConflict { expected, actual } = err else {
            panic!("expected VersionConflict");
        };
        assert_eq!(expected, 3);
        assert_eq!(actual, 5);
    }

    #[test]
    fn store_unavailable_is_retryable() {
        let err: ClockError = StoreError::Unavailable("timeout".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(err.is_retryable());
    }

    #[test]
    fn internal_errors_are_not_retryable() {
        let err = ClockError::Internal("tick failed".to_string());
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_retryable());
    }
}
