//! Injected time source for deterministic timing arithmetic.
//!
//! Business logic never calls the wall clock directly: every component
//! that needs the current instant receives a [`TimeSource`]. Production
//! wiring uses [`SystemTime`]; tests drive [`ManualTime`] so pause/resume
//! and drift arithmetic are exactly reproducible.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// Source of the current instant.
pub trait TimeSource: Send + Sync + std::fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source backed by [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually-driven time source for tests.
///
/// Holds the current instant as microseconds since the Unix epoch in an
/// atomic, so it can be shared across tasks without locking. Time only
/// moves when [`ManualTime::advance_ms`] or [`ManualTime::set`] is called.
#[derive(Debug)]
pub struct ManualTime {
    micros: AtomicI64,
}

impl ManualTime {
    /// Creates a manual time source starting at the given instant.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    /// Moves the clock forward by the given number of milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        self.micros
            .fetch_add(ms.saturating_mul(1_000), Ordering::SeqCst);
    }

    /// Moves the clock forward by the given number of seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.advance_ms(secs.saturating_mul(1_000));
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        self.micros.store(to.timestamp_micros(), Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}
