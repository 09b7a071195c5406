//! Concurrent clock storage with per-tournament fine-grained locking.
//!
//! [`ClockRegistry`] is the explicit arena of live clocks: create on
//! initialize (or recovery), remove on complete or shutdown. The outer
//! map is behind a [`tokio::sync::RwLock`]; each entry carries its own
//! lock, so commands for one tournament serialize while different
//! tournaments proceed fully in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::clock_engine::TournamentClock;
use super::timers::TimerSet;
use crate::domain::TournamentId;
use crate::error::ClockError;

/// A live clock plus its scheduled-task handles.
///
/// Timers live next to the clock on purpose: they can only be replaced
/// while holding this entry's write lock, which makes timer replacement
/// atomic with the state change that invalidated them.
#[derive(Debug)]
pub struct ClockEntry {
    /// The tournament's clock state machine.
    pub clock: TournamentClock,
    /// Tick, warning, and broadcast-sync task handles.
    pub timers: TimerSet,
}

impl ClockEntry {
    /// Wraps a clock with an empty timer set.
    #[must_use]
    pub fn new(clock: TournamentClock) -> Self {
        Self {
            clock,
            timers: TimerSet::new(),
        }
    }
}

/// Central store for all resident tournament clocks.
///
/// # Concurrency
///
/// - Reads of different entries are concurrent.
/// - Commands for the same tournament serialize on the entry's write lock
///   (single writer per aggregate).
#[derive(Debug, Default)]
pub struct ClockRegistry {
    clocks: RwLock<HashMap<TournamentId, Arc<RwLock<ClockEntry>>>>,
}

impl ClockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::AlreadyInitialized`] if an entry for the
    /// tournament already exists.
    pub async fn insert(
        &self,
        tournament_id: TournamentId,
        entry: ClockEntry,
    ) -> Result<(), ClockError> {
        let mut map = self.clocks.write().await;
        if map.contains_key(&tournament_id) {
            return Err(ClockError::AlreadyInitialized(tournament_id));
        }
        map.insert(tournament_id, Arc::new(RwLock::new(entry)));
        Ok(())
    }

    /// Returns the entry behind its per-tournament lock, if resident.
    pub async fn lookup(&self, tournament_id: TournamentId) -> Option<Arc<RwLock<ClockEntry>>> {
        let map = self.clocks.read().await;
        map.get(&tournament_id).cloned()
    }

    /// Returns the entry behind its per-tournament lock.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TournamentNotFound`] if no entry exists.
    pub async fn get(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Arc<RwLock<ClockEntry>>, ClockError> {
        self.lookup(tournament_id)
            .await
            .ok_or(ClockError::TournamentNotFound(tournament_id))
    }

    /// Removes an entry, returning it so the caller can cancel its timers.
    pub async fn remove(&self, tournament_id: TournamentId) -> Option<Arc<RwLock<ClockEntry>>> {
        let mut map = self.clocks.write().await;
        map.remove(&tournament_id)
    }

    /// Returns the ids of all resident tournaments.
    pub async fn ids(&self) -> Vec<TournamentId> {
        let map = self.clocks.read().await;
        map.keys().copied().collect()
    }

    /// Returns the number of resident clocks.
    pub async fn len(&self) -> usize {
        self.clocks.read().await.len()
    }

    /// Returns `true` if no clocks are resident.
    pub async fn is_empty(&self) -> bool {
        self.clocks.read().await.is_empty()
    }
}
