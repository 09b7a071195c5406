//! Clock service: single command entry point for all tournaments.
//!
//! Every mutation follows persist-then-apply-then-notify: derive the
//! facts from the current state, append them to the event log (bounded
//! timeout, optimistic version check), fold each successfully appended
//! record into memory, and only then publish notifications. A command
//! resolves successfully only after its appends succeeded, so memory and
//! log never diverge on failure.
//!
//! Commands for one tournament serialize on the registry entry's write
//! lock; scheduled tasks (tick loop, warning timers, broadcast sync) are
//! replaced under that same lock, so a stale timer and its replacement
//! are never both alive.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::clock_engine::TournamentClock;
use super::registry::{ClockEntry, ClockRegistry};
use crate::config::EngineConfig;
use crate::domain::{
    ClientId, ClockEvent, ClockNotification, ClockNotifier, ClockSettings, ClockState,
    ClockStatistics, ClockStatus, LevelSchedule, StatisticsUpdate, TenantId, TournamentId,
};
use crate::error::{ClockError, StoreError};
use crate::projection;
use crate::store::{EventMetadata, EventStore, NewEvent, SnapshotRecord, SnapshotStore};
use crate::sync::{self, ConnectionTracker, SyncResponse};
use crate::time::TimeSource;

/// Rejects commands addressed to the wrong tenant. Cross-tenant probes
/// look identical to a missing tournament.
fn check_tenant(state: &ClockState, tenant_id: &TenantId) -> Result<(), ClockError> {
    if state.tenant_id == *tenant_id {
        Ok(())
    } else {
        Err(ClockError::TournamentNotFound(state.tournament_id))
    }
}

/// Orchestration layer for all clock operations.
///
/// Owns the registry of live clocks, the storage seam, the notification
/// bus, and the connection tracker. Constructed as an [`Arc`] so the
/// scheduled tasks it spawns can hold [`Weak`] references back to it; an
/// abandoned service shuts its schedulers down by itself.
#[derive(Debug)]
pub struct ClockService {
    registry: ClockRegistry,
    events: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore>,
    notifier: ClockNotifier,
    connections: ConnectionTracker,
    time: Arc<dyn TimeSource>,
    config: EngineConfig,
    self_ref: Weak<ClockService>,
}

impl ClockService {
    /// Creates a new service over the given stores and time source.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        time: Arc<dyn TimeSource>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            registry: ClockRegistry::new(),
            events,
            snapshots,
            notifier: ClockNotifier::new(config.notifier_capacity),
            connections: ConnectionTracker::new(),
            time,
            config,
            self_ref: Weak::clone(self_ref),
        })
    }

    /// Returns the notification bus. The Broadcast Gateway subscribes here.
    #[must_use]
    pub fn notifier(&self) -> &ClockNotifier {
        &self.notifier
    }

    /// Returns the ephemeral client-connection tracker.
    #[must_use]
    pub fn connections(&self) -> &ConnectionTracker {
        &self.connections
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the number of resident clocks.
    pub async fn resident_clocks(&self) -> usize {
        self.registry.len().await
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Initializes a tournament clock with a validated schedule.
    ///
    /// Legal for a fresh aggregate and, as the documented recovery path,
    /// for a resident clock in `Error` (or still `Idle`). For a
    /// non-resident aggregate with existing history, call
    /// [`ClockService::open`] first.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::AlreadyInitialized`] when the clock is past
    /// `Idle`, or a store-mapped error if the append fails.
    pub async fn initialize(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        schedule: LevelSchedule,
        settings: ClockSettings,
        actor: &str,
    ) -> Result<ClockState, ClockError> {
        let now = self.time.now();

        if let Some(entry_lock) = self.registry.lookup(tournament_id).await {
            let mut entry = entry_lock.write().await;
            check_tenant(entry.clock.state(), tenant_id)?;
            let events = entry.clock.initialize(&schedule, &settings, now)?;
            self.commit(&mut entry, &events, Some(actor)).await?;
            let state = entry.clock.state().clone();
            entry.timers.cancel_countdown();
            entry
                .timers
                .set_sync(self.spawn_sync(tournament_id, state.settings.sync_interval_ms));
            drop(entry);
            self.maybe_snapshot(&state).await;
            self.notifier
                .publish(ClockNotification::Initialized { state: state.clone() });
            tracing::info!(%tournament_id, levels = state.schedule.len(), "clock re-initialized");
            return Ok(state);
        }

        let clock = TournamentClock::new(ClockState::new(tournament_id, tenant_id.clone()));
        let events = clock.initialize(&schedule, &settings, now)?;
        let mut entry = ClockEntry::new(clock);
        self.commit(&mut entry, &events, Some(actor)).await?;
        let state = entry.clock.state().clone();
        entry
            .timers
            .set_sync(self.spawn_sync(tournament_id, state.settings.sync_interval_ms));
        self.registry.insert(tournament_id, entry).await?;
        self.maybe_snapshot(&state).await;
        self.notifier
            .publish(ClockNotification::Initialized { state: state.clone() });
        tracing::info!(%tournament_id, levels = state.schedule.len(), "clock initialized");
        Ok(state)
    }

    /// Recovers a persisted tournament into the registry after a restart.
    ///
    /// Replays the durable history to current state *before* the registry
    /// entry exists; since every command requires a registry entry, no
    /// command can observe a partially-replayed clock. Completed
    /// tournaments are returned without becoming resident.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TournamentNotFound`] when the log holds no
    /// events for the aggregate, or a store-mapped error.
    pub async fn open(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
    ) -> Result<ClockState, ClockError> {
        if let Some(entry_lock) = self.registry.lookup(tournament_id).await {
            let entry = entry_lock.read().await;
            check_tenant(entry.clock.state(), tenant_id)?;
            return Ok(entry.clock.state().clone());
        }

        let state = self.project_history(tenant_id, tournament_id).await?;
        if state.version == 0 {
            return Err(ClockError::TournamentNotFound(tournament_id));
        }
        if state.status == ClockStatus::Completed {
            return Ok(state);
        }

        self.registry
            .insert(
                tournament_id,
                ClockEntry::new(TournamentClock::new(state.clone())),
            )
            .await?;
        let entry_lock = self.registry.get(tournament_id).await?;
        let mut entry = entry_lock.write().await;
        entry
            .timers
            .set_sync(self.spawn_sync(tournament_id, state.settings.sync_interval_ms));
        if state.status.is_counting() {
            self.arm_countdown(&mut entry, tournament_id);
        }
        drop(entry);
        tracing::info!(%tournament_id, version = state.version, status = %state.status, "clock recovered from log");
        Ok(state)
    }

    /// Starts the clock from idle or paused.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] outside idle/paused, or
    /// a store-mapped error.
    pub async fn start(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        actor: &str,
        statistics: Option<ClockStatistics>,
    ) -> Result<ClockState, ClockError> {
        let entry_lock = self.entry(tenant_id, tournament_id, "start").await?;
        let mut entry = entry_lock.write().await;
        let events = entry.clock.start(self.time.now(), statistics)?;
        self.commit(&mut entry, &events, Some(actor)).await?;
        let state = entry.clock.state().clone();
        self.arm_countdown(&mut entry, tournament_id);
        drop(entry);
        self.maybe_snapshot(&state).await;
        self.notifier
            .publish(ClockNotification::Started { state: state.clone() });
        tracing::info!(%tournament_id, level = state.current_level_index, "clock started");
        Ok(state)
    }

    /// Pauses the countdown, freezing elapsed time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] unless running or on
    /// break, or a store-mapped error.
    pub async fn pause(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        actor: &str,
        reason: &str,
        notes: Option<String>,
    ) -> Result<ClockState, ClockError> {
        let entry_lock = self.entry(tenant_id, tournament_id, "pause").await?;
        let mut entry = entry_lock.write().await;
        let events = entry.clock.pause(self.time.now(), reason, notes)?;
        self.commit(&mut entry, &events, Some(actor)).await?;
        let state = entry.clock.state().clone();
        entry.timers.cancel_countdown();
        drop(entry);
        self.maybe_snapshot(&state).await;
        self.notifier
            .publish(ClockNotification::Paused { state: state.clone() });
        tracing::info!(%tournament_id, reason, "clock paused");
        Ok(state)
    }

    /// Resumes a paused countdown.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] unless paused, or a
    /// store-mapped error.
    pub async fn resume(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        actor: &str,
        notes: Option<String>,
    ) -> Result<ClockState, ClockError> {
        let entry_lock = self.entry(tenant_id, tournament_id, "resume").await?;
        let mut entry = entry_lock.write().await;
        let events = entry.clock.resume(self.time.now(), notes)?;
        self.commit(&mut entry, &events, Some(actor)).await?;
        let state = entry.clock.state().clone();
        self.arm_countdown(&mut entry, tournament_id);
        drop(entry);
        self.maybe_snapshot(&state).await;
        self.notifier
            .publish(ClockNotification::Resumed { state: state.clone() });
        tracing::info!(%tournament_id, "clock resumed");
        Ok(state)
    }

    /// Advances to the next level; at the end of the schedule this
    /// completes the tournament.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] unless running or on
    /// break, or a store-mapped error.
    pub async fn advance_level(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        actor: Option<&str>,
        auto_advanced: bool,
    ) -> Result<ClockState, ClockError> {
        let entry_lock = self.entry(tenant_id, tournament_id, "advance_level").await?;
        let mut entry = entry_lock.write().await;
        let now = self.time.now();
        if auto_advanced && !entry.clock.auto_advance_due(now) {
            // A manual command won the race between boundary detection
            // and this lock; the boundary no longer holds.
            return Ok(entry.clock.state().clone());
        }
        let events = entry.clock.advance(now, auto_advanced)?;
        self.commit(&mut entry, &events, actor).await?;
        let state = entry.clock.state().clone();
        let completed = state.status == ClockStatus::Completed;
        if !completed {
            // The tick loop re-derives everything from current state and
            // stays valid across advances; only the one-shot warning
            // timers carry stale remaining-time math.
            let warnings = self.spawn_warnings(tournament_id, entry.clock.state());
            entry.timers.set_warnings(warnings);
        }
        drop(entry);
        self.maybe_snapshot(&state).await;
        let reason = if auto_advanced { "scheduled" } else { "manual" };
        self.publish_level_notifications(&state, &events, reason, auto_advanced);
        if completed {
            self.notifier
                .publish(ClockNotification::Completed { state: state.clone() });
            tracing::info!(%tournament_id, "schedule exhausted; clock completed");
            self.retire(tournament_id).await;
        } else {
            tracing::info!(%tournament_id, level = state.current_level_index, auto_advanced, "level advanced");
        }
        Ok(state)
    }

    /// Jumps to an arbitrary level, recording a manual-adjustment fact.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::LevelOutOfRange`] for a target outside the
    /// schedule, [`ClockError::InvalidTransition`] from terminal states,
    /// or a store-mapped error.
    pub async fn goto_level(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        target: usize,
        actor: &str,
        reason: &str,
    ) -> Result<ClockState, ClockError> {
        let entry_lock = self.entry(tenant_id, tournament_id, "goto_level").await?;
        let mut entry = entry_lock.write().await;
        let events = entry.clock.goto_level(self.time.now(), target, reason)?;
        self.commit(&mut entry, &events, Some(actor)).await?;
        let state = entry.clock.state().clone();
        // A manual jump always lands counting (running or break), with
        // remaining time reset; both timers restart from scratch.
        self.arm_countdown(&mut entry, tournament_id);
        drop(entry);
        self.maybe_snapshot(&state).await;
        self.publish_level_notifications(&state, &events, reason, false);
        tracing::info!(%tournament_id, target, reason, "clock manually adjusted");
        Ok(state)
    }

    /// Completes the tournament and evicts it from the registry. The
    /// durable history remains queryable through
    /// [`ClockService::get_state`].
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] from terminal states, or
    /// a store-mapped error.
    pub async fn complete(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        actor: Option<&str>,
    ) -> Result<ClockState, ClockError> {
        let entry_lock = self.entry(tenant_id, tournament_id, "complete").await?;
        let mut entry = entry_lock.write().await;
        let events = entry.clock.complete(self.time.now())?;
        self.commit(&mut entry, &events, actor).await?;
        let state = entry.clock.state().clone();
        drop(entry);
        self.maybe_snapshot(&state).await;
        self.notifier
            .publish(ClockNotification::Completed { state: state.clone() });
        tracing::info!(%tournament_id, "clock completed");
        self.retire(tournament_id).await;
        Ok(state)
    }

    /// Merges a partial statistics update into the clock.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTransition`] from terminal states, or
    /// a store-mapped error.
    pub async fn update_statistics(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        update: &StatisticsUpdate,
        actor: Option<&str>,
    ) -> Result<ClockState, ClockError> {
        let entry_lock = self.entry(tenant_id, tournament_id, "update_statistics").await?;
        let mut entry = entry_lock.write().await;
        let events = entry.clock.update_statistics(self.time.now(), update)?;
        self.commit(&mut entry, &events, actor).await?;
        let state = entry.clock.state().clone();
        drop(entry);
        self.maybe_snapshot(&state).await;
        self.notifier
            .publish(ClockNotification::StatisticsUpdated { state: state.clone() });
        Ok(state)
    }

    /// Processes one time-sync exchange for a connected client.
    ///
    /// Appends the audit fact (and, on threshold breach, a drift fact plus
    /// a targeted correction notification) and returns the correction to
    /// the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TournamentNotFound`] for an unknown
    /// tournament, or a store-mapped error.
    pub async fn request_sync(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        client_id: &ClientId,
        request_id: Uuid,
        client_reported: chrono::DateTime<chrono::Utc>,
    ) -> Result<SyncResponse, ClockError> {
        let entry_lock = self.entry(tenant_id, tournament_id, "request_sync").await?;
        let mut entry = entry_lock.write().await;
        let now = self.time.now();
        let (response, events) = entry
            .clock
            .request_sync(now, client_id, request_id, client_reported);
        self.commit(&mut entry, &events, None).await?;
        drop(entry);

        self.connections
            .record_sync(tournament_id, client_id, now, response.drift_ms)
            .await;
        if response.correction_ms != 0 {
            let severity = sync::classify(response.drift_ms);
            tracing::warn!(%tournament_id, client = %client_id, drift_ms = response.drift_ms, ?severity, "client drift above threshold");
            self.notifier.publish(ClockNotification::DriftDetected {
                tournament_id,
                client_id: client_id.clone(),
                drift_ms: response.drift_ms,
                severity,
                correction_ms: response.correction_ms,
            });
        }
        Ok(response)
    }

    /// Returns current state: from memory for resident clocks, otherwise
    /// projected read-only from the durable history through the same fold
    /// recovery uses.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TournamentNotFound`] when neither the
    /// registry nor the log knows the aggregate, or a store-mapped error.
    pub async fn get_state(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
    ) -> Result<ClockState, ClockError> {
        if let Some(entry_lock) = self.registry.lookup(tournament_id).await {
            let entry = entry_lock.read().await;
            check_tenant(entry.clock.state(), tenant_id)?;
            return Ok(entry.clock.state().clone());
        }
        let state = self.project_history(tenant_id, tournament_id).await?;
        if state.version == 0 {
            return Err(ClockError::TournamentNotFound(tournament_id));
        }
        Ok(state)
    }

    /// Registers a newly connected observer.
    pub async fn register_client(
        &self,
        tournament_id: TournamentId,
        client_id: ClientId,
        is_controller: bool,
    ) {
        self.connections
            .register(tournament_id, client_id, self.time.now(), is_controller)
            .await;
    }

    /// Drops an observer on disconnect. Returns `true` if it was tracked.
    pub async fn disconnect_client(
        &self,
        tournament_id: TournamentId,
        client_id: &ClientId,
    ) -> bool {
        self.connections.disconnect(tournament_id, client_id).await
    }

    /// Cancels all scheduled tasks and evicts every resident clock.
    pub async fn shutdown(&self) {
        for tournament_id in self.registry.ids().await {
            if let Some(entry_lock) = self.registry.remove(tournament_id).await {
                let mut entry = entry_lock.write().await;
                entry.timers.cancel_all();
            }
            self.connections.clear(tournament_id).await;
        }
        tracing::info!("clock engine shut down");
    }

    // ------------------------------------------------------------------
    // Commit path
    // ------------------------------------------------------------------

    /// Appends each derived fact and folds the resulting record into the
    /// entry, one event at a time: if an append fails part-way, memory
    /// still matches everything the log accepted.
    async fn commit(
        &self,
        entry: &mut ClockEntry,
        events: &[ClockEvent],
        actor: Option<&str>,
    ) -> Result<(), ClockError> {
        let correlation_id = Uuid::new_v4();
        let mut causation_id: Option<Uuid> = None;
        for event in events {
            let state = entry.clock.state();
            let mut metadata = EventMetadata::new(correlation_id, self.time.now());
            if let Some(actor) = actor {
                metadata = metadata.with_actor(actor);
            }
            if let Some(cause) = causation_id {
                metadata = metadata.with_causation(cause);
            }
            let new_event = NewEvent::from_clock_event(
                state.tenant_id.clone(),
                state.tournament_id,
                event,
                metadata,
            )
            .map_err(|e| ClockError::Internal(format!("payload encode: {e}")))?;
            let expected = state.version;
            let record = self
                .timed("append", self.events.append(new_event, expected))
                .await?;
            entry.clock.apply(&record);
            causation_id = Some(record.id);
        }
        Ok(())
    }

    /// Wraps a store call in the configured bounded timeout; an elapse
    /// surfaces as [`ClockError::StoreUnavailable`] rather than a hang.
    async fn timed<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ClockError> {
        match tokio::time::timeout(Duration::from_millis(self.config.store_timeout_ms), fut).await {
            Ok(result) => result.map_err(ClockError::from),
            Err(_) => Err(ClockError::StoreUnavailable(format!(
                "{operation} timed out after {}ms",
                self.config.store_timeout_ms
            ))),
        }
    }

    /// Saves a snapshot on the configured cadence. Failures only cost
    /// replay time, so they are logged and swallowed.
    async fn maybe_snapshot(&self, state: &ClockState) {
        let every = self.config.snapshot_every_events;
        if every == 0 || state.version == 0 || state.version % every != 0 {
            return;
        }
        let snapshot = match SnapshotRecord::from_state(state, self.time.now()) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(tournament_id = %state.tournament_id, error = %err, "snapshot encode failed");
                return;
            }
        };
        if let Err(err) = self.timed("snapshot save", self.snapshots.save(snapshot)).await {
            tracing::warn!(tournament_id = %state.tournament_id, error = %err, "snapshot save failed");
        }
    }

    async fn project_history(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
    ) -> Result<ClockState, ClockError> {
        let initial = ClockState::new(tournament_id, tenant_id.clone());
        tokio::time::timeout(
            Duration::from_millis(self.config.store_timeout_ms),
            projection::project(
                self.events.as_ref(),
                self.snapshots.as_ref(),
                tenant_id,
                tournament_id,
                initial,
            ),
        )
        .await
        .map_err(|_| {
            ClockError::StoreUnavailable(format!(
                "replay timed out after {}ms",
                self.config.store_timeout_ms
            ))
        })?
    }

    /// Resolves the registry entry for a command.
    ///
    /// A non-resident tournament is looked up in the durable history so
    /// the caller gets an honest answer: commands against a completed
    /// (and therefore evicted) clock are state conflicts, not lookup
    /// failures; a live but unrecovered clock must be `open`ed first.
    async fn entry(
        &self,
        tenant_id: &TenantId,
        tournament_id: TournamentId,
        command: &'static str,
    ) -> Result<Arc<RwLock<ClockEntry>>, ClockError> {
        if let Some(entry_lock) = self.registry.lookup(tournament_id).await {
            {
                let entry = entry_lock.read().await;
                check_tenant(entry.clock.state(), tenant_id)?;
            }
            return Ok(entry_lock);
        }
        let state = self.project_history(tenant_id, tournament_id).await?;
        if state.is_terminal() {
            return Err(ClockError::InvalidTransition {
                status: state.status,
                command,
            });
        }
        Err(ClockError::TournamentNotFound(tournament_id))
    }

    /// Evicts a finished tournament: ephemeral connections first, then
    /// the registry entry, and its timers last. The tick task may be the
    /// caller, so aborting it must be the final side effect.
    async fn retire(&self, tournament_id: TournamentId) {
        self.connections.clear(tournament_id).await;
        if let Some(entry_lock) = self.registry.remove(tournament_id).await {
            let mut entry = entry_lock.write().await;
            entry.timers.cancel_all();
        }
    }

    fn publish_level_notifications(
        &self,
        state: &ClockState,
        events: &[ClockEvent],
        reason: &str,
        auto_advanced: bool,
    ) {
        for event in events {
            match event {
                ClockEvent::LevelAdvanced {
                    previous_index,
                    new_index,
                    ..
                } => {
                    if let (Some(previous_level), Some(new_level)) = (
                        state.schedule.get(*previous_index),
                        state.schedule.get(*new_index),
                    ) {
                        self.notifier.publish(ClockNotification::LevelChanged {
                            tournament_id: state.tournament_id,
                            previous_level: previous_level.clone(),
                            new_level: new_level.clone(),
                            reason: reason.to_string(),
                            auto_advanced,
                        });
                    }
                }
                ClockEvent::ClockManuallyAdjusted { previous, new, .. } => {
                    if let (Some(previous_level), Some(new_level)) = (
                        state.schedule.get(previous.level_index),
                        state.schedule.get(new.level_index),
                    ) {
                        self.notifier.publish(ClockNotification::LevelChanged {
                            tournament_id: state.tournament_id,
                            previous_level: previous_level.clone(),
                            new_level: new_level.clone(),
                            reason: reason.to_string(),
                            auto_advanced,
                        });
                    }
                }
                ClockEvent::BreakStarted {
                    level_index,
                    duration_seconds,
                    scheduled_end,
                    ..
                } => {
                    if let Some(level) = state.schedule.get(*level_index) {
                        self.notifier.publish(ClockNotification::BreakStarted {
                            tournament_id: state.tournament_id,
                            level: level.clone(),
                            duration_seconds: *duration_seconds,
                            scheduled_end: *scheduled_end,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    // ------------------------------------------------------------------
    // Scheduled tasks
    // ------------------------------------------------------------------

    /// Installs the tick loop and fresh warning timers for a counting
    /// clock. Must be called under the entry's write lock.
    fn arm_countdown(&self, entry: &mut ClockEntry, tournament_id: TournamentId) {
        entry.timers.set_tick(self.spawn_tick(tournament_id));
        entry
            .timers
            .set_warnings(self.spawn_warnings(tournament_id, entry.clock.state()));
    }

    fn spawn_tick(&self, tournament_id: TournamentId) -> JoinHandle<()> {
        let weak = Weak::clone(&self.self_ref);
        let interval_ms = self.config.tick_interval_ms.max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first interval tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(service) = weak.upgrade() else { break };
                service.scheduler_pass(tournament_id).await;
            }
        })
    }

    fn spawn_warnings(
        &self,
        tournament_id: TournamentId,
        state: &ClockState,
    ) -> Vec<JoinHandle<()>> {
        let now = self.time.now();
        let remaining = state.remaining_ms(now);
        let mut handles = Vec::new();
        for minutes in &state.settings.warning_thresholds_minutes {
            let threshold_ms = i64::from(*minutes).saturating_mul(60_000);
            let fire_in = remaining - threshold_ms;
            if fire_in <= 0 {
                // The warning instant is not in the future.
                continue;
            }
            let weak = Weak::clone(&self.self_ref);
            let minutes = *minutes;
            let delay = Duration::from_millis(u64::try_from(fire_in).unwrap_or(0));
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(service) = weak.upgrade() {
                    service.warning_pass(tournament_id, minutes).await;
                }
            }));
        }
        handles
    }

    fn spawn_sync(&self, tournament_id: TournamentId, interval_ms: u64) -> JoinHandle<()> {
        let weak = Weak::clone(&self.self_ref);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(service) = weak.upgrade() else { break };
                let Some(entry_lock) = service.registry.lookup(tournament_id).await else {
                    break;
                };
                let state = entry_lock.read().await.clock.state().clone();
                service.notifier.publish(ClockNotification::Sync { state });
            }
        })
    }

    /// One scheduler pass: emit a tick notification and, at the level
    /// boundary, advance. The boundary is re-checked under the entry's
    /// write lock inside `advance_level`, so a racing manual command
    /// cannot cause a double advance.
    async fn scheduler_pass(&self, tournament_id: TournamentId) {
        let Some(entry_lock) = self.registry.lookup(tournament_id).await else {
            return;
        };
        let entry = entry_lock.read().await;
        let state = entry.clock.state().clone();
        let now = self.time.now();
        let due = entry.clock.auto_advance_due(now);
        drop(entry);

        if !state.status.is_counting() {
            return;
        }
        self.notifier.publish(ClockNotification::Tick {
            tournament_id,
            elapsed_ms: state.elapsed_ms(now),
            remaining_ms: state.remaining_ms(now),
        });
        if due {
            let advanced = self
                .advance_level(&state.tenant_id, tournament_id, None, true)
                .await;
            if let Err(err) = advanced {
                self.report_pass_failure(tournament_id, &err).await;
            }
        }
    }

    /// Records a failed scheduler pass without corrupting clock state:
    /// best-effort non-fatal error fact plus an error notification
    /// carrying the last-known-good state. The pass is simply retried on
    /// the next tick.
    async fn report_pass_failure(&self, tournament_id: TournamentId, err: &ClockError) {
        tracing::warn!(%tournament_id, error = %err, kind = err.kind().as_str(), "scheduler pass failed; retrying next tick");
        let Some(entry_lock) = self.registry.lookup(tournament_id).await else {
            return;
        };
        let mut entry = entry_lock.write().await;
        let state = entry.clock.state().clone();
        let event = ClockEvent::ClockErrorOccurred {
            kind: err.kind().as_str().to_string(),
            message: err.to_string(),
            fatal: false,
            occurred_at: self.time.now(),
        };
        if let Err(append_err) = self.commit(&mut entry, &[event], None).await {
            tracing::warn!(%tournament_id, error = %append_err, "error fact append failed");
        }
        drop(entry);
        self.notifier.publish(ClockNotification::Error {
            kind: err.kind().as_str().to_string(),
            message: err.to_string(),
            state,
        });
    }

    /// One warning-timer firing: append the fact and notify, unless the
    /// clock stopped counting since the timer was armed.
    async fn warning_pass(&self, tournament_id: TournamentId, minutes: u32) {
        let Some(entry_lock) = self.registry.lookup(tournament_id).await else {
            return;
        };
        let mut entry = entry_lock.write().await;
        if !entry.clock.state().status.is_counting() {
            return;
        }
        let message = format!("{minutes} minutes remaining in the current level");
        let event = ClockEvent::ClockWarningIssued {
            minutes_remaining: minutes,
            message: message.clone(),
            issued_at: self.time.now(),
        };
        if let Err(err) = self.commit(&mut entry, &[event], None).await {
            tracing::warn!(%tournament_id, error = %err, "warning fact append failed");
            return;
        }
        drop(entry);
        self.notifier.publish(ClockNotification::Warning {
            tournament_id,
            minutes_remaining: minutes,
            message,
        });
    }
}
