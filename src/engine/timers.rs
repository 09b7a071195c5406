//! Cancellable per-tournament scheduled-task handles.
//!
//! Each tournament owns one [`TimerSet`]: the repeating tick loop, the
//! one-shot warning timers, and the periodic broadcast-sync task. Handles
//! are replaced, never accumulated, while the caller holds the
//! tournament's entry lock, so an old and a new timer for the same
//! concern are never both alive.

use tokio::task::JoinHandle;

/// Scheduled-task handles for one tournament.
#[derive(Debug, Default)]
pub struct TimerSet {
    tick: Option<JoinHandle<()>>,
    warnings: Vec<JoinHandle<()>>,
    sync: Option<JoinHandle<()>>,
}

impl TimerSet {
    /// Creates an empty timer set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the tick loop, aborting any previous one.
    pub fn set_tick(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.tick.replace(handle) {
            old.abort();
        }
    }

    /// Installs the warning timers, aborting all previous ones.
    pub fn set_warnings(&mut self, handles: Vec<JoinHandle<()>>) {
        self.cancel_warnings();
        self.warnings = handles;
    }

    /// Installs the broadcast-sync task, aborting any previous one.
    pub fn set_sync(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.sync.replace(handle) {
            old.abort();
        }
    }

    /// Cancels the tick loop.
    pub fn cancel_tick(&mut self) {
        if let Some(handle) = self.tick.take() {
            handle.abort();
        }
    }

    /// Cancels all warning timers.
    pub fn cancel_warnings(&mut self) {
        for handle in self.warnings.drain(..) {
            handle.abort();
        }
    }

    /// Cancels the countdown timers (tick + warnings), as on pause.
    pub fn cancel_countdown(&mut self) {
        self.cancel_tick();
        self.cancel_warnings();
    }

    /// Cancels everything, including the broadcast-sync task.
    pub fn cancel_all(&mut self) {
        self.cancel_countdown();
        if let Some(handle) = self.sync.take() {
            handle.abort();
        }
    }

    /// Returns `true` while a tick loop is installed and not finished.
    #[must_use]
    pub fn tick_is_live(&self) -> bool {
        self.tick.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Returns the number of installed warning timers.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
