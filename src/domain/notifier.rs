//! Broadcast channel for outbound clock notifications.
//!
//! [`ClockNotifier`] wraps a [`tokio::sync::broadcast`] channel. Every
//! successful mutation publishes a [`ClockNotification`] through the
//! notifier, and the Broadcast Gateway (plus any projection/integration
//! consumers) subscribes to receive them.

use tokio::sync::broadcast;

use super::ClockNotification;

/// Broadcast bus for [`ClockNotification`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity.
/// When the ring buffer is full, the oldest notifications are dropped for
/// lagging receivers.
#[derive(Debug, Clone)]
pub struct ClockNotifier {
    sender: broadcast::Sender<ClockNotification>,
}

impl ClockNotifier {
    /// Creates a new `ClockNotifier` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes a notification to all subscribers.
    ///
    /// Returns the number of receivers that received it. If there are no
    /// active receivers, the notification is silently dropped.
    pub fn publish(&self, notification: ClockNotification) -> usize {
        self.sender.send(notification).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClockNotification> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
