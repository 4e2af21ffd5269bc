//! Broadcast channel carrying [`ServerEvent`]s.
//!
//! Publishing never blocks. Receivers that fall behind observe
//! `RecvError::Lagged(n)` and skip the `n` oldest events. Events sent while
//! nobody is subscribed are dropped.

use tokio::sync::broadcast;

use super::ServerEvent;

/// Default ring buffer size shared by all receivers.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Fan-out of server events to any number of subscribers.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    /// Create a bus; capacity is clamped to at least 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: ServerEvent) {
        tracing::trace!(?event, "Publish event");
        let _ = self.tx.send(event);
    }

    /// A receiver sees only events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
