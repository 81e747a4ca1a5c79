//! Broadcast event bus for state observers.
//!
//! State holders emit events after each mutation; presentation code
//! subscribes and re-reads snapshots. Emitting never blocks and never
//! fails, even with no subscribers.

use tokio::sync::broadcast;

/// Capacity of the event channel.
/// Receivers that fall further behind get a `Lagged` error.
const CHANNEL_CAPACITY: usize = 256;

/// Typed broadcast bus
#[derive(Debug, Clone)]
pub struct EventBus<E: Clone> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone + std::fmt::Debug> EventBus<E> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Emit an event to all current subscribers
    pub fn emit(&self, event: E) {
        tracing::trace!("Event emitted: {:?}", event);
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone + std::fmt::Debug> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
