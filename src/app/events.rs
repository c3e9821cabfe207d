//! Listing events for the rendering layer.

use tokio::sync::broadcast;

use crate::domain::ListDomain;
use crate::services::FilterState;

/// Something the rendering layer may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    /// State was seeded from the URL.
    Mounted {
        /// Listing that mounted.
        domain: ListDomain,
        /// Initial state.
        state: FilterState,
    },
    /// Typed search text is waiting for the quiet period.
    SearchPending {
        /// Text as typed so far.
        input: String,
    },
    /// The visible result set was re-derived.
    ResultsChanged {
        /// Monotonic derivation counter.
        revision: u64,
        /// Number of visible items.
        count: usize,
    },
    /// The current history entry was replaced.
    UrlReplaced {
        /// New URL.
        url: String,
    },
    /// Every filter was reset.
    Cleared,
    /// The controller stopped acting on input.
    Unmounted,
}

/// Fan-out channel for [`ListEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ListEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends an event to every current receiver.
    pub fn publish(&self, event: ListEvent) {
        // no receivers is fine
        let _ = self.sender.send(event);
    }

    /// Returns a receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ListEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
