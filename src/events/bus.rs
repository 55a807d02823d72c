//! # Broadcast bus for lifecycle events.
//!
//! ```text
//!   Supervisor::tick ─┐
//!   SubscriberSet    ─┴─► Bus ─┬─► forwarder task ─► SubscriberSet
//!                              └─► Bus::subscribe() (embedders, tests)
//! ```
//!
//! Publishing never blocks the control loop. The ring buffer is shared by all
//! receivers; a receiver that falls behind gets `Lagged(n)` and loses the `n`
//! oldest events. Events published while nobody listens are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable publisher of [`Event`]s.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Bus buffering up to `capacity` events (at least one).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Fire-and-forget publish.
    pub fn publish(&self, ev: Event) {
        // Err only means no receiver is attached.
        let _ = self.tx.send(ev);
    }

    /// Receiver for every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
