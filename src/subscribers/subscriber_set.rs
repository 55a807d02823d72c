//! # Fan-out of lifecycle events to subscribers.
//!
//! ```text
//! emit(&Event) ──try_send──► [queue "audit"]   ──► task ──► audit.on_event()
//!              ──try_send──► [queue "metrics"] ──► task ──► metrics.on_event()
//!                  │                                  │
//!                  └─ full/closed ─► Bus: SubscriberOverflow
//!                                                     └─ panic ─► Bus: SubscriberPanicked
//! ```
//!
//! ## Rules
//! - `emit` never waits; a full queue drops the event for that subscriber only
//! - each subscriber sees its events in emit order; no ordering across subscribers
//! - a panicking `on_event` is caught, reported, and the task keeps consuming
//! - an overflow event is never re-reported when it overflows itself
//!
//! Panics are caught through `AssertUnwindSafe`: a subscriber that panics
//! while holding a lock may leave that state poisoned.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Queue {
    subscriber: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Subscribers with their queues and consumer tasks.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    consumers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Starts one consumer task per subscriber. Needs a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (queues, consumers) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let queue = Queue {
                    subscriber: sub.name(),
                    tx,
                };
                (queue, tokio::spawn(consume(sub, rx, bus.clone())))
            })
            .unzip();

        Self {
            queues,
            consumers,
            bus,
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// True without subscribers.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Queues `event` for every subscriber.
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Queues an already shared event for every subscriber.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let report = event.kind != EventKind::SubscriberOverflow;
        for queue in &self.queues {
            let reason = match queue.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if report {
                self.bus
                    .publish(Event::subscriber_overflow(queue.subscriber, reason));
            }
        }
    }

    /// Closes the queues and waits until every consumer drained its backlog.
    pub async fn shutdown(self) {
        drop(self.queues);
        for consumer in self.consumers {
            let _ = consumer.await;
        }
    }
}

async fn consume(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let delivered = AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await;
        if let Err(payload) = delivered {
            let message = panic_message(payload.as_ref());
            warn!(subscriber = sub.name(), event = ev.kind.as_label(), panic = %message, "subscriber panicked");
            bus.publish(Event::subscriber_panicked(sub.name(), message));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
