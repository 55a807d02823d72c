//! # Lifecycle event sinks.
//!
//! Implement [`Subscribe`] to observe pools from outside the control loop:
//! count crashes, export metrics, page on force-kills. Every subscriber is
//! driven by its own task fed from a bounded queue (see
//! [`SubscriberSet`](crate::SubscriberSet)), so a slow or panicking
//! subscriber never delays a tick.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! use async_trait::async_trait;
//! use poolvisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct ForceKills(AtomicU64);
//!
//! #[async_trait]
//! impl Subscribe for ForceKills {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::UnitForceKilled {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "force-kills"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receives supervisor events on a dedicated task.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Events arrive in publish order.
    async fn on_event(&self, event: &Event);

    /// Name reported in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue depth before events are dropped for this subscriber (min 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
