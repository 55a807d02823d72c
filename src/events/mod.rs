//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the supervisor and the
//! subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor` (every state transition and unit
//!   observation), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the supervisor's event forwarder (fans out to
//!   `SubscriberSet`) and any receiver obtained from [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
