//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out used to deliver runtime events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ```text
//! Supervisor ── publish(Event) ──► Bus ──► forwarder ──► SubscriberSet
//!                                                          ├──► metrics
//!                                                          ├──► audit
//!                                                          └──► ...
//! ```
//!
//! The supervisor logs through `tracing` on its own; subscribers are for
//! everything else an embedder wants to hang off unit lifecycle events.

mod subscriber;
mod subscriber_set;

pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
