//! Listening sockets: address parsing, binding, shared handles.
//!
//! - [`ListenAddr`] parsed `tcp://`, `udp://`, `unix://` URIs
//! - [`ListenerBinder`] binds one socket per pool before any unit is spawned
//! - [`ListeningSocket`] cheap-to-clone handle shared by sibling units

mod addr;
mod binder;
mod socket;

pub use addr::{ListenAddr, ListenAddrError};
pub use binder::{ListenerBinder, ListenerSet};
pub use socket::ListeningSocket;
