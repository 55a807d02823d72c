//! # Cross-task control of a running supervisor.
//!
//! [`SupervisorHandle`] is a cheap, cloneable sender. Requests are queued
//! and applied by the control loop at the start of its next tick, so all
//! supervisor state is still mutated from one place.

use tokio::sync::mpsc;

/// Administrative request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Rolling restart of every running unit.
    Restart,
    /// Stop every unit and return from the control loop.
    Shutdown,
}

/// Sends administrative requests to a [`Supervisor`](crate::Supervisor).
#[derive(Clone, Debug)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SupervisorHandle {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Requests a rolling restart. Returns `false` if the supervisor is gone.
    pub fn request_restart(&self) -> bool {
        self.send(Command::Restart)
    }

    /// Requests shutdown. Returns `false` if the supervisor is gone.
    pub fn request_shutdown(&self) -> bool {
        self.send(Command::Shutdown)
    }

    /// Sends a raw command.
    pub fn send(&self, cmd: Command) -> bool {
        self.tx.send(cmd).is_ok()
    }
}
