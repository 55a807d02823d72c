//! # Cross-platform OS signal handling.
//!
//! Provides [`SignalListener`], which turns OS signals into supervisor
//! [`Command`]s.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal) → shutdown
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes) → shutdown
//! - `SIGQUIT` → shutdown
//! - `SIGHUP`, `SIGUSR1` → rolling restart
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`] → shutdown
//!
//! Handlers are registered when the listener is created, so a registration
//! failure surfaces before the control loop starts.

use super::handle::Command;

/// Registered OS signal streams.
#[cfg(unix)]
pub(crate) struct SignalListener {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
    sighup: tokio::signal::unix::Signal,
    sigusr1: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    /// Registers every handler. Must be called inside a tokio runtime.
    pub(crate) fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
            sighup: signal(SignalKind::hangup())?,
            sigusr1: signal(SignalKind::user_defined1())?,
        })
    }

    /// Waits for the next signal and maps it to a command.
    pub(crate) async fn recv(&mut self) -> Command {
        tokio::select! {
            _ = self.sigint.recv()  => Command::Shutdown,
            _ = self.sigterm.recv() => Command::Shutdown,
            _ = self.sigquit.recv() => Command::Shutdown,
            _ = self.sighup.recv()  => Command::Restart,
            _ = self.sigusr1.recv() => Command::Restart,
        }
    }
}

/// Ctrl-C only.
#[cfg(not(unix))]
pub(crate) struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    pub(crate) fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    pub(crate) async fn recv(&mut self) -> Command {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Command::Shutdown,
            Err(_) => std::future::pending().await,
        }
    }
}
