//! # Execution-unit abstraction.
//!
//! The supervisor never touches threads, tasks or processes directly. It
//! talks to a [`Launcher`] to create units and to each unit's
//! [`UnitControl`] to observe and stop it:
//!
//! ```text
//! Supervisor ──► Launcher::launch(id, spec, socket) ──► Box<dyn UnitControl>
//!                                                         ├─ poll_exit()     (every tick)
//!                                                         ├─ request_stop()  (cooperative)
//!                                                         └─ force_kill()    (unconditional)
//! ```
//!
//! Bundled launchers: [`TaskLauncher`](super::TaskLauncher) (tokio tasks) and,
//! on unix, [`ProcessLauncher`](super::ProcessLauncher) (child processes).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SpawnError;
use crate::listeners::ListeningSocket;
use crate::workers::WorkerSpec;

/// Supervisor-assigned unit identifier, unique for the supervisor's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(u64);

impl UnitId {
    /// Wraps a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Creates execution units.
///
/// Implementations must not block: `launch` is called from the supervisor's
/// control loop.
pub trait Launcher: Send {
    /// Starts one unit of `spec`, handing it the pool's socket (if any).
    fn launch(
        &mut self,
        id: UnitId,
        spec: &WorkerSpec,
        socket: Option<ListeningSocket>,
    ) -> Result<Box<dyn UnitControl>, SpawnError>;
}

/// Control surface of one running unit.
pub trait UnitControl: Send {
    /// Non-blocking termination check.
    ///
    /// Returns the exit code once the unit has terminated; keeps returning
    /// it on later calls.
    fn poll_exit(&mut self) -> Option<i32>;

    /// Asks the unit to stop. Advisory; may be called more than once.
    fn request_stop(&mut self);

    /// Terminates the unit without its cooperation.
    fn force_kill(&mut self);

    /// OS process id, for units that are processes and still running.
    fn os_pid(&self) -> Option<u32> {
        None
    }
}
