//! # Execution units.
//!
//! - [`UnitId`] - supervisor-assigned unit identity
//! - [`Launcher`] / [`UnitControl`] - how units are created, observed and stopped
//! - [`WorkerUnit`] / [`TaskUnit`] - task-grade bootstrap and handle
//! - [`TaskLauncher`] - units as tokio tasks
//! - [`ProcessLauncher`] - units as child processes (unix only)

mod bootstrap;
mod launcher;
#[cfg(unix)]
mod process;
mod task;

pub use bootstrap::{TaskUnit, WorkerUnit};
pub use launcher::{Launcher, UnitControl, UnitId};
#[cfg(unix)]
pub use process::{LISTEN_FD_START, ProcessLauncher, ProcessUnit};
pub use task::TaskLauncher;
