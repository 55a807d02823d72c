//! # WorkerUnit: bootstrap of one task-grade execution unit.
//!
//! ```text
//! WorkerUnit::new(id, name, socket, implementation)
//!     └─► start()
//!           ├─ runtime handle (no runtime → SpawnError::NoRuntime)
//!           ├─ stop token (cancelled by request_stop)
//!           ├─ WorkerContext { name, id, socket, stop, user }
//!           └─ spawn implementation.run(ctx) ──► TaskUnit
//! ```
//!
//! The unit never reports back on its own. The supervisor polls
//! [`TaskUnit::poll_exit`] each tick and maps the run loop's outcome to an
//! exit code:
//!
//! | outcome                      | exit code |
//! |------------------------------|-----------|
//! | `Ok(())` / `Err(Canceled)`   | 0         |
//! | `Err(Exit { code })`         | `code`    |
//! | `Err(Fail { .. })`           | 1         |
//! | panic                        | 255       |
//! | aborted by `force_kill`      | 137       |

use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::launcher::{UnitControl, UnitId};
use crate::error::{EXIT_KILLED, EXIT_OK, EXIT_PANIC, SpawnError, WorkerError};
use crate::listeners::ListeningSocket;
use crate::workers::{WorkerContext, WorkerRef};

/// Everything needed to start one unit.
pub struct WorkerUnit {
    id: UnitId,
    worker: Arc<str>,
    socket: Option<ListeningSocket>,
    implementation: WorkerRef,
    user: Option<Arc<str>>,
}

impl WorkerUnit {
    /// Prepares a unit of pool `worker` running `implementation`.
    pub fn new(
        id: UnitId,
        worker: &str,
        socket: Option<ListeningSocket>,
        implementation: WorkerRef,
    ) -> Self {
        Self {
            id,
            worker: Arc::from(worker),
            socket,
            implementation,
            user: None,
        }
    }

    /// Records the pool's run-as user in the unit context.
    pub fn with_user(mut self, user: Option<&str>) -> Self {
        self.user = user.map(Arc::from);
        self
    }

    /// Spawns the implementation's run loop on the current tokio runtime.
    pub fn start(self) -> Result<TaskUnit, SpawnError> {
        let rt = tokio::runtime::Handle::try_current().map_err(|_| SpawnError::NoRuntime)?;
        let stop = CancellationToken::new();
        let ctx = WorkerContext::new(self.worker, self.id, self.socket, stop.clone(), self.user);
        let implementation = self.implementation;
        let join = rt.spawn(async move { implementation.run(ctx).await });

        Ok(TaskUnit {
            join,
            stop,
            exit: None,
        })
    }
}

/// Handle of a running task-grade unit.
pub struct TaskUnit {
    join: JoinHandle<Result<(), WorkerError>>,
    stop: CancellationToken,
    exit: Option<i32>,
}

impl UnitControl for TaskUnit {
    fn poll_exit(&mut self) -> Option<i32> {
        if self.exit.is_some() {
            return self.exit;
        }
        if !self.join.is_finished() {
            return None;
        }
        let code = match (&mut self.join).now_or_never()? {
            Ok(Ok(())) => EXIT_OK,
            Ok(Err(err)) => err.exit_code(),
            Err(join_err) if join_err.is_panic() => EXIT_PANIC,
            Err(_) => EXIT_KILLED,
        };
        self.exit = Some(code);
        self.exit
    }

    fn request_stop(&mut self) {
        self.stop.cancel();
    }

    fn force_kill(&mut self) {
        self.join.abort();
    }
}
