//! # Execution context handed to a worker implementation.
//!
//! The context is built by the unit bootstrap and carries everything a run
//! loop may use: its pool name, its unit id, the pre-bound socket (if the
//! pool declared a listen address) and the cooperative stop signal.

use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::listeners::ListeningSocket;
use crate::unit::UnitId;

/// Per-unit execution context.
#[derive(Clone, Debug)]
pub struct WorkerContext {
    worker: Arc<str>,
    unit: UnitId,
    socket: Option<ListeningSocket>,
    stop: CancellationToken,
    user: Option<Arc<str>>,
}

impl WorkerContext {
    pub(crate) fn new(
        worker: Arc<str>,
        unit: UnitId,
        socket: Option<ListeningSocket>,
        stop: CancellationToken,
        user: Option<Arc<str>>,
    ) -> Self {
        Self {
            worker,
            unit,
            socket,
            stop,
            user,
        }
    }

    /// Logical worker (pool) name.
    pub fn worker_name(&self) -> &str {
        &self.worker
    }

    /// Id of the unit running this context.
    pub fn unit_id(&self) -> UnitId {
        self.unit
    }

    /// Pre-bound socket shared with sibling units, if the pool listens.
    pub fn listener(&self) -> Option<&ListeningSocket> {
        self.socket.as_ref()
    }

    /// Configured run-as user of the pool.
    ///
    /// Task-grade units share the supervisor's credentials; the value is
    /// informational for them.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// True once the supervisor has asked this unit to stop.
    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Completes when the supervisor asks this unit to stop.
    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.stop.cancelled()
    }

    /// Stop token, for handing to sub-tasks spawned by the worker.
    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }
}
