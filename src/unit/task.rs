//! # Task-grade launcher.
//!
//! Units are tokio tasks running a [`Worker`](crate::Worker) resolved from a
//! [`WorkerCatalog`]. Cooperative stop cancels the unit's token; forced kill
//! aborts the task at its next await point.

use tracing::debug;

use super::bootstrap::WorkerUnit;
use super::launcher::{Launcher, UnitControl, UnitId};
use crate::error::SpawnError;
use crate::listeners::ListeningSocket;
use crate::workers::{WorkerCatalog, WorkerSpec};

/// Launches units as tokio tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskLauncher {
    catalog: WorkerCatalog,
}

impl TaskLauncher {
    /// Creates a launcher resolving implementations from `catalog`.
    pub fn new(catalog: WorkerCatalog) -> Self {
        Self { catalog }
    }

    /// Catalog used to resolve implementation references.
    pub fn catalog(&self) -> &WorkerCatalog {
        &self.catalog
    }
}

impl Launcher for TaskLauncher {
    fn launch(
        &mut self,
        id: UnitId,
        spec: &WorkerSpec,
        socket: Option<ListeningSocket>,
    ) -> Result<Box<dyn UnitControl>, SpawnError> {
        let implementation = self.catalog.resolve(&spec.implementation).ok_or_else(|| {
            SpawnError::UnknownImplementation {
                worker: spec.name.clone(),
                implementation: spec.implementation.clone(),
            }
        })?;

        let unit = WorkerUnit::new(id, &spec.name, socket, implementation)
            .with_user(spec.user.as_deref())
            .start()?;
        debug!(worker = %spec.name, unit = %id, "task unit started");
        Ok(Box::new(unit))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::{EXIT_FAILURE, EXIT_KILLED, EXIT_OK, EXIT_PANIC, WorkerError};
    use crate::workers::{WorkerContext, WorkerFn, WorkerRef};

    async fn wait_exit(unit: &mut Box<dyn UnitControl>) -> i32 {
        for _ in 0..200 {
            if let Some(code) = unit.poll_exit() {
                return code;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("unit did not terminate");
    }

    fn launcher_with(name: &str, worker: WorkerRef) -> TaskLauncher {
        let mut catalog = WorkerCatalog::new();
        catalog.register(name, worker);
        TaskLauncher::new(catalog)
    }

    #[tokio::test]
    async fn test_stop_request_is_observed() {
        let mut launcher = launcher_with(
            "idle",
            WorkerFn::arc(|ctx: WorkerContext| async move {
                ctx.stopped().await;
                Ok::<_, WorkerError>(())
            }),
        );
        let spec = WorkerSpec::new("idle", "idle", 1);
        let mut unit = launcher.launch(UnitId::new(1), &spec, None).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(unit.poll_exit(), None);

        unit.request_stop();
        assert_eq!(wait_exit(&mut unit).await, EXIT_OK);
        // Result is cached after the first observation.
        assert_eq!(unit.poll_exit(), Some(EXIT_OK));
    }

    #[tokio::test]
    async fn test_force_kill_aborts_stubborn_unit() {
        let mut launcher = launcher_with(
            "stubborn",
            WorkerFn::arc(|_ctx: WorkerContext| async move {
                std::future::pending::<()>().await;
                Ok::<_, WorkerError>(())
            }),
        );
        let spec = WorkerSpec::new("stubborn", "stubborn", 1);
        let mut unit = launcher.launch(UnitId::new(7), &spec, None).unwrap();

        unit.request_stop();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(unit.poll_exit(), None);

        unit.force_kill();
        assert_eq!(wait_exit(&mut unit).await, EXIT_KILLED);
    }

    #[tokio::test]
    async fn test_exit_codes_follow_worker_result() {
        let mut launcher = TaskLauncher::new(
            WorkerCatalog::new()
                .with("exit3", WorkerFn::arc(|_ctx: WorkerContext| async move {
                    Err::<(), _>(WorkerError::Exit { code: 3 })
                }))
                .with("fail", WorkerFn::arc(|_ctx: WorkerContext| async move {
                    Err::<(), _>(WorkerError::fail("boom"))
                }))
                .with("panic", WorkerFn::arc(|_ctx: WorkerContext| async move {
                    if true {
                        panic!("worker blew up");
                    }
                    Ok::<_, WorkerError>(())
                })),
        );

        for (implementation, expected) in [("exit3", 3), ("fail", EXIT_FAILURE), ("panic", EXIT_PANIC)] {
            let spec = WorkerSpec::new(implementation, implementation, 1);
            let mut unit = launcher.launch(UnitId::new(1), &spec, None).unwrap();
            assert_eq!(wait_exit(&mut unit).await, expected, "{implementation}");
        }
    }

    #[tokio::test]
    async fn test_unknown_implementation_is_spawn_error() {
        let mut launcher = TaskLauncher::new(WorkerCatalog::new());
        let spec = WorkerSpec::new("echo", "missing", 1);
        let err = launcher.launch(UnitId::new(1), &spec, None).err().unwrap();
        assert_eq!(err.as_label(), "spawn_unknown_implementation");
    }

    #[test]
    fn test_launch_outside_runtime_fails() {
        let mut launcher = launcher_with(
            "idle",
            WorkerFn::arc(|_ctx: WorkerContext| async move { Ok::<_, WorkerError>(()) }),
        );
        let spec = WorkerSpec::new("idle", "idle", 1);
        let err = launcher.launch(UnitId::new(1), &spec, None).err().unwrap();
        assert!(matches!(err, SpawnError::NoRuntime));
    }

    #[tokio::test]
    async fn test_context_carries_socket_and_identity() {
        let seen = Arc::new(AtomicBool::new(false));
        let flag = seen.clone();
        let mut launcher = launcher_with(
            "probe",
            WorkerFn::arc(move |ctx: WorkerContext| {
                let flag = flag.clone();
                async move {
                    let ok = ctx.worker_name() == "probe"
                        && ctx.unit_id() == UnitId::new(42)
                        && ctx.listener().is_some_and(|s| s.protocol() == "tcp")
                        && ctx.user() == Some("nobody");
                    flag.store(ok, Ordering::SeqCst);
                    Ok::<_, WorkerError>(())
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let socket = ListeningSocket::Tcp(Arc::new(listener));
        let spec = WorkerSpec::new("probe", "probe", 1).with_user("nobody");

        let mut unit = launcher.launch(UnitId::new(42), &spec, Some(socket)).unwrap();
        assert_eq!(wait_exit(&mut unit).await, EXIT_OK);
        assert!(seen.load(Ordering::SeqCst));
    }
}
