use std::sync::Arc;

use super::supervisor::{Parts, Supervisor};
use crate::{
    config::{ConfigProvider, StaticConfig, SupervisorConfig},
    env::{EnvironmentCheck, LimitsCheck},
    status::{FileStatusStore, MemoryStatusStore, StatusStore},
    subscribers::Subscribe,
    unit::{Launcher, TaskLauncher},
    workers::{WorkerCatalog, WorkerSpec},
};

/// Builder for constructing a [`Supervisor`] with its collaborators.
///
/// Every collaborator has a default:
/// - workers: none (startup then fails the environment check)
/// - environment check: [`LimitsCheck::from_config`]
/// - launcher: [`TaskLauncher`] over [`WorkerCatalog::with_builtins`]
/// - status store: [`FileStatusStore`] when `status_file` is set, else [`MemoryStatusStore`]
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    config: Option<Box<dyn ConfigProvider>>,
    env_check: Option<Box<dyn EnvironmentCheck>>,
    launcher: Option<Box<dyn Launcher>>,
    status: Option<Box<dyn StatusStore>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            config: None,
            env_check: None,
            launcher: None,
            status: None,
            subscribers: Vec::new(),
        }
    }

    /// Supervises a fixed list of workers.
    pub fn with_workers(self, specs: Vec<WorkerSpec>) -> Self {
        self.with_config_provider(StaticConfig::new(specs))
    }

    /// Loads the workers from `provider` at startup.
    pub fn with_config_provider(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.config = Some(Box::new(provider));
        self
    }

    /// Replaces the startup environment check.
    pub fn with_environment_check(mut self, check: impl EnvironmentCheck + 'static) -> Self {
        self.env_check = Some(Box::new(check));
        self
    }

    /// Sets how units are started (in-runtime tasks or child processes).
    pub fn with_launcher(mut self, launcher: impl Launcher + 'static) -> Self {
        self.launcher = Some(Box::new(launcher));
        self
    }

    /// Sets where status snapshots are written.
    pub fn with_status_store(mut self, store: impl StatusStore + 'static) -> Self {
        self.status = Some(Box::new(store));
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (spawn, exit, restart, shutdown)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the Supervisor. Nothing is bound or spawned until
    /// [`Supervisor::start`] / [`Supervisor::run`].
    pub fn build(self) -> Supervisor {
        let status: Box<dyn StatusStore> = match (self.status, &self.cfg.status_file) {
            (Some(store), _) => store,
            (None, Some(path)) => Box::new(FileStatusStore::new(path.clone())),
            (None, None) => Box::new(MemoryStatusStore::new()),
        };
        let parts = Parts {
            config: self
                .config
                .unwrap_or_else(|| Box::new(StaticConfig::default())),
            env_check: self
                .env_check
                .unwrap_or_else(|| Box::new(LimitsCheck::from_config(&self.cfg))),
            launcher: self
                .launcher
                .unwrap_or_else(|| Box::new(TaskLauncher::new(WorkerCatalog::with_builtins()))),
            status,
            subscribers: self.subscribers,
        };
        Supervisor::new_internal(self.cfg, parts)
    }
}
