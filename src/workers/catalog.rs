//! # Registry of worker implementations.
//!
//! Task-grade units resolve a spec's `implementation` reference here when
//! they are spawned. A missing entry is a spawn failure, not a startup
//! failure: the pool stays short and the supervisor retries every tick.

use std::collections::HashMap;
use std::sync::Arc;

use super::builtin::EchoWorker;
use super::worker::{Worker, WorkerRef};

/// Implementation references → worker implementations.
#[derive(Clone, Default)]
pub struct WorkerCatalog {
    workers: HashMap<String, WorkerRef>,
}

impl WorkerCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with the bundled implementations (`echo`).
    pub fn with_builtins() -> Self {
        Self::new().with("echo", Arc::new(EchoWorker))
    }

    /// Registers `worker` under `implementation`, replacing any previous entry.
    pub fn register(&mut self, implementation: impl Into<String>, worker: WorkerRef) -> &mut Self {
        self.workers.insert(implementation.into(), worker);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, implementation: impl Into<String>, worker: Arc<impl Worker>) -> Self {
        self.workers.insert(implementation.into(), worker);
        self
    }

    /// Resolves an implementation reference.
    pub fn resolve(&self, implementation: &str) -> Option<WorkerRef> {
        self.workers.get(implementation).cloned()
    }

    /// True if `implementation` is registered.
    pub fn contains(&self, implementation: &str) -> bool {
        self.workers.contains_key(implementation)
    }

    /// Sorted list of registered implementation references.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workers.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for WorkerCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerCatalog")
            .field("workers", &self.names())
            .finish()
    }
}
