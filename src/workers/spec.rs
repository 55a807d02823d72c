//! # Worker specification.
//!
//! A [`WorkerSpec`] declares one pool: its logical name, optional listen
//! address, how many units to keep running, which implementation each unit
//! runs, and an optional user to run as. Specs are immutable once loaded.

use crate::listeners::{ListenAddr, ListenAddrError};

/// Declaration of a worker pool.
///
/// ## Example
/// ```
/// use poolvisor::WorkerSpec;
///
/// let spec = WorkerSpec::new("echo", "echo", 4)
///     .with_listen("tcp://0.0.0.0:1234")
///     .unwrap();
/// assert_eq!(spec.desired_count, 4);
/// assert_eq!(spec.listen.unwrap().protocol(), "tcp");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerSpec {
    /// Logical worker name, unique across the configuration.
    pub name: String,
    /// Address the pool accepts traffic on (`None` = no socket).
    pub listen: Option<ListenAddr>,
    /// Number of units to keep running (≥ 1).
    pub desired_count: usize,
    /// Implementation reference: a catalog key for task units, an executable
    /// path for process units.
    pub implementation: String,
    /// Optional user the units should run as.
    pub user: Option<String>,
}

impl WorkerSpec {
    /// Creates a spec without listen address or user.
    pub fn new(
        name: impl Into<String>,
        implementation: impl Into<String>,
        desired_count: usize,
    ) -> Self {
        Self {
            name: name.into(),
            listen: None,
            desired_count,
            implementation: implementation.into(),
            user: None,
        }
    }

    /// Returns the spec with a listen address parsed from `uri`.
    pub fn with_listen(mut self, uri: &str) -> Result<Self, ListenAddrError> {
        self.listen = Some(ListenAddr::parse(uri)?);
        Ok(self)
    }

    /// Returns the spec with a run-as user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}
