//! # Worker configuration sources.
//!
//! The supervisor reads its worker specs through [`ConfigProvider`]. Two
//! providers ship with the crate:
//!
//! - [`StaticConfig`] - specs built in code
//! - [`TomlConfig`] - specs loaded from a TOML file
//!
//! ## TOML layout
//! ```toml
//! [supervisor]            # optional, overrides SupervisorConfig defaults
//! tick_interval_ms = 100
//! grace_window_ms = 4000
//! status_file = "/run/poolvisor/status.json"
//! max_units = 5000
//! min_open_files = 10000
//!
//! [[worker]]
//! name = "echo"
//! listen = "tcp://0.0.0.0:1234"
//! start_workers = 4
//! worker_file = "echo"
//! user = "nobody"          # optional
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::supervisor::SupervisorConfig;
use crate::workers::WorkerSpec;

/// Source of worker specifications.
pub trait ConfigProvider: Send + Sync {
    /// Returns the ordered, validated list of worker specs.
    fn workers(&self) -> Result<Vec<WorkerSpec>, ConfigError>;
}

/// Specs supplied directly by the embedding program.
#[derive(Clone, Debug, Default)]
pub struct StaticConfig {
    specs: Vec<WorkerSpec>,
}

impl StaticConfig {
    /// Wraps a list of specs.
    pub fn new(specs: Vec<WorkerSpec>) -> Self {
        Self { specs }
    }
}

impl ConfigProvider for StaticConfig {
    fn workers(&self) -> Result<Vec<WorkerSpec>, ConfigError> {
        Ok(self.specs.clone())
    }
}

/// `[supervisor]` table. Every key is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorSection {
    /// Control-loop period in milliseconds.
    pub tick_interval_ms: Option<u64>,
    /// Grace window in milliseconds.
    pub grace_window_ms: Option<u64>,
    /// Event bus capacity.
    pub bus_capacity: Option<usize>,
    /// Status snapshot destination.
    pub status_file: Option<PathBuf>,
    /// Total unit limit (`0` = unlimited).
    pub max_units: Option<usize>,
    /// Required open-files soft limit.
    pub min_open_files: Option<u64>,
    /// Whether to install OS signal handlers.
    pub handle_signals: Option<bool>,
}

impl SupervisorSection {
    /// Overlays the keys present in this table onto `cfg`.
    pub fn apply(&self, cfg: &mut SupervisorConfig) {
        if let Some(ms) = self.tick_interval_ms {
            cfg.tick_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.grace_window_ms {
            cfg.grace_window = Duration::from_millis(ms);
        }
        if let Some(cap) = self.bus_capacity {
            cfg.bus_capacity = cap;
        }
        if let Some(path) = &self.status_file {
            cfg.status_file = Some(path.clone());
        }
        if let Some(max) = self.max_units {
            cfg.max_units = max;
        }
        if self.min_open_files.is_some() {
            cfg.min_open_files = self.min_open_files;
        }
        if let Some(on) = self.handle_signals {
            cfg.handle_signals = on;
        }
    }
}

/// One `[[worker]]` entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerEntry {
    /// Logical worker name.
    pub name: String,
    /// Listen URI (`tcp://`, `udp://`, `unix://`).
    #[serde(default)]
    pub listen: Option<String>,
    /// Pool size.
    #[serde(default = "default_start_workers")]
    pub start_workers: usize,
    /// Implementation reference (catalog key or executable path).
    pub worker_file: String,
    /// Run-as user.
    #[serde(default)]
    pub user: Option<String>,
}

fn default_start_workers() -> usize {
    1
}

impl WorkerEntry {
    fn to_spec(&self) -> Result<WorkerSpec, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                worker: self.name.clone(),
                reason: "name must not be empty",
            });
        }
        if self.start_workers == 0 {
            return Err(ConfigError::Invalid {
                worker: self.name.clone(),
                reason: "start_workers must be at least 1",
            });
        }
        if self.worker_file.trim().is_empty() {
            return Err(ConfigError::Invalid {
                worker: self.name.clone(),
                reason: "worker_file must not be empty",
            });
        }

        let mut spec = WorkerSpec::new(&self.name, &self.worker_file, self.start_workers);
        if let Some(uri) = &self.listen {
            spec = spec.with_listen(uri).map_err(|source| ConfigError::Listen {
                worker: self.name.clone(),
                source,
            })?;
        }
        if let Some(user) = &self.user {
            spec = spec.with_user(user);
        }
        Ok(spec)
    }
}

/// Parsed TOML configuration file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Supervisor overrides.
    #[serde(default)]
    pub supervisor: SupervisorSection,
    /// Worker declarations, in file order.
    #[serde(default, rename = "worker")]
    pub workers: Vec<WorkerEntry>,
}

impl TomlConfig {
    /// Reads and parses `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parses TOML text; `origin` labels errors.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Defaults with the `[supervisor]` table applied.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        let mut cfg = SupervisorConfig::default();
        self.supervisor.apply(&mut cfg);
        cfg
    }
}

impl ConfigProvider for TomlConfig {
    fn workers(&self) -> Result<Vec<WorkerSpec>, ConfigError> {
        self.workers.iter().map(WorkerEntry::to_spec).collect()
    }
}
