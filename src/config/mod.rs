//! # Configuration.
//!
//! - [`SupervisorConfig`] - runtime settings (tick, grace window, limits, status file)
//! - [`ConfigProvider`] - source of [`WorkerSpec`](crate::WorkerSpec)s
//! - [`TomlConfig`] / [`StaticConfig`] - bundled providers
//! - [`ConfigError`] - load/parse/validation failures

mod error;
mod provider;
mod supervisor;

pub use error::ConfigError;
pub use provider::{ConfigProvider, StaticConfig, SupervisorSection, TomlConfig, WorkerEntry};
pub use supervisor::{
    DEFAULT_GRACE_WINDOW, DEFAULT_MAX_UNITS, DEFAULT_TICK_INTERVAL, SupervisorConfig,
};
