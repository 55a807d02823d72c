use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::listeners::ListenAddrError;

/// # Errors raised while loading worker configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("can not read config {}: {source}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// OS error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML or does not match the schema.
    #[error("can not parse config {origin}: {source}")]
    Parse {
        /// File path or other origin label.
        origin: String,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },

    /// A worker declared an unparseable listen address.
    #[error("worker '{worker}': {source}")]
    Listen {
        /// Worker name.
        worker: String,
        /// Address error.
        #[source]
        source: ListenAddrError,
    },

    /// A worker field holds an unusable value.
    #[error("worker '{worker}': {reason}")]
    Invalid {
        /// Worker name (may be empty if the name itself is the problem).
        worker: String,
        /// What is wrong.
        reason: &'static str,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse { .. } => "config_parse",
            ConfigError::Listen { .. } => "config_listen",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}
