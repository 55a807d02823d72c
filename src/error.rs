//! Error types used by the poolvisor runtime, launchers and workers.
//!
//! This module defines three main error enums:
//!
//! - [`RuntimeError`]: startup-fatal errors raised by the supervisor itself.
//! - [`SpawnError`]: recoverable failures to start a single worker unit.
//! - [`WorkerError`]: errors returned by a worker implementation's run loop.
//!
//! All of them provide `as_label` for logs/metrics. [`WorkerError`] also maps
//! onto the exit code recorded in the status histogram.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::env::EnvError;

/// Exit code recorded for a unit that returned `Ok(())` or honored a stop request.
pub const EXIT_OK: i32 = 0;
/// Exit code recorded for [`WorkerError::Fail`].
pub const EXIT_FAILURE: i32 = 1;
/// Exit code recorded for a task-grade unit whose run loop panicked.
pub const EXIT_PANIC: i32 = 255;
/// Exit code recorded for a unit terminated by a forced kill (128 + SIGKILL).
pub const EXIT_KILLED: i32 = 137;

/// # Errors that abort supervisor startup.
///
/// None of these can be worker-local: they are raised before any unit exists
/// (or while installing process-wide hooks) and terminate the whole process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A listening socket could not be created.
    #[error("can not create socket {protocol}://{address} for worker '{worker}': {source}")]
    Bind {
        /// Worker name that declared the listen address.
        worker: String,
        /// Transport protocol (`tcp`, `udp`, `unix`).
        protocol: &'static str,
        /// Address as written in the listen URI (without scheme).
        address: String,
        /// OS error.
        #[source]
        source: io::Error,
    },

    /// The environment precondition gate rejected startup.
    #[error("environment check failed: {0}")]
    Environment(#[from] EnvError),

    /// Worker configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// OS signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),

    /// The supervisor was started twice.
    #[error("supervisor already started")]
    AlreadyStarted,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use poolvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::AlreadyStarted.as_label(), "runtime_already_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Bind { .. } => "runtime_bind_failed",
            RuntimeError::Environment(_) => "runtime_environment",
            RuntimeError::Config(_) => "runtime_config",
            RuntimeError::Signals(_) => "runtime_signals",
            RuntimeError::AlreadyStarted => "runtime_already_started",
        }
    }
}

/// # Errors produced while starting a single worker unit.
///
/// Spawn failures are never fatal: the supervisor logs them and retries on
/// the next maintenance tick.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SpawnError {
    /// No implementation is registered under the requested reference.
    #[error("worker '{worker}': no implementation registered as '{implementation}'")]
    UnknownImplementation {
        /// Worker name.
        worker: String,
        /// Implementation reference from the worker spec.
        implementation: String,
    },

    /// Task-grade units need a tokio runtime on the current thread.
    #[error("no tokio runtime available to host the unit")]
    NoRuntime,

    /// The configured run-as user does not exist.
    #[error("unknown user '{0}'")]
    UnknownUser(String),

    /// The OS refused to create the unit.
    #[error("spawn failed: {0}")]
    Io(#[from] io::Error),
}

impl SpawnError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::UnknownImplementation { .. } => "spawn_unknown_implementation",
            SpawnError::NoRuntime => "spawn_no_runtime",
            SpawnError::UnknownUser(_) => "spawn_unknown_user",
            SpawnError::Io(_) => "spawn_io",
        }
    }
}

/// # Errors returned by a worker implementation.
///
/// The supervisor does not diagnose worker failures; it only records the
/// exit code derived from them.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker failed; recorded as exit code [`EXIT_FAILURE`].
    #[error("worker failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Worker requested a specific exit code.
    #[error("worker exited with code {code}")]
    Exit {
        /// Exit code to record.
        code: i32,
    },

    /// Worker observed its stop request and exited; recorded as [`EXIT_OK`].
    #[error("stop requested")]
    Canceled,
}

impl WorkerError {
    /// Builds a [`WorkerError::Fail`] from anything displayable.
    pub fn fail(error: impl std::fmt::Display) -> Self {
        WorkerError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use poolvisor::WorkerError;
    ///
    /// assert_eq!(WorkerError::Canceled.as_label(), "worker_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Fail { .. } => "worker_failed",
            WorkerError::Exit { .. } => "worker_exit",
            WorkerError::Canceled => "worker_canceled",
        }
    }

    /// Exit code recorded in the status histogram for this error.
    ///
    /// # Example
    /// ```
    /// use poolvisor::WorkerError;
    ///
    /// assert_eq!(WorkerError::Exit { code: 3 }.exit_code(), 3);
    /// assert_eq!(WorkerError::fail("boom").exit_code(), 1);
    /// assert_eq!(WorkerError::Canceled.exit_code(), 0);
    /// ```
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkerError::Fail { .. } => EXIT_FAILURE,
            WorkerError::Exit { code } => *code,
            WorkerError::Canceled => EXIT_OK,
        }
    }
}

impl From<io::Error> for WorkerError {
    fn from(err: io::Error) -> Self {
        WorkerError::fail(err)
    }
}
