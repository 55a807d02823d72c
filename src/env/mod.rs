//! # Environment precondition gate.
//!
//! Runs once, before any socket is bound or unit spawned. A failure aborts
//! startup with [`RuntimeError::Environment`](crate::RuntimeError::Environment).
//!
//! [`LimitsCheck`] (the default) verifies:
//! - at least one worker is declared
//! - worker names are unique and pools are non-empty
//! - the total unit count fits `max_units`
//! - the open-files soft limit is at least `min_open_files` (unix, when set)

use std::collections::HashSet;
use std::io;

use thiserror::Error;

use crate::config::SupervisorConfig;
use crate::workers::WorkerSpec;

/// # Environment check failures.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EnvError {
    /// Nothing to supervise.
    #[error("no workers configured")]
    NoWorkers,

    /// Two specs share a name.
    #[error("duplicate worker name '{0}'")]
    DuplicateName(String),

    /// A spec asks for zero units.
    #[error("worker '{0}' has an empty pool")]
    EmptyPool(String),

    /// Total pool sizes exceed the configured cap.
    #[error("{total} units requested, limit is {max}")]
    TooManyUnits {
        /// Sum of all `desired_count`s.
        total: usize,
        /// Configured `max_units`.
        max: usize,
    },

    /// `RLIMIT_NOFILE` soft limit is too low.
    #[error("open files limit is {current}, need at least {required}")]
    OpenFilesLimit {
        /// Current soft limit.
        current: u64,
        /// Configured `min_open_files`.
        required: u64,
    },

    /// The limit could not be queried.
    #[error("can not query resource limits: {0}")]
    Rlimit(#[source] io::Error),
}

impl EnvError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EnvError::NoWorkers => "env_no_workers",
            EnvError::DuplicateName(_) => "env_duplicate_name",
            EnvError::EmptyPool(_) => "env_empty_pool",
            EnvError::TooManyUnits { .. } => "env_too_many_units",
            EnvError::OpenFilesLimit { .. } => "env_open_files_limit",
            EnvError::Rlimit(_) => "env_rlimit",
        }
    }
}

/// Startup precondition check.
pub trait EnvironmentCheck: Send + Sync {
    /// Validates the environment for the given specs.
    fn check(&self, specs: &[WorkerSpec]) -> Result<(), EnvError>;
}

/// Structural and resource-limit checks.
#[derive(Clone, Debug, Default)]
pub struct LimitsCheck {
    max_units: Option<usize>,
    min_open_files: Option<u64>,
}

impl LimitsCheck {
    /// Creates a check with explicit limits.
    pub fn new(max_units: Option<usize>, min_open_files: Option<u64>) -> Self {
        Self {
            max_units,
            min_open_files,
        }
    }

    /// Takes its limits from the supervisor configuration.
    pub fn from_config(cfg: &SupervisorConfig) -> Self {
        Self::new(cfg.unit_limit(), cfg.min_open_files)
    }
}

impl EnvironmentCheck for LimitsCheck {
    fn check(&self, specs: &[WorkerSpec]) -> Result<(), EnvError> {
        if specs.is_empty() {
            return Err(EnvError::NoWorkers);
        }

        let mut seen = HashSet::with_capacity(specs.len());
        for spec in specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(EnvError::DuplicateName(spec.name.clone()));
            }
            if spec.desired_count == 0 {
                return Err(EnvError::EmptyPool(spec.name.clone()));
            }
        }

        let total = specs
            .iter()
            .fold(0usize, |acc, s| acc.saturating_add(s.desired_count));
        match self.max_units {
            Some(max) if total > max => return Err(EnvError::TooManyUnits { total, max }),
            _ => {}
        }

        if let Some(required) = self.min_open_files {
            let current = open_files_limit()?;
            if current < required {
                return Err(EnvError::OpenFilesLimit { current, required });
            }
        }
        Ok(())
    }
}

/// Current `RLIMIT_NOFILE` soft limit.
#[cfg(unix)]
pub fn open_files_limit() -> Result<u64, EnvError> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit writes into the struct we own.
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) } != 0 {
        return Err(EnvError::Rlimit(io::Error::last_os_error()));
    }
    Ok(limit.rlim_cur as u64)
}

/// Open-files limits are not enforced off unix.
#[cfg(not(unix))]
pub fn open_files_limit() -> Result<u64, EnvError> {
    Ok(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, count: usize) -> WorkerSpec {
        WorkerSpec::new(name, "echo", count)
    }

    #[test]
    fn test_accepts_valid_specs() {
        let check = LimitsCheck::new(Some(10), None);
        assert!(check.check(&[spec("a", 4), spec("b", 6)]).is_ok());
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        let check = LimitsCheck::default();
        assert!(matches!(check.check(&[]), Err(EnvError::NoWorkers)));
        assert!(matches!(
            check.check(&[spec("a", 1), spec("a", 2)]),
            Err(EnvError::DuplicateName(n)) if n == "a"
        ));
        assert!(matches!(
            check.check(&[spec("a", 0)]),
            Err(EnvError::EmptyPool(n)) if n == "a"
        ));
    }

    #[test]
    fn test_total_unit_limit() {
        let check = LimitsCheck::from_config(&SupervisorConfig {
            max_units: 5,
            ..SupervisorConfig::default()
        });
        let err = check.check(&[spec("a", 3), spec("b", 3)]).unwrap_err();
        assert!(matches!(err, EnvError::TooManyUnits { total: 6, max: 5 }));
        assert_eq!(err.as_label(), "env_too_many_units");
    }

    #[test]
    fn test_huge_pools_do_not_wrap_past_the_limit() {
        let check = LimitsCheck::new(Some(5000), None);
        let half = usize::MAX / 2 + 1;
        let err = check
            .check(&[spec("a", half), spec("b", half), spec("c", 2)])
            .unwrap_err();
        assert!(matches!(
            err,
            EnvError::TooManyUnits { total: usize::MAX, max: 5000 }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_open_files_limit() {
        let current = open_files_limit().unwrap();
        assert!(current > 0);

        let ok = LimitsCheck::new(None, Some(1));
        assert!(ok.check(&[spec("a", 1)]).is_ok());

        if current < u64::MAX {
            let too_high = LimitsCheck::new(None, Some(current + 1));
            assert!(matches!(
                too_high.check(&[spec("a", 1)]),
                Err(EnvError::OpenFilesLimit { .. })
            ));
        }
    }
}
