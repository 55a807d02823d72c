//! # Status snapshot.
//!
//! The record an operator reads to see what the supervisor is doing:
//!
//! ```text
//! {
//!   "start_time": 1760000000,
//!   "exit_histogram": { "echo": { "0": 12, "137": 1 } },
//!   "pid_map":        { "echo": [5, 6, 7, 8] }
//! }
//! ```
//!
//! Rewritten in full on every tick; never appended to.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::unit::UnitId;

/// Point-in-time view of the supervised pools.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Supervisor start, seconds since the Unix epoch.
    pub start_time: u64,
    /// `worker name → exit code → count` of every observed termination.
    #[serde(default)]
    pub exit_histogram: BTreeMap<String, BTreeMap<i32, u64>>,
    /// `worker name → live unit ids`.
    #[serde(default)]
    pub pid_map: BTreeMap<String, BTreeSet<UnitId>>,
}

impl StatusSnapshot {
    /// Empty snapshot stamped with the current wall-clock time.
    pub fn started_now() -> Self {
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            start_time,
            ..Self::default()
        }
    }

    /// Counts one termination of a `worker` unit with `code`.
    pub fn record_exit(&mut self, worker: &str, code: i32) {
        *self
            .exit_histogram
            .entry(worker.to_string())
            .or_default()
            .entry(code)
            .or_insert(0) += 1;
    }

    /// Number of terminations of `worker` units with `code`.
    pub fn exits(&self, worker: &str, code: i32) -> u64 {
        self.exit_histogram
            .get(worker)
            .and_then(|codes| codes.get(&code))
            .copied()
            .unwrap_or(0)
    }

    /// Total terminations of `worker` units.
    pub fn total_exits(&self, worker: &str) -> u64 {
        self.exit_histogram
            .get(worker)
            .map(|codes| codes.values().sum())
            .unwrap_or(0)
    }

    /// Replaces the live unit set of `worker`.
    pub fn set_units(&mut self, worker: &str, units: impl IntoIterator<Item = UnitId>) {
        self.pid_map
            .insert(worker.to_string(), units.into_iter().collect());
    }

    /// Live unit ids of `worker`.
    pub fn units(&self, worker: &str) -> Option<&BTreeSet<UnitId>> {
        self.pid_map.get(worker)
    }
}
