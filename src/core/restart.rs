//! # Rolling-restart queue.
//!
//! Units waiting to be restarted, in spawn order. An entry is either still
//! `Pending` (not yet told to stop) or `Signaled` (stop sent, force-kill
//! armed). Entries leave the queue when their unit is reaped or its
//! force-kill fires.

use std::collections::BTreeMap;

use tokio::time::Instant;

use super::scheduler::DeferredId;
use crate::unit::UnitId;

/// Progress of one queued unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartEntry {
    /// Waiting for its turn.
    Pending,
    /// Stop requested at `at`; `force_kill` fires after the grace window.
    Signaled {
        /// When the stop was sent.
        at: Instant,
        /// Deferred force-kill armed for this unit.
        force_kill: DeferredId,
    },
}

/// Units scheduled for rolling restart, keyed and iterated by unit id.
#[derive(Debug, Default)]
pub(crate) struct RestartQueue {
    entries: BTreeMap<UnitId, RestartEntry>,
}

impl RestartQueue {
    /// Queues `unit` as pending. Returns `false` if it is already queued.
    pub(crate) fn enqueue(&mut self, unit: UnitId) -> bool {
        if self.entries.contains_key(&unit) {
            return false;
        }
        self.entries.insert(unit, RestartEntry::Pending);
        true
    }

    /// Lowest-id entry that has not been signaled yet.
    pub(crate) fn next_pending(&self) -> Option<UnitId> {
        self.entries
            .iter()
            .find(|(_, entry)| matches!(entry, RestartEntry::Pending))
            .map(|(id, _)| *id)
    }

    /// Records that `unit` was told to stop.
    pub(crate) fn mark_signaled(&mut self, unit: UnitId, at: Instant, force_kill: DeferredId) {
        self.entries
            .insert(unit, RestartEntry::Signaled { at, force_kill });
    }

    /// Drops `unit` from the queue.
    pub(crate) fn remove(&mut self, unit: UnitId) -> Option<RestartEntry> {
        self.entries.remove(&unit)
    }

    /// Empties the queue, returning the force-kills armed for signaled units.
    pub(crate) fn clear(&mut self) -> Vec<DeferredId> {
        std::mem::take(&mut self.entries)
            .into_values()
            .filter_map(|entry| match entry {
                RestartEntry::Signaled { force_kill, .. } => Some(force_kill),
                RestartEntry::Pending => None,
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, unit: UnitId) -> Option<&RestartEntry> {
        self.entries.get(&unit)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
