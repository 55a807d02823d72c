//! # Worker pools.
//!
//! `worker name → (UnitId → UnitHandle)`. A handle lives here from the
//! moment its unit is launched until the supervisor observes its
//! termination.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::unit::{UnitControl, UnitId};

/// A live unit owned by its pool.
pub(crate) struct UnitHandle {
    pub(crate) id: UnitId,
    pub(crate) worker: Arc<str>,
    pub(crate) control: Box<dyn UnitControl>,
}

/// A terminated unit removed from its pool.
#[derive(Debug)]
pub(crate) struct Reaped {
    pub(crate) id: UnitId,
    pub(crate) worker: Arc<str>,
    pub(crate) code: i32,
}

#[derive(Default)]
pub(crate) struct WorkerPools {
    pools: BTreeMap<Arc<str>, BTreeMap<UnitId, UnitHandle>>,
}

impl WorkerPools {
    /// Registers an (initially empty) pool.
    pub(crate) fn declare(&mut self, worker: &str) {
        self.pools.entry(Arc::from(worker)).or_default();
    }

    pub(crate) fn insert(&mut self, handle: UnitHandle) {
        self.pools
            .entry(Arc::clone(&handle.worker))
            .or_default()
            .insert(handle.id, handle);
    }

    /// Live units of `worker`.
    pub(crate) fn count(&self, worker: &str) -> usize {
        self.pools.get(worker).map_or(0, BTreeMap::len)
    }

    /// Live units across all pools.
    pub(crate) fn total(&self) -> usize {
        self.pools.values().map(BTreeMap::len).sum()
    }

    pub(crate) fn ids(&self, worker: &str) -> Vec<UnitId> {
        self.pools
            .get(worker)
            .map(|units| units.keys().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn all_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.pools.values().flat_map(|u| u.keys().copied()).collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn get_mut(&mut self, id: UnitId) -> Option<&mut UnitHandle> {
        self.pools.values_mut().find_map(|units| units.get_mut(&id))
    }

    pub(crate) fn handles_mut(&mut self) -> impl Iterator<Item = &mut UnitHandle> {
        self.pools.values_mut().flat_map(|units| units.values_mut())
    }

    /// Polls every unit once and removes the terminated ones.
    pub(crate) fn reap(&mut self) -> Vec<Reaped> {
        let mut reaped = Vec::new();
        for units in self.pools.values_mut() {
            units.retain(|_, handle| match handle.control.poll_exit() {
                Some(code) => {
                    reaped.push(Reaped {
                        id: handle.id,
                        worker: Arc::clone(&handle.worker),
                        code,
                    });
                    false
                }
                None => true,
            });
        }
        reaped
    }

    /// `(worker, live ids)` for every declared pool.
    pub(crate) fn id_map(&self) -> impl Iterator<Item = (&str, impl Iterator<Item = UnitId> + '_)> {
        self.pools
            .iter()
            .map(|(name, units)| (name.as_ref(), units.keys().copied()))
    }
}
