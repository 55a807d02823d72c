//! # Tick-driven deferred task queue.
//!
//! [`DeferredQueue`] holds payloads that become due after a delay. It owns no
//! timer and no task: the supervisor calls [`DeferredQueue::tick`] once per
//! control-loop iteration and dispatches whatever comes back.
//!
//! ```text
//! schedule(delay, payload, repeat) ──► id
//! cancel(id)                        ──► entry dropped (if still pending)
//! tick(now)                         ──► [payload, ...]   every entry with due ≤ now,
//!                                                        in (due, scheduling) order
//! ```
//!
//! ## Rules
//! - one-shot entries fire at most once
//! - repeating entries are re-armed at `now + delay` after firing
//! - a cancelled entry never fires
//! - firing precision is bounded by the tick interval

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Handle of a scheduled entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeferredId(u64);

impl fmt::Display for DeferredId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordering key: due time, then scheduling order.
type Slot = (Instant, u64);

struct Entry<T> {
    id: DeferredId,
    every: Option<Duration>,
    payload: T,
}

/// Delay queue driven by explicit ticks.
pub struct DeferredQueue<T> {
    next_id: u64,
    next_seq: u64,
    entries: BTreeMap<Slot, Entry<T>>,
    slots: HashMap<DeferredId, Slot>,
}

impl<T: Clone> DeferredQueue<T> {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            next_seq: 0,
            entries: BTreeMap::new(),
            slots: HashMap::new(),
        }
    }

    /// Schedules `payload` to fire `delay` from now.
    ///
    /// With `repeat`, the entry fires every `delay` until cancelled.
    pub fn schedule(&mut self, delay: Duration, payload: T, repeat: bool) -> DeferredId {
        self.schedule_at(Instant::now(), delay, payload, repeat)
    }

    /// Same as [`schedule`](Self::schedule) with an explicit reference time.
    pub fn schedule_at(
        &mut self,
        now: Instant,
        delay: Duration,
        payload: T,
        repeat: bool,
    ) -> DeferredId {
        let id = DeferredId(self.next_id);
        self.next_id += 1;
        let every = repeat.then_some(delay.max(Duration::from_millis(1)));
        self.insert(now + delay, Entry { id, every, payload });
        id
    }

    /// Drops a pending entry. Returns `false` if it already fired or never existed.
    pub fn cancel(&mut self, id: DeferredId) -> bool {
        match self.slots.remove(&id) {
            Some(slot) => self.entries.remove(&slot).is_some(),
            None => false,
        }
    }

    /// True if `id` is still pending.
    pub fn is_pending(&self, id: DeferredId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns every payload due at `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<T> {
        let mut fired = Vec::new();
        let mut rearm = Vec::new();

        while let Some(first) = self.entries.first_entry() {
            if first.key().0 > now {
                break;
            }
            let entry = first.remove();
            self.slots.remove(&entry.id);

            match entry.every {
                Some(every) => {
                    fired.push(entry.payload.clone());
                    rearm.push((now + every, entry));
                }
                None => fired.push(entry.payload),
            }
        }

        for (due, entry) in rearm {
            self.insert(due, entry);
        }
        fired
    }

    fn insert(&mut self, due: Instant, entry: Entry<T>) {
        let slot = (due, self.next_seq);
        self.next_seq += 1;
        self.slots.insert(entry.id, slot);
        self.entries.insert(slot, entry);
    }
}

impl<T: Clone> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DeferredQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_fires_when_due_in_order() {
        let t0 = Instant::now();
        let mut q = DeferredQueue::new();
        q.schedule_at(t0, ms(300), "late", false);
        q.schedule_at(t0, ms(100), "first", false);
        q.schedule_at(t0, ms(100), "second", false);

        assert!(q.tick(t0 + ms(99)).is_empty());
        assert_eq!(q.tick(t0 + ms(100)), vec!["first", "second"]);
        assert_eq!(q.tick(t0 + ms(1000)), vec!["late"]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_one_shot_fires_once() {
        let t0 = Instant::now();
        let mut q = DeferredQueue::new();
        let id = q.schedule_at(t0, ms(10), 1u32, false);

        assert_eq!(q.tick(t0 + ms(10)), vec![1]);
        assert!(!q.is_pending(id));
        assert!(q.tick(t0 + ms(20)).is_empty());
        assert!(!q.cancel(id));
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let t0 = Instant::now();
        let mut q = DeferredQueue::new();
        let keep = q.schedule_at(t0, ms(10), "keep", false);
        let drop = q.schedule_at(t0, ms(10), "drop", false);

        assert!(q.cancel(drop));
        assert!(!q.cancel(drop));
        assert!(q.is_pending(keep));
        assert_eq!(q.tick(t0 + ms(10)), vec!["keep"]);
    }

    #[test]
    fn test_repeating_rearms_until_cancelled() {
        let t0 = Instant::now();
        let mut q = DeferredQueue::new();
        let id = q.schedule_at(t0, ms(100), "beat", true);

        assert_eq!(q.tick(t0 + ms(100)), vec!["beat"]);
        assert!(q.is_pending(id));
        assert!(q.tick(t0 + ms(150)).is_empty());
        assert_eq!(q.tick(t0 + ms(200)), vec!["beat"]);

        assert!(q.cancel(id));
        assert!(q.tick(t0 + ms(1000)).is_empty());
    }

    #[test]
    fn test_zero_delay_repeat_does_not_spin() {
        let t0 = Instant::now();
        let mut q = DeferredQueue::new();
        q.schedule_at(t0, Duration::ZERO, (), true);
        assert_eq!(q.tick(t0).len(), 1);
        assert!(q.tick(t0).is_empty());
        assert_eq!(q.len(), 1);
    }
}
