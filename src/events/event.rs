//! # Runtime events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Supervisor events**: state transitions (started, restart, shutdown)
//! - **Unit lifecycle events**: spawned, stop requested, exited, force-killed
//! - **Failure events**: spawn failures, status write failures
//! - **Subscriber events**: overflow and panics inside subscribers
//!
//! The [`Event`] struct carries additional metadata such as the worker name,
//! unit id, exit code and a human-readable reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use poolvisor::{Event, EventKind, UnitId};
//!
//! let ev = Event::new(EventKind::UnitExited)
//!     .with_worker("echo")
//!     .with_unit(UnitId::new(7))
//!     .with_exit_code(137);
//!
//! assert_eq!(ev.kind, EventKind::UnitExited);
//! assert_eq!(ev.worker.as_deref(), Some("echo"));
//! assert_eq!(ev.exit_code, Some(137));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::unit::UnitId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: reason string (`full`, `closed`)
    SubscriberOverflow,

    // === Supervisor events ===
    /// A listening socket was bound.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: `protocol://address`
    ListenerBound,

    /// Startup finished; the supervisor entered `Running`.
    SupervisorStarted,

    /// Rolling restart accepted.
    ///
    /// Sets:
    /// - `reason`: number of queued units
    RestartRequested,

    /// Restart queue drained; back to `Running`.
    RestartCompleted,

    /// Shutdown accepted (first request only).
    ///
    /// Sets:
    /// - `delay_ms`: grace window before the forced kill of every unit
    ShutdownRequested,

    /// Every unit is gone; the control loop returned.
    SupervisorStopped,

    // === Unit lifecycle events ===
    /// Unit spawned.
    ///
    /// Sets:
    /// - `worker`, `unit`
    UnitSpawned,

    /// Unit could not be spawned; retried on the next tick.
    ///
    /// Sets:
    /// - `worker`
    /// - `reason`: spawn error
    UnitSpawnFailed,

    /// Cooperative stop sent to a unit.
    ///
    /// Sets:
    /// - `worker`, `unit`
    /// - `delay_ms`: grace window before the forced kill (rolling restart only)
    UnitStopRequested,

    /// Termination observed by polling.
    ///
    /// Sets:
    /// - `worker`, `unit`
    /// - `exit_code`
    UnitExited,

    /// Grace window elapsed; the unit was killed.
    ///
    /// Sets:
    /// - `worker`, `unit`
    UnitForceKilled,

    // === Status ===
    /// Status snapshot could not be persisted.
    ///
    /// Sets:
    /// - `reason`: store error
    StatusWriteFailed,
}

impl EventKind {
    /// Short stable label (kebab-case).
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
            EventKind::ListenerBound => "listener-bound",
            EventKind::SupervisorStarted => "supervisor-started",
            EventKind::RestartRequested => "restart-requested",
            EventKind::RestartCompleted => "restart-completed",
            EventKind::ShutdownRequested => "shutdown-requested",
            EventKind::SupervisorStopped => "supervisor-stopped",
            EventKind::UnitSpawned => "unit-spawned",
            EventKind::UnitSpawnFailed => "unit-spawn-failed",
            EventKind::UnitStopRequested => "unit-stop-requested",
            EventKind::UnitExited => "unit-exited",
            EventKind::UnitForceKilled => "unit-force-killed",
            EventKind::StatusWriteFailed => "status-write-failed",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Worker (pool) name, or subscriber name for subscriber events.
    pub worker: Option<Arc<str>>,
    /// Unit the event refers to.
    pub unit: Option<UnitId>,
    /// Observed exit code.
    pub exit_code: Option<i32>,
    /// Delay attached to the event in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            unit: None,
            exit_code: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a worker name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a unit id.
    #[inline]
    pub fn with_unit(mut self, unit: UnitId) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::UnitSpawned);
        let b = Event::new(EventKind::UnitSpawned);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates() {
        let ev = Event::new(EventKind::ShutdownRequested).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn test_subscriber_overflow_reason() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert_eq!(ev.kind.as_label(), "subscriber-overflow");
        assert_eq!(ev.worker.as_deref(), Some("audit"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }
}
