//! # Global supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the settings shared by the control loop,
//! the environment check and the status writer.
//!
//! Config is used in two ways:
//! 1. **Supervisor creation**: `SupervisorBuilder::new(config)`
//! 2. **Environment defaults**: `LimitsCheck::from_config(&config)`
//!
//! ## Sentinel values
//! - `max_units = 0` → unlimited
//! - `tick_interval = 0s` → clamped to 1 ms
//! - `status_file = None` → snapshots kept in memory only

use std::path::PathBuf;
use std::time::Duration;

/// Default control-loop period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
/// Default delay between a stop request and the forced kill.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(4);
/// Default cap on the total number of units across all pools.
pub const DEFAULT_MAX_UNITS: usize = 5000;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `tick_interval`: sleep between control-loop iterations
/// - `grace_window`: wait between cooperative stop and forced kill
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `status_file`: where the status snapshot is persisted (`None` = memory only)
/// - `max_units`: upper bound on the sum of all pool sizes (`0` = unlimited)
/// - `min_open_files`: required `RLIMIT_NOFILE` soft limit (`None` = not checked)
/// - `handle_signals`: install OS signal handlers in [`Supervisor::run`](crate::Supervisor::run)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Period of the control loop. Bounds termination-detection latency.
    pub tick_interval: Duration,

    /// Time a unit gets to honor a stop request before it is force-killed.
    ///
    /// Applies to both rolling restart (per unit) and shutdown (all units).
    pub grace_window: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,

    /// Destination of the persisted status snapshot.
    pub status_file: Option<PathBuf>,

    /// Maximum total number of units (`0` = unlimited).
    pub max_units: usize,

    /// Minimum soft limit for open file descriptors.
    pub min_open_files: Option<u64>,

    /// Whether `run()` listens for OS signals.
    pub handle_signals: bool,
}

impl SupervisorConfig {
    /// Control-loop period clamped to a minimum of 1 ms.
    #[inline]
    pub fn tick_interval_clamped(&self) -> Duration {
        self.tick_interval.max(Duration::from_millis(1))
    }

    /// Returns the total unit limit as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` units across all pools
    #[inline]
    pub fn unit_limit(&self) -> Option<usize> {
        if self.max_units == 0 {
            None
        } else {
            Some(self.max_units)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `tick_interval = 100ms`
    /// - `grace_window = 4s`
    /// - `bus_capacity = 1024`
    /// - `status_file = None`
    /// - `max_units = 5000`
    /// - `min_open_files = None`
    /// - `handle_signals = true`
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            grace_window: DEFAULT_GRACE_WINDOW,
            bus_capacity: 1024,
            status_file: None,
            max_units: DEFAULT_MAX_UNITS,
            min_open_files: None,
            handle_signals: true,
        }
    }
}
