//! Runtime core: pools, control loop and lifecycle.
//!
//! The public entry points are [`Supervisor`] (built via
//! [`SupervisorBuilder`]) and [`SupervisorHandle`] for requests from other
//! tasks.
//!
//! Internal modules:
//! - [`supervisor`]: startup sequence and the tick-driven control loop;
//! - [`pool`]: worker name → live units;
//! - [`restart`]: rolling-restart queue;
//! - [`scheduler`]: deferred one-shot/repeating actions (force-kill timers);
//! - [`shutdown`]: OS signal → command mapping.

mod builder;
mod handle;
mod pool;
mod restart;
mod scheduler;
mod shutdown;
mod state;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use handle::{Command, SupervisorHandle};
pub use restart::RestartEntry;
pub use scheduler::{DeferredId, DeferredQueue};
pub use state::ServiceState;
pub use supervisor::{Supervisor, TickOutcome};
