//! # poolvisor
//!
//! **Poolvisor** is a pre-forking worker-pool supervisor for Rust.
//!
//! It binds every listening socket once, before any worker exists, keeps a
//! fixed number of units running per worker (all sharing that socket),
//! replaces units that die, restarts pools one unit at a time and shuts
//! everything down with a bounded grace window.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  WorkerSpec  │   │  WorkerSpec  │   │  WorkerSpec  │
//!     │ echo ×4 tcp  │   │ dgram ×2 udp │   │  cron ×1     │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (control loop, one tick every tick_interval)          │
//! │  - ListenerSet   (one bound socket per worker, shared by units)   │
//! │  - WorkerPools   (worker name → live units)                       │
//! │  - RestartQueue  (rolling restart, one unit per tick)             │
//! │  - DeferredQueue (force-kill timers)                              │
//! │  - StatusStore   (snapshot written every tick)                    │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼ Launcher         ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │ unit (task   │   │ unit         │   │ unit         │   │
//!     │  or process) │   │              │   │              │   │
//!     └──────────────┘   └──────────────┘   └──────────────┘   │
//!                                                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │              (capacity: SupervisorConfig::bus_capacity)           │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                           (per-sub queues)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Starting ──► Running ◄──► Restarting
//!                 │             │
//!                 └──────┬──────┘
//!                        ▼
//!                  ShuttingDown ──► (no units left) ──► run() returns
//! ```
//!
//! ## Features
//! | Area              | Description                                                | Key types / traits                            |
//! |-------------------|------------------------------------------------------------|-----------------------------------------------|
//! | **Supervision**   | Pools, rolling restart, graceful shutdown.                 | [`Supervisor`], [`SupervisorHandle`]          |
//! | **Listeners**     | Parse listen URIs, bind once, share across units.          | [`ListenAddr`], [`ListenerBinder`]            |
//! | **Workers**       | What a unit runs.                                          | [`Worker`], [`WorkerFn`], [`WorkerCatalog`]   |
//! | **Units**         | How a unit is started and controlled.                      | [`Launcher`], [`TaskLauncher`], [`UnitControl`] |
//! | **Status**        | Start time, exit histogram, live unit ids.                 | [`StatusSnapshot`], [`StatusStore`]           |
//! | **Subscriber API**| Hook into lifecycle events.                                | [`Subscribe`]                                 |
//! | **Configuration** | Runtime settings and TOML worker files.                    | [`SupervisorConfig`], [`TomlConfig`]          |
//! | **Errors**        | Typed errors for startup, spawning and workers.            | [`RuntimeError`], [`SpawnError`], [`WorkerError`] |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use poolvisor::{
//!     SupervisorBuilder, SupervisorConfig, TaskLauncher, WorkerCatalog, WorkerContext,
//!     WorkerError, WorkerFn, WorkerSpec,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SupervisorConfig {
//!         handle_signals: false,
//!         ..SupervisorConfig::default()
//!     };
//!
//!     let catalog = WorkerCatalog::new().with(
//!         "idle",
//!         WorkerFn::arc(|ctx: WorkerContext| async move {
//!             ctx.stopped().await;
//!             Ok::<_, WorkerError>(())
//!         }),
//!     );
//!
//!     let mut sup = SupervisorBuilder::new(cfg)
//!         .with_workers(vec![WorkerSpec::new("idle", "idle", 2)])
//!         .with_launcher(TaskLauncher::new(catalog))
//!         .build();
//!
//!     let handle = sup.handle();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_millis(300)).await;
//!         handle.request_shutdown();
//!     });
//!
//!     sup.run().await?;
//!     assert_eq!(sup.snapshot().exits("idle", 0), 2);
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod env;
mod error;
mod events;
mod listeners;
mod status;
mod subscribers;
mod unit;
mod workers;

// ---- Public re-exports ----

pub use config::{
    ConfigError, ConfigProvider, DEFAULT_GRACE_WINDOW, DEFAULT_MAX_UNITS, DEFAULT_TICK_INTERVAL,
    StaticConfig, SupervisorConfig, SupervisorSection, TomlConfig, WorkerEntry,
};
pub use core::{
    Command, DeferredId, DeferredQueue, RestartEntry, ServiceState, Supervisor,
    SupervisorBuilder, SupervisorHandle, TickOutcome,
};
pub use env::{EnvError, EnvironmentCheck, LimitsCheck, open_files_limit};
pub use error::{
    EXIT_FAILURE, EXIT_KILLED, EXIT_OK, EXIT_PANIC, RuntimeError, SpawnError, WorkerError,
};
pub use events::{Bus, Event, EventKind};
pub use listeners::{ListenAddr, ListenAddrError, ListenerBinder, ListenerSet, ListeningSocket};
pub use status::{FileStatusStore, MemoryStatusStore, StatusError, StatusSnapshot, StatusStore};
pub use subscribers::{Subscribe, SubscriberSet};
pub use unit::{Launcher, TaskLauncher, TaskUnit, UnitControl, UnitId, WorkerUnit};
#[cfg(unix)]
pub use unit::{LISTEN_FD_START, ProcessLauncher, ProcessUnit};
pub use workers::{
    EchoWorker, Worker, WorkerCatalog, WorkerContext, WorkerFn, WorkerRef, WorkerSpec,
};
