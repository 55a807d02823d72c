//! # Supervisor: worker pools, rolling restart and graceful shutdown.
//!
//! The [`Supervisor`] owns the worker pools, the restart queue, the deferred
//! task queue and the status snapshot. Everything is mutated from one place:
//! the control loop, which calls [`Supervisor::tick`] every
//! `tick_interval`.
//!
//! ## High-level architecture
//! ```text
//! start():
//!   ConfigProvider::workers() ─► EnvironmentCheck::check() ─► ListenerBinder::bind_all()
//!        └─► spawn pass (Launcher::launch per missing unit) ─► Running
//!
//! tick():
//!   1. apply queued commands (SupervisorHandle / signals)
//!   2. reap     poll_exit() on every unit; terminated ones leave pool + restart queue,
//!               their force-kill is cancelled, exit code counted
//!   3. refill   launch units until every pool is at desired_count (not while ShuttingDown)
//!   4. restart  Restarting: signal ONE pending unit, arm ForceKill(unit) at now + grace;
//!               empty queue → Running
//!   5. deferred DeferredQueue::tick(now) → ForceKill(unit) | ForceKillAll
//!   6. status   StatusStore::write(snapshot)
//!   7. finish   ShuttingDown and no units left → Finished
//!
//! Event flow:
//!   Supervisor ── publish(Event) ──► Bus ──► forwarder task ──► SubscriberSet::emit(&Event)
//! ```
//!
//! ## Rules
//! - at most one restart signal per tick
//! - a unit is force-killed at most once, never before its grace window
//! - a second shutdown request re-sends the stop but never re-arms `ForceKillAll`
//! - shutdown during a rolling restart drops the restart queue and its force-kills
//! - spawn failures are retried on every tick

use std::sync::Arc;

use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::handle::{Command, SupervisorHandle};
use super::pool::{Reaped, UnitHandle, WorkerPools};
use super::restart::{RestartEntry, RestartQueue};
use super::scheduler::{DeferredId, DeferredQueue};
use super::shutdown::SignalListener;
use super::state::ServiceState;
use crate::config::{ConfigProvider, SupervisorConfig};
use crate::env::EnvironmentCheck;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::listeners::{ListenerBinder, ListenerSet};
use crate::status::{StatusSnapshot, StatusStore};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::unit::{Launcher, UnitId};
use crate::workers::WorkerSpec;

/// Deferred actions dispatched by the control loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Deferred {
    /// Kill one unit that ignored its restart stop.
    ForceKill(UnitId),
    /// Kill every unit still alive after the shutdown grace window.
    ForceKillAll,
}

/// Outcome of one control-loop iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep ticking.
    Continue,
    /// Shutdown finished; no unit is left.
    Finished,
}

struct Forwarder {
    stop: CancellationToken,
    join: JoinHandle<()>,
}

/// Collaborators injected by [`SupervisorBuilder`](crate::SupervisorBuilder).
pub(crate) struct Parts {
    pub(crate) config: Box<dyn ConfigProvider>,
    pub(crate) env_check: Box<dyn EnvironmentCheck>,
    pub(crate) launcher: Box<dyn Launcher>,
    pub(crate) status: Box<dyn StatusStore>,
    pub(crate) subscribers: Vec<Arc<dyn Subscribe>>,
}

/// Keeps worker pools at size and coordinates restart and shutdown.
pub struct Supervisor {
    cfg: SupervisorConfig,
    config: Box<dyn ConfigProvider>,
    env_check: Box<dyn EnvironmentCheck>,
    launcher: Box<dyn Launcher>,
    status: Box<dyn StatusStore>,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    forwarder: Option<Forwarder>,

    specs: Vec<WorkerSpec>,
    listeners: ListenerSet,
    pools: WorkerPools,
    restart: RestartQueue,
    deferred: DeferredQueue<Deferred>,
    force_kill_all: Option<DeferredId>,
    state: ServiceState,
    snapshot: StatusSnapshot,
    next_unit: u64,
    started: bool,
    finished: bool,
    status_failing: bool,

    handle: SupervisorHandle,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Supervisor {
    pub(crate) fn new_internal(cfg: SupervisorConfig, parts: Parts) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let (handle, commands) = SupervisorHandle::channel();
        Self {
            cfg,
            config: parts.config,
            env_check: parts.env_check,
            launcher: parts.launcher,
            status: parts.status,
            bus,
            subscribers: parts.subscribers,
            forwarder: None,
            specs: Vec::new(),
            listeners: ListenerSet::default(),
            pools: WorkerPools::default(),
            restart: RestartQueue::default(),
            deferred: DeferredQueue::new(),
            force_kill_all: None,
            state: ServiceState::Starting,
            snapshot: StatusSnapshot::default(),
            next_unit: 1,
            started: false,
            finished: false,
            status_failing: false,
            handle,
            commands,
        }
    }

    /// Runs startup (unless already done), then the control loop until
    /// shutdown completes.
    ///
    /// With `handle_signals`, OS signals are registered before startup and
    /// translated into restart/shutdown requests.
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        let signals = if self.cfg.handle_signals {
            Some(SignalListener::install().map_err(RuntimeError::Signals)?)
        } else {
            None
        };

        if !self.started {
            self.start().await?;
        }

        let signal_task = signals.map(|mut listener| {
            let handle = self.handle.clone();
            tokio::spawn(async move {
                loop {
                    let cmd = listener.recv().await;
                    info!(?cmd, "signal received");
                    if !handle.send(cmd) {
                        break;
                    }
                }
            })
        });

        let mut interval = tokio::time::interval(self.cfg.tick_interval_clamped());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if self.tick() == TickOutcome::Finished {
                break;
            }
        }

        if let Some(task) = signal_task {
            task.abort();
        }
        self.stop_forwarder().await;
        Ok(())
    }

    /// Loads the workers, checks the environment, binds every listen address
    /// and spawns the initial units. Leaves the supervisor `Running`.
    pub async fn start(&mut self) -> Result<(), RuntimeError> {
        if self.started {
            return Err(RuntimeError::AlreadyStarted);
        }
        self.started = true;
        self.spawn_forwarder();

        let result = self.boot().await;
        if let Err(err) = &result {
            error!(error = %err, label = err.as_label(), "supervisor start failed");
            self.stop_forwarder().await;
        }
        result
    }

    async fn boot(&mut self) -> Result<(), RuntimeError> {
        let specs = self.config.workers()?;
        self.env_check.check(&specs)?;
        let listeners = ListenerBinder::new().bind_all(&specs).await?;

        for spec in &specs {
            self.pools.declare(&spec.name);
            if let (Some(addr), Some(_)) = (&spec.listen, listeners.get(&spec.name)) {
                self.bus.publish(
                    Event::new(EventKind::ListenerBound)
                        .with_worker(spec.name.as_str())
                        .with_reason(addr.to_string()),
                );
            }
        }
        self.listeners = listeners;
        self.specs = specs;
        self.snapshot = StatusSnapshot::started_now();

        // A pool that fails to spawn here is retried by the first tick.
        self.replenish();
        self.state = ServiceState::Running;
        info!(
            workers = self.specs.len(),
            units = self.pools.total(),
            "supervisor running"
        );
        self.bus.publish(Event::new(EventKind::SupervisorStarted));
        self.write_status();
        Ok(())
    }

    /// One control-loop iteration. Never blocks.
    pub fn tick(&mut self) -> TickOutcome {
        if self.finished {
            return TickOutcome::Finished;
        }
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                Command::Restart => self.request_restart(),
                Command::Shutdown => self.request_shutdown(),
            }
        }

        let now = Instant::now();
        for reaped in self.pools.reap() {
            self.on_unit_exit(reaped);
        }

        if matches!(self.state, ServiceState::Running | ServiceState::Restarting) {
            self.replenish();
        }
        if self.state == ServiceState::Restarting {
            self.restart_step(now);
        }
        for action in self.deferred.tick(now) {
            self.dispatch(action);
        }

        if self.started {
            self.write_status();
        }

        if self.state == ServiceState::ShuttingDown && self.pools.total() == 0 {
            self.finished = true;
            if let Some(id) = self.force_kill_all.take() {
                self.deferred.cancel(id);
            }
            info!("all workers stopped, supervisor exiting");
            self.bus.publish(Event::new(EventKind::SupervisorStopped));
            return TickOutcome::Finished;
        }
        TickOutcome::Continue
    }

    /// Queues every running unit for a rolling restart.
    ///
    /// Ignored while starting or shutting down. Units already queued are not
    /// queued twice.
    pub fn request_restart(&mut self) {
        match self.state {
            ServiceState::Running | ServiceState::Restarting => {}
            state => {
                debug!(%state, "restart request ignored");
                return;
            }
        }

        let queued = self
            .pools
            .all_ids()
            .into_iter()
            .filter(|id| self.restart.enqueue(*id))
            .count();
        self.state = ServiceState::Restarting;
        info!(queued, pending = self.restart.len(), "rolling restart requested");
        self.bus.publish(
            Event::new(EventKind::RestartRequested).with_reason(format!("queued={queued}")),
        );
    }

    /// Asks every unit to stop and arms the forced kill of all of them.
    ///
    /// Idempotent: a repeated request only re-sends the cooperative stop.
    /// Ignored while starting; a request queued through the
    /// [`SupervisorHandle`] before startup is applied by the first tick.
    /// A rolling restart in progress is abandoned: pending units are never
    /// signaled and per-unit force-kills give way to the shutdown one.
    pub fn request_shutdown(&mut self) {
        match self.state {
            ServiceState::Running | ServiceState::Restarting => {}
            ServiceState::ShuttingDown => {
                debug!(units = self.pools.total(), "shutdown already in progress, re-sending stop");
                for handle in self.pools.handles_mut() {
                    handle.control.request_stop();
                }
                return;
            }
            state => {
                debug!(%state, "shutdown request ignored");
                return;
            }
        }

        let abandoned = self.restart.len();
        for force_kill in self.restart.clear() {
            self.deferred.cancel(force_kill);
        }
        if abandoned > 0 {
            info!(abandoned, "rolling restart abandoned");
        }

        self.state = ServiceState::ShuttingDown;
        let units = self.pools.total();
        info!(units, grace = ?self.cfg.grace_window, "shutting down");
        if units > 0 {
            self.force_kill_all = Some(self.deferred.schedule(
                self.cfg.grace_window,
                Deferred::ForceKillAll,
                false,
            ));
        }
        for handle in self.pools.handles_mut() {
            handle.control.request_stop();
        }
        self.bus.publish(Event::new(EventKind::ShutdownRequested).with_delay(self.cfg.grace_window));
    }

    /// Cloneable handle for requests from other tasks.
    pub fn handle(&self) -> SupervisorHandle {
        self.handle.clone()
    }

    /// Event bus carrying every lifecycle event.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Snapshot as of the last tick.
    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    /// Runtime configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Loaded worker specs (empty before `start`).
    pub fn specs(&self) -> &[WorkerSpec] {
        &self.specs
    }

    /// Bound listening sockets.
    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Live units of `worker`.
    pub fn unit_count(&self, worker: &str) -> usize {
        self.pools.count(worker)
    }

    /// Live unit ids of `worker`, ascending.
    pub fn unit_ids(&self, worker: &str) -> Vec<UnitId> {
        self.pools.ids(worker)
    }

    /// Units still waiting in the restart queue.
    pub fn pending_restarts(&self) -> usize {
        self.restart.len()
    }

    fn on_unit_exit(&mut self, reaped: Reaped) {
        let Reaped { id, worker, code } = reaped;
        if let Some(RestartEntry::Signaled { force_kill, .. }) = self.restart.remove(id) {
            self.deferred.cancel(force_kill);
        }
        self.snapshot.record_exit(&worker, code);

        if code == 0 {
            info!(worker = %worker, unit = %id, code, "worker exited");
        } else {
            warn!(worker = %worker, unit = %id, code, "worker exited with non-zero status");
        }
        self.bus.publish(
            Event::new(EventKind::UnitExited)
                .with_worker(worker)
                .with_unit(id)
                .with_exit_code(code),
        );
    }

    fn replenish(&mut self) {
        for spec in &self.specs {
            let missing = spec.desired_count.saturating_sub(self.pools.count(&spec.name));
            for _ in 0..missing {
                let id = UnitId::new(self.next_unit);
                let socket = self.listeners.get(&spec.name);
                match self.launcher.launch(id, spec, socket) {
                    Ok(control) => {
                        self.next_unit += 1;
                        let worker: Arc<str> = Arc::from(spec.name.as_str());
                        let pid = control.os_pid();
                        debug!(worker = %worker, unit = %id, ?pid, "unit spawned");
                        let mut event = Event::new(EventKind::UnitSpawned)
                            .with_worker(Arc::clone(&worker))
                            .with_unit(id);
                        if let Some(pid) = pid {
                            event = event.with_reason(format!("pid={pid}"));
                        }
                        self.bus.publish(event);
                        self.pools.insert(UnitHandle {
                            id,
                            worker,
                            control,
                        });
                    }
                    Err(err) => {
                        warn!(
                            worker = %spec.name,
                            error = %err,
                            label = err.as_label(),
                            "can not spawn unit, retrying next tick"
                        );
                        self.bus.publish(
                            Event::new(EventKind::UnitSpawnFailed)
                                .with_worker(spec.name.as_str())
                                .with_reason(err.to_string()),
                        );
                        break;
                    }
                }
            }
        }
    }

    fn restart_step(&mut self, now: Instant) {
        let Some(id) = self.restart.next_pending() else {
            if self.restart.is_empty() {
                self.state = ServiceState::Running;
                info!("rolling restart completed");
                self.bus.publish(Event::new(EventKind::RestartCompleted));
            }
            return;
        };

        let Some(handle) = self.pools.get_mut(id) else {
            self.restart.remove(id);
            return;
        };
        handle.control.request_stop();
        let worker = Arc::clone(&handle.worker);

        let grace = self.cfg.grace_window;
        let force_kill = self.deferred.schedule(grace, Deferred::ForceKill(id), false);
        self.restart.mark_signaled(id, now, force_kill);
        info!(worker = %worker, unit = %id, "restarting unit");
        self.bus.publish(
            Event::new(EventKind::UnitStopRequested)
                .with_worker(worker)
                .with_unit(id)
                .with_delay(grace),
        );
    }

    fn dispatch(&mut self, action: Deferred) {
        match action {
            Deferred::ForceKill(id) => {
                let signaled_at = match self.restart.remove(id) {
                    Some(RestartEntry::Signaled { at, .. }) => Some(at),
                    _ => None,
                };
                if let Some(handle) = self.pools.get_mut(id) {
                    handle.control.force_kill();
                    warn!(
                        worker = %handle.worker,
                        unit = %id,
                        waited = ?signaled_at.map(|at| at.elapsed()),
                        "unit ignored stop request, killed"
                    );
                    self.bus.publish(
                        Event::new(EventKind::UnitForceKilled)
                            .with_worker(Arc::clone(&handle.worker))
                            .with_unit(id),
                    );
                }
            }
            Deferred::ForceKillAll => {
                for handle in self.pools.handles_mut() {
                    handle.control.force_kill();
                    warn!(worker = %handle.worker, unit = %handle.id, "unit still alive after grace window, killed");
                    self.bus.publish(
                        Event::new(EventKind::UnitForceKilled)
                            .with_worker(Arc::clone(&handle.worker))
                            .with_unit(handle.id),
                    );
                }
            }
        }
    }

    fn write_status(&mut self) {
        self.snapshot.pid_map.clear();
        for (worker, ids) in self.pools.id_map() {
            self.snapshot.set_units(worker, ids);
        }

        match self.status.write(&self.snapshot) {
            Ok(()) => {
                if self.status_failing {
                    self.status_failing = false;
                    info!("status snapshot written again");
                }
            }
            Err(err) => {
                if !self.status_failing {
                    self.status_failing = true;
                    warn!(error = %err, label = err.as_label(), "can not write status snapshot");
                    self.bus.publish(
                        Event::new(EventKind::StatusWriteFailed).with_reason(err.to_string()),
                    );
                }
            }
        }
    }

    fn spawn_forwarder(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let set = SubscriberSet::new(std::mem::take(&mut self.subscribers), self.bus.clone());
        let mut rx = self.bus.subscribe();
        let stop = CancellationToken::new();
        let cancelled = stop.clone();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    received = rx.recv() => match received {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event forwarder lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = cancelled.cancelled() => {
                        while let Ok(ev) = rx.try_recv() {
                            set.emit(&ev);
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        });
        self.forwarder = Some(Forwarder { stop, join });
    }

    async fn stop_forwarder(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.stop.cancel();
            let _ = forwarder.join.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::StaticConfig;
    use crate::core::builder::SupervisorBuilder;
    use crate::env::{EnvError, LimitsCheck};
    use crate::error::{EXIT_KILLED, SpawnError, WorkerError};
    use crate::listeners::ListeningSocket;
    use crate::status::{MemoryStatusStore, StatusError};
    use crate::unit::{TaskLauncher, UnitControl};
    use crate::workers::{WorkerCatalog, WorkerContext, WorkerFn};

    #[derive(Default)]
    struct FakeUnitState {
        honors_stop: bool,
        stop_requests: u32,
        kills: u32,
        exit: Option<i32>,
    }

    struct FakeUnit(Arc<Mutex<FakeUnitState>>);

    impl UnitControl for FakeUnit {
        fn poll_exit(&mut self) -> Option<i32> {
            let s = self.0.lock().unwrap();
            if let Some(code) = s.exit {
                return Some(code);
            }
            if s.kills > 0 {
                return Some(EXIT_KILLED);
            }
            if s.stop_requests > 0 && s.honors_stop {
                return Some(0);
            }
            None
        }

        fn request_stop(&mut self) {
            self.0.lock().unwrap().stop_requests += 1;
        }

        fn force_kill(&mut self) {
            self.0.lock().unwrap().kills += 1;
        }
    }

    struct Launched {
        id: UnitId,
        worker: String,
        socket: Option<ListeningSocket>,
        state: Arc<Mutex<FakeUnitState>>,
    }

    #[derive(Default)]
    struct FakeState {
        launched: Vec<Launched>,
        failures_left: usize,
        honors_stop: bool,
    }

    #[derive(Clone, Default)]
    struct FakeLauncher(Arc<Mutex<FakeState>>);

    impl FakeLauncher {
        fn cooperative() -> Self {
            let fake = Self::default();
            fake.0.lock().unwrap().honors_stop = true;
            fake
        }

        fn stubborn() -> Self {
            Self::default()
        }

        fn fail_next(&self, n: usize) {
            self.0.lock().unwrap().failures_left = n;
        }

        fn unit(&self, id: UnitId) -> Arc<Mutex<FakeUnitState>> {
            let s = self.0.lock().unwrap();
            let launched = s.launched.iter().find(|l| l.id == id).unwrap();
            Arc::clone(&launched.state)
        }

        fn launches(&self) -> usize {
            self.0.lock().unwrap().launched.len()
        }

        fn stop_requests(&self, id: UnitId) -> u32 {
            self.unit(id).lock().unwrap().stop_requests
        }

        fn kills(&self, id: UnitId) -> u32 {
            self.unit(id).lock().unwrap().kills
        }

        fn exit(&self, id: UnitId, code: i32) {
            self.unit(id).lock().unwrap().exit = Some(code);
        }
    }

    impl Launcher for FakeLauncher {
        fn launch(
            &mut self,
            id: UnitId,
            spec: &WorkerSpec,
            socket: Option<ListeningSocket>,
        ) -> Result<Box<dyn UnitControl>, SpawnError> {
            let mut s = self.0.lock().unwrap();
            if s.failures_left > 0 {
                s.failures_left -= 1;
                return Err(SpawnError::UnknownImplementation {
                    worker: spec.name.clone(),
                    implementation: spec.implementation.clone(),
                });
            }
            let state = Arc::new(Mutex::new(FakeUnitState {
                honors_stop: s.honors_stop,
                ..FakeUnitState::default()
            }));
            s.launched.push(Launched {
                id,
                worker: spec.name.clone(),
                socket,
                state: Arc::clone(&state),
            });
            Ok(Box::new(FakeUnit(state)))
        }
    }

    fn quiet_config() -> SupervisorConfig {
        SupervisorConfig {
            handle_signals: false,
            ..SupervisorConfig::default()
        }
    }

    fn supervisor(specs: Vec<WorkerSpec>, launcher: FakeLauncher) -> (Supervisor, MemoryStatusStore) {
        let store = MemoryStatusStore::new();
        let sup = SupervisorBuilder::new(quiet_config())
            .with_workers(specs)
            .with_launcher(launcher)
            .with_status_store(store.clone())
            .build();
        (sup, store)
    }

    fn echo(count: usize) -> WorkerSpec {
        WorkerSpec::new("echo", "echo", count)
    }

    fn ids(raw: &[u64]) -> Vec<UnitId> {
        raw.iter().copied().map(UnitId::new).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fills_pools_sharing_one_listener() {
        let fake = FakeLauncher::cooperative();
        let spec = echo(4).with_listen("tcp://127.0.0.1:0").unwrap();
        let (mut sup, store) = supervisor(vec![spec], fake.clone());

        sup.start().await.unwrap();

        assert_eq!(sup.state(), ServiceState::Running);
        assert_eq!(sup.unit_count("echo"), 4);
        let shared = sup.listeners().get("echo").unwrap();
        let state = fake.0.lock().unwrap();
        assert_eq!(state.launched.len(), 4);
        for launched in &state.launched {
            assert_eq!(launched.worker, "echo");
            assert!(launched.socket.as_ref().unwrap().same_socket(&shared));
        }
        drop(state);

        let written = store.latest().unwrap();
        assert_eq!(written.pid_map["echo"].len(), 4);
        assert!(written.start_time > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_rejected() {
        let (mut sup, _) = supervisor(vec![echo(1)], FakeLauncher::cooperative());
        sup.start().await.unwrap();
        let err = sup.start().await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_already_started");
    }

    #[tokio::test(start_paused = true)]
    async fn test_environment_failure_prevents_any_spawn() {
        let fake = FakeLauncher::cooperative();
        let mut sup = SupervisorBuilder::new(quiet_config())
            .with_workers(vec![echo(3), echo(1)])
            .with_environment_check(LimitsCheck::default())
            .with_launcher(fake.clone())
            .build();

        let err = sup.start().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Environment(EnvError::DuplicateName(_))));
        assert_eq!(fake.launches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_failure_prevents_any_spawn() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let fake = FakeLauncher::cooperative();
        let spec = echo(2)
            .with_listen(&format!("tcp://127.0.0.1:{port}"))
            .unwrap();
        let (mut sup, _) = supervisor(vec![spec], fake.clone());

        let err = sup.start().await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_bind_failed");
        assert_eq!(fake.launches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exited_unit_is_counted_and_replaced() {
        let fake = FakeLauncher::cooperative();
        let (mut sup, store) = supervisor(vec![echo(4)], fake.clone());
        sup.start().await.unwrap();

        fake.exit(UnitId::new(2), 0);
        assert_eq!(sup.tick(), TickOutcome::Continue);

        assert_eq!(sup.unit_count("echo"), 4);
        assert_eq!(sup.unit_ids("echo"), ids(&[1, 3, 4, 5]));
        assert_eq!(sup.snapshot().exits("echo", 0), 1);
        let written = store.latest().unwrap();
        assert_eq!(written.exits("echo", 0), 1);
        assert!(!written.pid_map["echo"].contains(&UnitId::new(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rolling_restart_one_unit_per_tick() {
        let fake = FakeLauncher::cooperative();
        let (mut sup, _) = supervisor(vec![echo(4)], fake.clone());
        sup.start().await.unwrap();

        sup.request_restart();
        assert_eq!(sup.state(), ServiceState::Restarting);
        assert_eq!(sup.pending_restarts(), 4);

        for tick in 1..=4u64 {
            sup.tick();
            assert_eq!(sup.state(), ServiceState::Restarting, "tick {tick}");
            for id in 1..=4u64 {
                let expected = u32::from(id <= tick);
                assert_eq!(fake.stop_requests(UnitId::new(id)), expected, "tick {tick} unit {id}");
            }
            assert_eq!(sup.unit_count("echo"), 4);
        }

        sup.tick();
        assert_eq!(sup.state(), ServiceState::Running);
        assert_eq!(sup.unit_ids("echo"), ids(&[5, 6, 7, 8]));
        assert_eq!(sup.snapshot().exits("echo", 0), 4);
        for id in 5..=8 {
            assert_eq!(fake.stop_requests(UnitId::new(id)), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_restart_request_does_not_requeue() {
        let fake = FakeLauncher::stubborn();
        let (mut sup, _) = supervisor(vec![echo(2)], fake.clone());
        sup.start().await.unwrap();

        sup.request_restart();
        sup.tick();
        sup.request_restart();
        assert_eq!(sup.pending_restarts(), 2);

        sup.tick();
        assert_eq!(fake.stop_requests(UnitId::new(1)), 1);
        assert_eq!(fake.stop_requests(UnitId::new(2)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stubborn_unit_killed_once_after_grace() {
        let fake = FakeLauncher::stubborn();
        let (mut sup, _) = supervisor(vec![echo(1)], fake.clone());
        sup.start().await.unwrap();
        let unit = UnitId::new(1);

        sup.request_restart();
        sup.tick();
        assert_eq!(fake.stop_requests(unit), 1);

        tokio::time::advance(Duration::from_millis(3900)).await;
        sup.tick();
        assert_eq!(fake.kills(unit), 0);

        tokio::time::advance(Duration::from_millis(200)).await;
        sup.tick();
        assert_eq!(fake.kills(unit), 1);
        assert_eq!(sup.pending_restarts(), 0);

        tokio::time::advance(Duration::from_secs(10)).await;
        sup.tick();
        sup.tick();
        assert_eq!(fake.kills(unit), 1);
        assert_eq!(sup.state(), ServiceState::Running);
        assert_eq!(sup.snapshot().exits("echo", EXIT_KILLED), 1);
        assert_eq!(sup.unit_ids("echo"), ids(&[2]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_before_grace_cancels_force_kill() {
        let fake = FakeLauncher::stubborn();
        let (mut sup, _) = supervisor(vec![echo(1)], fake.clone());
        sup.start().await.unwrap();
        let unit = UnitId::new(1);

        sup.request_restart();
        sup.tick();
        assert_eq!(sup.deferred.len(), 1);

        fake.exit(unit, 0);
        sup.tick();
        assert!(sup.deferred.is_empty());

        tokio::time::advance(Duration::from_secs(5)).await;
        sup.tick();
        assert_eq!(fake.kills(unit), 0);
        assert_eq!(sup.state(), ServiceState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_units_then_finishes() {
        let fake = FakeLauncher::cooperative();
        let (mut sup, store) = supervisor(vec![echo(3)], fake.clone());
        sup.start().await.unwrap();

        sup.request_shutdown();
        assert_eq!(sup.state(), ServiceState::ShuttingDown);
        for id in 1..=3 {
            assert_eq!(fake.stop_requests(UnitId::new(id)), 1);
        }

        assert_eq!(sup.tick(), TickOutcome::Finished);
        assert_eq!(fake.launches(), 3);
        assert_eq!(sup.snapshot().exits("echo", 0), 3);
        assert!(store.latest().unwrap().pid_map["echo"].is_empty());
        assert_eq!(sup.tick(), TickOutcome::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_shutdown_arms_single_force_kill_all() {
        let fake = FakeLauncher::stubborn();
        let (mut sup, _) = supervisor(vec![echo(2)], fake.clone());
        sup.start().await.unwrap();

        sup.request_shutdown();
        sup.request_shutdown();
        assert_eq!(sup.deferred.len(), 1);
        assert_eq!(fake.stop_requests(UnitId::new(1)), 2);

        assert_eq!(sup.tick(), TickOutcome::Continue);
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(sup.tick(), TickOutcome::Continue);
        assert_eq!(fake.kills(UnitId::new(1)), 1);
        assert_eq!(fake.kills(UnitId::new(2)), 1);

        assert_eq!(sup.tick(), TickOutcome::Finished);
        assert_eq!(sup.snapshot().exits("echo", EXIT_KILLED), 2);
        assert_eq!(fake.launches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_with_no_units_finishes_immediately() {
        let fake = FakeLauncher::cooperative();
        fake.fail_next(usize::MAX);
        let (mut sup, _) = supervisor(vec![echo(2)], fake.clone());
        sup.start().await.unwrap();
        assert_eq!(sup.unit_count("echo"), 0);

        sup.request_shutdown();
        assert!(sup.deferred.is_empty());
        assert_eq!(sup.tick(), TickOutcome::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_failure_retried_next_tick() {
        let fake = FakeLauncher::cooperative();
        fake.fail_next(1);
        let (mut sup, _) = supervisor(vec![echo(2)], fake.clone());
        let mut events = sup.bus().subscribe();

        sup.start().await.unwrap();
        assert_eq!(sup.state(), ServiceState::Running);
        assert_eq!(sup.unit_count("echo"), 0);

        sup.tick();
        assert_eq!(sup.unit_count("echo"), 2);

        let mut failed = 0;
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::UnitSpawnFailed {
                failed += 1;
                assert_eq!(ev.worker.as_deref(), Some("echo"));
            }
        }
        assert_eq!(failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_ignored_while_shutting_down() {
        let fake = FakeLauncher::stubborn();
        let (mut sup, _) = supervisor(vec![echo(1)], fake.clone());
        sup.start().await.unwrap();

        sup.request_shutdown();
        sup.request_restart();
        assert_eq!(sup.state(), ServiceState::ShuttingDown);
        assert_eq!(sup.pending_restarts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_requests_apply_on_next_tick() {
        let fake = FakeLauncher::cooperative();
        let (mut sup, _) = supervisor(vec![echo(1)], fake.clone());
        sup.start().await.unwrap();

        let handle = sup.handle();
        assert!(handle.request_shutdown());
        assert_eq!(sup.state(), ServiceState::Running);

        // The request is applied before reaping, so a cooperative unit is
        // gone within the same tick.
        assert_eq!(sup.tick(), TickOutcome::Finished);
        assert_eq!(sup.state(), ServiceState::ShuttingDown);
        assert_eq!(fake.stop_requests(UnitId::new(1)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_starting_is_ignored() {
        let fake = FakeLauncher::cooperative();
        let (mut sup, _) = supervisor(vec![echo(2)], fake.clone());
        let handle = sup.handle();

        sup.request_shutdown();
        assert_eq!(sup.state(), ServiceState::Starting);
        assert!(handle.request_shutdown());

        sup.start().await.unwrap();
        assert_eq!(sup.state(), ServiceState::Running);
        assert_eq!(sup.unit_count("echo"), 2);
        assert!(sup.deferred.is_empty());

        // The queued handle request is applied once running.
        assert_eq!(sup.tick(), TickOutcome::Finished);
        assert_eq!(fake.stop_requests(UnitId::new(1)), 1);
        assert_eq!(fake.stop_requests(UnitId::new(2)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_rolling_restart() {
        let fake = FakeLauncher::stubborn();
        let (mut sup, _) = supervisor(vec![echo(3)], fake.clone());
        sup.start().await.unwrap();

        sup.request_restart();
        sup.tick();
        assert_eq!(fake.stop_requests(UnitId::new(1)), 1);
        assert_eq!(sup.deferred.len(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        sup.request_shutdown();
        assert_eq!(sup.state(), ServiceState::ShuttingDown);
        assert_eq!(sup.pending_restarts(), 0);
        // Only the shutdown force-kill is left.
        assert_eq!(sup.deferred.len(), 1);
        assert_eq!(fake.stop_requests(UnitId::new(1)), 2);
        assert_eq!(fake.stop_requests(UnitId::new(2)), 1);
        assert_eq!(fake.stop_requests(UnitId::new(3)), 1);

        // Past unit 1's restart grace, short of the shutdown grace.
        tokio::time::advance(Duration::from_millis(3500)).await;
        assert_eq!(sup.tick(), TickOutcome::Continue);
        for id in 1..=3 {
            assert_eq!(fake.kills(UnitId::new(id)), 0, "unit {id}");
        }
        assert_eq!(fake.stop_requests(UnitId::new(2)), 1);
        assert_eq!(fake.stop_requests(UnitId::new(3)), 1);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(sup.tick(), TickOutcome::Continue);
        for id in 1..=3 {
            assert_eq!(fake.kills(UnitId::new(id)), 1, "unit {id}");
        }

        assert_eq!(sup.tick(), TickOutcome::Finished);
        assert_eq!(fake.launches(), 3);
        assert_eq!(sup.snapshot().exits("echo", EXIT_KILLED), 3);
        assert!(sup.deferred.is_empty());
    }

    struct FailingStore;

    impl StatusStore for FailingStore {
        fn write(&self, _snapshot: &StatusSnapshot) -> Result<(), StatusError> {
            Err(StatusError::Io {
                path: "/dev/full".into(),
                source: std::io::Error::other("disk full"),
            })
        }

        fn read(&self) -> Result<Option<StatusSnapshot>, StatusError> {
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_failure_reported_once_per_streak() {
        let mut sup = SupervisorBuilder::new(quiet_config())
            .with_workers(vec![echo(1)])
            .with_launcher(FakeLauncher::cooperative())
            .with_status_store(FailingStore)
            .build();
        let mut events = sup.bus().subscribe();

        sup.start().await.unwrap();
        sup.tick();
        sup.tick();

        let mut failures = 0;
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::StatusWriteFailed {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
    }

    #[derive(Default)]
    struct Collect {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, event: &Event) {
            self.kinds.lock().unwrap().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "collect"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_task_units_until_shutdown() {
        let catalog = WorkerCatalog::new().with(
            "idle",
            WorkerFn::arc(|ctx: WorkerContext| async move {
                ctx.stopped().await;
                Ok::<_, WorkerError>(())
            }),
        );
        let store = MemoryStatusStore::new();
        let collect = Arc::new(Collect::default());
        let mut sup = SupervisorBuilder::new(quiet_config())
            .with_workers(vec![WorkerSpec::new("idle", "idle", 2)])
            .with_launcher(TaskLauncher::new(catalog))
            .with_status_store(store.clone())
            .with_subscribers(vec![collect.clone()])
            .build();
        let handle = sup.handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.request_restart();
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.request_shutdown();
        });
        sup.run().await.unwrap();

        let snapshot = store.latest().unwrap();
        assert_eq!(snapshot.exits("idle", 0), 4);
        assert!(snapshot.pid_map["idle"].is_empty());

        let kinds = collect.kinds.lock().unwrap();
        assert_eq!(kinds.first(), Some(&EventKind::UnitSpawned));
        assert!(kinds.contains(&EventKind::RestartCompleted));
        assert_eq!(kinds.last(), Some(&EventKind::SupervisorStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_configuration_is_rejected() {
        let mut sup = SupervisorBuilder::new(quiet_config())
            .with_config_provider(StaticConfig::default())
            .build();
        let err = sup.start().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Environment(EnvError::NoWorkers)));
    }
}
