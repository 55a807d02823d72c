//! # Process-grade launcher (unix).
//!
//! Each unit is a child process running the executable named by the spec's
//! `implementation`, with `argv[0]` set to a title such as
//! `poolvisor: worker echo tcp://0.0.0.0:8080` so `ps` shows which pool a
//! process belongs to. The pool's pre-bound socket is inherited by the child:
//!
//! ```text
//! supervisor fd N ──dup2──► child fd 3   (FD_CLOEXEC cleared)
//! LISTEN_FDS=1
//! LISTEN_FD_NAMES=<worker name>
//! LISTEN_PROTOCOL=<tcp|udp|unix>
//! POOLVISOR_WORKER=<worker name>
//! POOLVISOR_UNIT_ID=<unit id>
//! ```
//!
//! ## Rules
//! - cooperative stop sends `SIGTERM`
//! - forced kill sends `SIGKILL`
//! - a child killed by signal `S` reports exit code `128 + S`
//! - `user` is resolved with `getpwnam_r`; an unknown user is a spawn failure

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::launcher::{Launcher, UnitControl, UnitId};
use crate::error::{EXIT_FAILURE, SpawnError};
use crate::listeners::ListeningSocket;
use crate::workers::WorkerSpec;

/// First inherited descriptor, per the `LISTEN_FDS` convention.
pub const LISTEN_FD_START: RawFd = 3;

/// Launches units as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    args: Vec<String>,
}

impl ProcessLauncher {
    /// Creates a launcher that runs each implementation without arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra arguments passed to every child.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Launcher for ProcessLauncher {
    fn launch(
        &mut self,
        id: UnitId,
        spec: &WorkerSpec,
        socket: Option<ListeningSocket>,
    ) -> Result<Box<dyn UnitControl>, SpawnError> {
        let mut cmd = Command::new(&spec.implementation);
        cmd.arg0(process_title(spec))
            .args(&self.args)
            .env("POOLVISOR_WORKER", &spec.name)
            .env("POOLVISOR_UNIT_ID", id.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(socket) = &socket {
            use std::os::unix::io::AsRawFd;

            let fd = socket.as_raw_fd();
            cmd.env("LISTEN_FDS", "1")
                .env("LISTEN_FD_NAMES", &spec.name)
                .env("LISTEN_PROTOCOL", socket.protocol());
            // SAFETY: the hook only calls dup2/fcntl, both async-signal-safe.
            unsafe {
                cmd.pre_exec(move || inherit_fd(fd));
            }
        }

        if let Some(user) = &spec.user {
            let (uid, gid) = lookup_user(user)?;
            cmd.uid(uid).gid(gid);
        }

        let child = cmd.spawn()?;
        info!(worker = %spec.name, unit = %id, pid = ?child.id(), "process unit started");
        Ok(Box::new(ProcessUnit {
            id,
            child,
            exit: None,
        }))
    }
}

/// Handle of a running child process.
#[derive(Debug)]
pub struct ProcessUnit {
    id: UnitId,
    child: Child,
    exit: Option<i32>,
}

impl UnitControl for ProcessUnit {
    fn poll_exit(&mut self) -> Option<i32> {
        if self.exit.is_some() {
            return self.exit;
        }
        let code = match self.child.try_wait() {
            Ok(Some(status)) => status
                .code()
                .unwrap_or_else(|| 128 + status.signal().unwrap_or(0)),
            Ok(None) => return None,
            Err(err) => {
                warn!(unit = %self.id, error = %err, "can not query child status, treating as exited");
                EXIT_FAILURE
            }
        };
        self.exit = Some(code);
        self.exit
    }

    fn request_stop(&mut self) {
        let Some(pid) = self.child.id() else {
            return;
        };
        // SAFETY: plain kill(2) on a pid we own and have not reaped yet.
        if unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } != 0 {
            debug!(unit = %self.id, error = %io::Error::last_os_error(), "SIGTERM not delivered");
        }
    }

    fn force_kill(&mut self) {
        if let Err(err) = self.child.start_kill() {
            debug!(unit = %self.id, error = %err, "SIGKILL not delivered");
        }
    }

    fn os_pid(&self) -> Option<u32> {
        self.child.id()
    }
}

/// `argv[0]` of a unit process.
fn process_title(spec: &WorkerSpec) -> String {
    match &spec.listen {
        Some(addr) => format!("poolvisor: worker {} {addr}", spec.name),
        None => format!("poolvisor: worker {}", spec.name),
    }
}

/// Runs in the child between fork and exec.
fn inherit_fd(fd: RawFd) -> io::Result<()> {
    if fd != LISTEN_FD_START {
        // SAFETY: dup2 on descriptors owned by this (forked) process.
        if unsafe { libc::dup2(fd, LISTEN_FD_START) } < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    // SAFETY: fcntl on a descriptor we just installed.
    let flags = unsafe { libc::fcntl(LISTEN_FD_START, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(LISTEN_FD_START, libc::F_SETFD, flags & !libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Resolves a user name to `(uid, gid)`.
fn lookup_user(name: &str) -> Result<(u32, u32), SpawnError> {
    let c_name = CString::new(name).map_err(|_| SpawnError::UnknownUser(name.to_string()))?;
    // SAFETY: passwd is plain data; getpwnam_r fills it and points its
    // strings into `buf`, which outlives every read below.
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buf = vec![0 as libc::c_char; 4096];
    let mut result: *mut libc::passwd = std::ptr::null_mut();
    let rc = unsafe {
        libc::getpwnam_r(
            c_name.as_ptr(),
            &mut pwd,
            buf.as_mut_ptr(),
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 {
        return Err(SpawnError::Io(io::Error::from_raw_os_error(rc)));
    }
    if result.is_null() {
        return Err(SpawnError::UnknownUser(name.to_string()));
    }
    Ok((pwd.pw_uid, pwd.pw_gid))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::{EXIT_KILLED, EXIT_OK};

    async fn wait_exit(unit: &mut Box<dyn UnitControl>) -> i32 {
        for _ in 0..400 {
            if let Some(code) = unit.poll_exit() {
                return code;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("process did not terminate");
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let mut launcher = ProcessLauncher::new().with_args(["-c", "exit 3"]);
        let spec = WorkerSpec::new("sh", "/bin/sh", 1);
        let mut unit = launcher.launch(UnitId::new(1), &spec, None).unwrap();
        assert_eq!(wait_exit(&mut unit).await, 3);
    }

    #[tokio::test]
    async fn test_sigterm_then_exit_ok() {
        let mut launcher =
            ProcessLauncher::new().with_args(["-c", "trap 'exit 0' TERM; while :; do sleep 0.05; done"]);
        let spec = WorkerSpec::new("sh", "/bin/sh", 1);
        let mut unit = launcher.launch(UnitId::new(1), &spec, None).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        unit.request_stop();
        assert_eq!(wait_exit(&mut unit).await, EXIT_OK);
    }

    #[tokio::test]
    async fn test_running_unit_exposes_os_pid() {
        let mut launcher = ProcessLauncher::new().with_args(["-c", "sleep 30"]);
        let spec = WorkerSpec::new("sh", "/bin/sh", 1);
        let mut unit = launcher.launch(UnitId::new(1), &spec, None).unwrap();

        let pid = unit.os_pid().unwrap();
        assert!(pid > 0);
        assert_ne!(pid, std::process::id());

        unit.force_kill();
        assert_eq!(wait_exit(&mut unit).await, EXIT_KILLED);
        assert_eq!(unit.os_pid(), None);
    }

    #[tokio::test]
    async fn test_force_kill_reports_sigkill() {
        let mut launcher = ProcessLauncher::new().with_args(["-c", "trap '' TERM; sleep 30"]);
        let spec = WorkerSpec::new("sh", "/bin/sh", 1);
        let mut unit = launcher.launch(UnitId::new(1), &spec, None).unwrap();

        unit.force_kill();
        assert_eq!(wait_exit(&mut unit).await, EXIT_KILLED);
    }

    #[tokio::test]
    async fn test_socket_is_inherited_as_fd3() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let socket = ListeningSocket::Tcp(std::sync::Arc::new(listener));
        let mut launcher = ProcessLauncher::new().with_args([
            "-c",
            r#"[ "$LISTEN_FDS" = 1 ] && [ "$LISTEN_FD_NAMES" = web ] && { [ -e /proc/self/fd/3 ] || [ -e /dev/fd/3 ]; }"#,
        ]);
        let spec = WorkerSpec::new("web", "/bin/sh", 1);
        let mut unit = launcher.launch(UnitId::new(1), &spec, Some(socket)).unwrap();
        assert_eq!(wait_exit(&mut unit).await, EXIT_OK);
    }

    #[test]
    fn test_process_title_names_pool_and_address() {
        let plain = WorkerSpec::new("cron", "/usr/bin/cron-worker", 1);
        assert_eq!(process_title(&plain), "poolvisor: worker cron");

        let web = WorkerSpec::new("web", "/usr/bin/web-worker", 1)
            .with_listen("tcp://0.0.0.0:8080")
            .unwrap();
        assert_eq!(process_title(&web), "poolvisor: worker web tcp://0.0.0.0:8080");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_child_runs_under_process_title() {
        let mut launcher = ProcessLauncher::new().with_args([
            "-c",
            r#"case "$(tr '\0' ' ' < /proc/$$/cmdline)" in "poolvisor: worker titled "*) exit 0 ;; esac; exit 1"#,
        ]);
        let spec = WorkerSpec::new("titled", "/bin/sh", 1);
        let mut unit = launcher.launch(UnitId::new(1), &spec, None).unwrap();
        assert_eq!(wait_exit(&mut unit).await, EXIT_OK);
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let mut launcher = ProcessLauncher::new();
        let spec = WorkerSpec::new("ghost", "/nonexistent/poolvisor-worker", 1);
        let err = launcher.launch(UnitId::new(1), &spec, None).err().unwrap();
        assert_eq!(err.as_label(), "spawn_io");
    }

    #[test]
    fn test_unknown_user_is_rejected() {
        let err = lookup_user("poolvisor-no-such-user").unwrap_err();
        assert!(matches!(err, SpawnError::UnknownUser(_)));
        assert!(lookup_user("root").is_ok());
    }
}
