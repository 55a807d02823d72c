//! # ListenerBinder: one socket per worker pool, bound before any unit exists.
//!
//! Binding happens once during startup, in spec order. Pre-binding lets every
//! sibling unit of a pool share one accept queue without a bind race, and it
//! means a bind failure can never be worker-local: the first failure aborts
//! the whole startup (sockets bound so far are dropped with the partial set).
//!
//! ```text
//! specs ──► ListenerBinder::bind_all()
//!             ├─ spec.listen = None        → skipped
//!             ├─ tcp://host:port            → TcpListener::bind  (listening)
//!             ├─ udp://host:port            → UdpSocket::bind    (bound only)
//!             ├─ unix:///path               → stale file removed, UnixListener::bind (listening)
//!             └─ any error                  → RuntimeError::Bind, stop
//! ```
//!
//! A unix socket file left by an earlier run is unlinked before binding when
//! nothing accepts on it any more. A live socket is left alone and the bind
//! fails with `AddrInUse`.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, error, info};

use super::addr::ListenAddr;
use super::socket::ListeningSocket;
use crate::error::RuntimeError;
use crate::workers::WorkerSpec;

/// Bound sockets keyed by worker name.
#[derive(Default, Debug)]
pub struct ListenerSet {
    sockets: HashMap<String, ListeningSocket>,
}

impl ListenerSet {
    /// Returns a shared handle to the socket bound for `worker`.
    pub fn get(&self, worker: &str) -> Option<ListeningSocket> {
        self.sockets.get(worker).cloned()
    }

    /// Number of bound sockets.
    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    /// True if no worker declared a listen address.
    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    pub(crate) fn insert(&mut self, worker: impl Into<String>, socket: ListeningSocket) {
        self.sockets.insert(worker.into(), socket);
    }
}

/// Creates the listening sockets for a set of worker specs.
#[derive(Default, Debug, Clone, Copy)]
pub struct ListenerBinder;

impl ListenerBinder {
    /// Creates a new binder.
    pub fn new() -> Self {
        Self
    }

    /// Binds one socket per spec that declares a listen address.
    ///
    /// Stops at the first failure and returns [`RuntimeError::Bind`] carrying
    /// the protocol, address and OS error.
    pub async fn bind_all(&self, specs: &[WorkerSpec]) -> Result<ListenerSet, RuntimeError> {
        let mut set = ListenerSet::default();
        for spec in specs {
            let Some(addr) = spec.listen.as_ref() else {
                continue;
            };
            match bind_one(addr).await {
                Ok(socket) => {
                    info!(
                        worker = %spec.name,
                        protocol = addr.protocol(),
                        address = %socket.local_addr().unwrap_or_else(|_| addr.address()),
                        "listening socket created"
                    );
                    set.insert(spec.name.clone(), socket);
                }
                Err(source) => {
                    error!(
                        worker = %spec.name,
                        protocol = addr.protocol(),
                        address = %addr.address(),
                        error = %source,
                        "can not create socket, server start fail"
                    );
                    return Err(RuntimeError::Bind {
                        worker: spec.name.clone(),
                        protocol: addr.protocol(),
                        address: addr.address(),
                        source,
                    });
                }
            }
        }
        Ok(set)
    }
}

/// Binds a single listen address.
pub(crate) async fn bind_one(addr: &ListenAddr) -> io::Result<ListeningSocket> {
    match addr {
        ListenAddr::Tcp { host, port } => {
            let listener = TcpListener::bind((host.as_str(), *port)).await?;
            Ok(ListeningSocket::Tcp(Arc::new(listener)))
        }
        ListenAddr::Udp { host, port } => {
            let socket = UdpSocket::bind((host.as_str(), *port)).await?;
            Ok(ListeningSocket::Udp(Arc::new(socket)))
        }
        #[cfg(unix)]
        ListenAddr::Unix { path } => {
            remove_stale_socket(path)?;
            let listener = tokio::net::UnixListener::bind(path)?;
            Ok(ListeningSocket::Unix(Arc::new(listener)))
        }
        #[cfg(not(unix))]
        ListenAddr::Unix { .. } => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not supported on this platform",
        )),
    }
}

/// Unlinks `path` if it is a socket file nobody accepts on.
#[cfg(unix)]
fn remove_stale_socket(path: &std::path::Path) -> io::Result<()> {
    use std::os::unix::fs::FileTypeExt;
    use std::os::unix::net::UnixStream;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {}
        Ok(_) => return Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    }
    match UnixStream::connect(path) {
        Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => {
            debug!(path = %path.display(), "removing stale unix socket");
            std::fs::remove_file(path)
        }
        _ => Ok(()),
    }
}
