//! # Pre-bound listening sockets shared by sibling units.

use std::fmt;
use std::io;
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::net::{TcpListener, UdpSocket};

/// A bound socket handle for one worker pool.
///
/// Cloning is cheap (`Arc`) and every clone refers to the same OS socket, so
/// all sibling units of a pool accept from one kernel queue.
#[derive(Clone)]
pub enum ListeningSocket {
    /// Listening TCP socket.
    Tcp(Arc<TcpListener>),
    /// Bound UDP socket.
    Udp(Arc<UdpSocket>),
    /// Listening unix stream socket.
    #[cfg(unix)]
    Unix(Arc<UnixListener>),
}

impl ListeningSocket {
    /// Protocol name (`tcp`, `udp`, `unix`).
    pub fn protocol(&self) -> &'static str {
        match self {
            ListeningSocket::Tcp(_) => "tcp",
            ListeningSocket::Udp(_) => "udp",
            #[cfg(unix)]
            ListeningSocket::Unix(_) => "unix",
        }
    }

    /// Locally bound address, formatted as it would appear in a listen URI.
    pub fn local_addr(&self) -> io::Result<String> {
        match self {
            ListeningSocket::Tcp(l) => Ok(l.local_addr()?.to_string()),
            ListeningSocket::Udp(s) => Ok(s.local_addr()?.to_string()),
            #[cfg(unix)]
            ListeningSocket::Unix(l) => Ok(l
                .local_addr()?
                .as_pathname()
                .map(|p| p.display().to_string())
                .unwrap_or_default()),
        }
    }

    /// Returns the TCP listener, if this is a TCP socket.
    pub fn as_tcp(&self) -> Option<&Arc<TcpListener>> {
        match self {
            ListeningSocket::Tcp(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the UDP socket, if this is a UDP socket.
    pub fn as_udp(&self) -> Option<&Arc<UdpSocket>> {
        match self {
            ListeningSocket::Udp(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the unix listener, if this is a unix socket.
    #[cfg(unix)]
    pub fn as_unix(&self) -> Option<&Arc<UnixListener>> {
        match self {
            ListeningSocket::Unix(l) => Some(l),
            _ => None,
        }
    }

    /// True if both handles refer to the same underlying socket.
    pub fn same_socket(&self, other: &ListeningSocket) -> bool {
        match (self, other) {
            (ListeningSocket::Tcp(a), ListeningSocket::Tcp(b)) => Arc::ptr_eq(a, b),
            (ListeningSocket::Udp(a), ListeningSocket::Udp(b)) => Arc::ptr_eq(a, b),
            #[cfg(unix)]
            (ListeningSocket::Unix(a), ListeningSocket::Unix(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(unix)]
impl AsRawFd for ListeningSocket {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            ListeningSocket::Tcp(l) => l.as_raw_fd(),
            ListeningSocket::Udp(s) => s.as_raw_fd(),
            ListeningSocket::Unix(l) => l.as_raw_fd(),
        }
    }
}

impl fmt::Debug for ListeningSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = self.local_addr().unwrap_or_else(|_| "?".to_string());
        write!(f, "ListeningSocket({}://{})", self.protocol(), addr)
    }
}
