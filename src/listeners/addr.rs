//! # Listen address URIs.
//!
//! Worker specs declare where their pool accepts traffic as a URI:
//!
//! ```text
//! tcp://0.0.0.0:1234      stream socket, bound and listening
//! udp://127.0.0.1:9000    datagram socket, bound only
//! unix:///run/echo.sock   unix stream socket (unix platforms)
//! ```
//!
//! Parsing is done with the `url` crate; the port is mandatory for `tcp`/`udp`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use url::{Host, Url};

/// Errors produced while parsing a listen URI.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ListenAddrError {
    /// The string is not a URI at all.
    #[error("invalid listen uri '{uri}': {reason}")]
    Invalid {
        /// Offending input.
        uri: String,
        /// Parser message.
        reason: String,
    },

    /// Scheme is not one of `tcp`, `udp`, `unix`.
    #[error("unsupported listen protocol '{0}' (expected tcp, udp or unix)")]
    UnsupportedProtocol(String),

    /// `tcp`/`udp` URI without a host.
    #[error("listen uri '{0}' has no host")]
    MissingHost(String),

    /// `tcp`/`udp` URI without a port.
    #[error("listen uri '{0}' has no port")]
    MissingPort(String),

    /// `unix` URI without a path.
    #[error("listen uri '{0}' has no socket path")]
    MissingPath(String),
}

/// Parsed listen address of a worker pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenAddr {
    /// Stream socket: bound and listening.
    Tcp {
        /// Host name or IP literal.
        host: String,
        /// Port (`0` lets the OS choose).
        port: u16,
    },
    /// Datagram socket: bound only.
    Udp {
        /// Host name or IP literal.
        host: String,
        /// Port (`0` lets the OS choose).
        port: u16,
    },
    /// Unix domain stream socket.
    Unix {
        /// Filesystem path of the socket.
        path: PathBuf,
    },
}

impl ListenAddr {
    /// Parses a listen URI.
    ///
    /// # Example
    /// ```
    /// use poolvisor::ListenAddr;
    ///
    /// let addr = ListenAddr::parse("tcp://0.0.0.0:1234").unwrap();
    /// assert_eq!(addr.protocol(), "tcp");
    /// assert_eq!(addr.address(), "0.0.0.0:1234");
    /// assert!(addr.is_stream());
    /// ```
    pub fn parse(uri: &str) -> Result<Self, ListenAddrError> {
        let url = Url::parse(uri).map_err(|e| ListenAddrError::Invalid {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "tcp" | "udp" => {
                let host = match url.host() {
                    Some(Host::Domain(d)) if !d.is_empty() => d.to_string(),
                    Some(Host::Ipv4(ip)) => ip.to_string(),
                    Some(Host::Ipv6(ip)) => ip.to_string(),
                    _ => return Err(ListenAddrError::MissingHost(uri.to_string())),
                };
                let port = url
                    .port()
                    .ok_or_else(|| ListenAddrError::MissingPort(uri.to_string()))?;
                if url.scheme() == "tcp" {
                    Ok(ListenAddr::Tcp { host, port })
                } else {
                    Ok(ListenAddr::Udp { host, port })
                }
            }
            "unix" => {
                let path = url.path();
                if path.is_empty() || path == "/" {
                    return Err(ListenAddrError::MissingPath(uri.to_string()));
                }
                Ok(ListenAddr::Unix {
                    path: PathBuf::from(path),
                })
            }
            other => Err(ListenAddrError::UnsupportedProtocol(other.to_string())),
        }
    }

    /// Protocol name as used in the URI scheme.
    pub fn protocol(&self) -> &'static str {
        match self {
            ListenAddr::Tcp { .. } => "tcp",
            ListenAddr::Udp { .. } => "udp",
            ListenAddr::Unix { .. } => "unix",
        }
    }

    /// Address part of the URI (`host:port` or the socket path).
    pub fn address(&self) -> String {
        match self {
            ListenAddr::Tcp { host, port } | ListenAddr::Udp { host, port } => {
                if host.contains(':') {
                    format!("[{host}]:{port}")
                } else {
                    format!("{host}:{port}")
                }
            }
            ListenAddr::Unix { path } => path.display().to_string(),
        }
    }

    /// Stream protocols are put into listening state after binding.
    pub fn is_stream(&self) -> bool {
        !matches!(self, ListenAddr::Udp { .. })
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Unix { path } => write!(f, "unix://{}", path.display()),
            _ => write!(f, "{}://{}", self.protocol(), self.address()),
        }
    }
}

impl FromStr for ListenAddr {
    type Err = ListenAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ListenAddr::parse(s)
    }
}
