//! # Bundled worker implementations.
//!
//! [`EchoWorker`] echoes bytes back to the peer on whatever socket its pool
//! was given. It exists for demos and end-to-end checks of socket sharing;
//! it is not meant to serve real traffic.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinSet;
use tracing::debug;

use super::context::WorkerContext;
use super::worker::Worker;
use crate::error::WorkerError;
use crate::listeners::ListeningSocket;

/// Echo server for tcp, udp and unix pools.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoWorker;

#[async_trait]
impl Worker for EchoWorker {
    async fn run(&self, ctx: WorkerContext) -> Result<(), WorkerError> {
        let Some(socket) = ctx.listener().cloned() else {
            return Err(WorkerError::fail(format!(
                "echo worker '{}' needs a listen address",
                ctx.worker_name()
            )));
        };

        // Dropping the set aborts in-flight connections when the unit stops.
        let mut conns = JoinSet::new();
        match socket {
            ListeningSocket::Tcp(listener) => loop {
                tokio::select! {
                    _ = ctx.stopped() => return Ok(()),
                    accepted = listener.accept() => {
                        let (stream, peer) = accepted?;
                        debug!(worker = ctx.worker_name(), unit = %ctx.unit_id(), %peer, "accepted");
                        conns.spawn(echo_stream(stream));
                    }
                    Some(_) = conns.join_next(), if !conns.is_empty() => {}
                }
            },
            ListeningSocket::Udp(socket) => {
                let mut buf = vec![0u8; 64 * 1024];
                loop {
                    tokio::select! {
                        _ = ctx.stopped() => return Ok(()),
                        received = socket.recv_from(&mut buf) => {
                            let (n, peer) = received?;
                            socket.send_to(&buf[..n], peer).await?;
                        }
                    }
                }
            }
            #[cfg(unix)]
            ListeningSocket::Unix(listener) => loop {
                tokio::select! {
                    _ = ctx.stopped() => return Ok(()),
                    accepted = listener.accept() => {
                        let (stream, _) = accepted?;
                        conns.spawn(echo_stream(stream));
                    }
                    Some(_) = conns.join_next(), if !conns.is_empty() => {}
                }
            },
        }
    }
}

async fn echo_stream<S>(stream: S)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut rd, mut wr) = tokio::io::split(stream);
    let _ = tokio::io::copy(&mut rd, &mut wr).await;
}
