//! Bidirectional byte relay for established tunnels.
//!
//! # Responsibilities
//! - Copy client → destination and destination → client on separate tasks
//! - Tear both streams down as soon as either direction ends
//! - Report per-direction byte counts
//!
//! # Design Decisions
//! - Streams are split into owned halves; each task owns one read half and
//!   the opposite write half, nothing else is shared
//! - A split half cannot close the socket underneath it, so closing is a
//!   per-tunnel signal: whichever task finishes first fires it, the sibling
//!   observes it on its next poll and drops its halves, and the last drop
//!   closes both sockets
//! - No idle timeout: a quiet tunnel stays open until a peer closes it

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::net::ConnectionGuard;

/// Which way bytes flow through a relay task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to destination.
    Upstream,
    /// Destination to client.
    Downstream,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upstream => "upstream",
            Direction::Downstream => "downstream",
        }
    }
}

/// Handles to the two relay tasks of a tunnel.
///
/// Dropping this does not stop the relay; the tasks live until the streams
/// close. Each handle yields the number of bytes that direction copied.
#[derive(Debug)]
pub struct RelayHandles {
    pub upstream: JoinHandle<u64>,
    pub downstream: JoinHandle<u64>,
}

/// Spawn the two relay tasks joining `client` and `destination`.
pub fn spawn_relay<C, D>(client: C, destination: D, guard: ConnectionGuard) -> RelayHandles
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    D: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (dest_read, dest_write) = tokio::io::split(destination);
    let closed = CancellationToken::new();
    let guard = Arc::new(guard);

    let upstream = tokio::spawn(transfer(
        Direction::Upstream,
        client_read,
        dest_write,
        closed.clone(),
        Arc::clone(&guard),
    ));
    let downstream = tokio::spawn(transfer(
        Direction::Downstream,
        dest_read,
        client_write,
        closed,
        guard,
    ));

    RelayHandles {
        upstream,
        downstream,
    }
}

/// Copy `source` into `destination` until EOF, an error, or the tunnel
/// closing, then close both sides.
async fn transfer<R, W>(
    direction: Direction,
    mut source: R,
    mut destination: W,
    closed: CancellationToken,
    guard: Arc<ConnectionGuard>,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let tunnel_id = guard.id();
    let copied = tokio::select! {
        result = tokio::io::copy(&mut source, &mut destination) => match result {
            Ok(n) => {
                tracing::debug!(%tunnel_id, direction = direction.as_str(), bytes = n, "Relay reached end of stream");
                Some(n)
            }
            Err(e) => {
                tracing::debug!(%tunnel_id, direction = direction.as_str(), error = %e, "Relay I/O error");
                None
            }
        },
        _ = closed.cancelled() => {
            tracing::trace!(%tunnel_id, direction = direction.as_str(), "Relay closed by peer direction");
            None
        }
    };

    closed.cancel();
    let _ = destination.shutdown().await;
    drop(source);
    drop(destination);

    let bytes = copied.unwrap_or(0);
    metrics::counter!("proxy_tunnel_bytes_total", "direction" => direction.as_str())
        .increment(bytes);
    bytes
}
