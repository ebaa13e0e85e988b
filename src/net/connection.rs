//! Tunnel identity and lifetime tracking.
//!
//! # Responsibilities
//! - Generate unique tunnel IDs for tracing
//! - Count tunnels whose relay tasks are still running
//! - Publish the live tunnel count as a gauge
//! - Keep the client's connection slot taken while its tunnel is open

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::net::listener::ConnectionSlot;

/// Global atomic counter for tunnel IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static TUNNEL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TunnelId(u64);

impl TunnelId {
    /// Generate a new unique tunnel ID.
    pub fn new() -> Self {
        Self(TUNNEL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TunnelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TunnelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tunnel-{}", self.0)
    }
}

/// Tracks tunnels that still hold client or destination streams.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new tunnel. Returns a guard that decrements on drop.
    ///
    /// `slot` is the listener slot of the client connection the tunnel took
    /// over; the guard keeps it until the tunnel closes.
    pub fn track(&self, slot: Option<ConnectionSlot>) -> ConnectionGuard {
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!("proxy_tunnels_active").set(active as f64);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: TunnelId::new(),
            _slot: slot,
        }
    }

    /// Get current number of live tunnels.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a tunnel's lifetime.
///
/// Both relay tasks of a tunnel share it behind an `Arc`, so the count drops
/// only after the second direction has released its streams.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: TunnelId,
    _slot: Option<ConnectionSlot>,
}

impl ConnectionGuard {
    /// Get this tunnel's ID.
    pub fn id(&self) -> TunnelId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::gauge!("proxy_tunnels_active").set(remaining as f64);
        tracing::trace!(tunnel_id = %self.id, "Tunnel closed");
    }
}
