//! Bounded TCP accept.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Hand out one [`ConnectionSlot`] per accepted client connection
//! - Block accepting while `max_connections` slots are taken
//!
//! A slot is released when its last clone drops. The HTTP connection holds
//! one clone; a CONNECT tunnel takes another, so a client connection keeps
//! its slot after hyper hands it over to the relay.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Connection limit closed")]
    Closed,
}

/// One of the `max_connections` client connection slots.
///
/// Cloning shares the slot; it returns to the listener when every clone is
/// gone.
#[derive(Debug, Clone)]
pub struct ConnectionSlot {
    _permit: Arc<OwnedSemaphorePermit>,
}

/// TCP listener that admits at most `max_connections` clients at a time.
pub struct Listener {
    inner: TcpListener,
    slots: Arc<Semaphore>,
}

impl Listener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let bind_err = |source: std::io::Error| ListenerError::Bind {
            addr: config.bind_address.clone(),
            source,
        };

        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            bind_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;
        let inner = TcpListener::bind(addr).await.map_err(bind_err)?;

        tracing::info!(
            address = %inner.local_addr().map_err(bind_err)?,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner,
            slots: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Wait for a free slot, then accept the next client.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionSlot), ListenerError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer_addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        // Tunnels relay interactive traffic; don't hold back small writes.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer_addr, error = %e, "Failed to set TCP_NODELAY");
        }

        tracing::debug!(
            %peer_addr,
            free_slots = self.slots.available_permits(),
            "Connection accepted"
        );

        Ok((stream, peer_addr, ConnectionSlot {
            _permit: Arc::new(permit),
        }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}
