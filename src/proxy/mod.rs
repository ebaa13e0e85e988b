//! Proxy core: request dispatch and the two relay modes.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → dispatch (method check only, body untouched)
//!         CONNECT → tunnel.rs (dial, hijack, relay.rs)
//!         other   → forward.rs (round trip through the transport)
//! ```
//!
//! # Design Decisions
//! - The dialer and transport are built once and shared read-only by every
//!   request; nothing else crosses request boundaries
//! - No retries: a failed dial or round trip ends that request

pub mod forward;
pub mod relay;
pub mod tunnel;

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use hyper::body::Incoming;

use crate::config::UpstreamConfig;
use crate::net::{client_tls_connector, ConnectionSlot, ConnectionTracker, TlsError};
use crate::upstream::{build_transport, Dialer, Transport};

pub use forward::handle_forward;
pub use tunnel::handle_tunnel;

/// Process-wide state handed to every request.
#[derive(Debug)]
pub struct ProxyState {
    dialer: Dialer,
    transport: Transport,
    tunnels: ConnectionTracker,
}

impl ProxyState {
    /// Build the dialer and its transport from configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, TlsError> {
        let dialer = Dialer::from_config(config);
        let tls = client_tls_connector(config.ca_file.as_deref().map(Path::new))?;
        Ok(Self {
            transport: build_transport(dialer.clone(), tls),
            dialer,
            tunnels: ConnectionTracker::new(),
        })
    }

    pub fn dialer(&self) -> &Dialer {
        &self.dialer
    }

    /// Live tunnel counter.
    pub fn tunnels(&self) -> &ConnectionTracker {
        &self.tunnels
    }
}

/// Route a request to the tunnel or forward relay by method.
pub async fn dispatch(
    state: Arc<ProxyState>,
    mut request: Request<Incoming>,
) -> Result<Response, Infallible> {
    let slot = request.extensions_mut().remove::<ConnectionSlot>();
    let response = if request.method() == Method::CONNECT {
        handle_tunnel(&state.dialer, &state.tunnels, slot, request).await
    } else {
        handle_forward(&state.transport, request.map(Body::new)).await
    };
    Ok(response)
}
