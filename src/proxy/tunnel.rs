//! CONNECT handling.
//!
//! # Data Flow
//! ```text
//! CONNECT host:port
//!     → dial destination (503 + error text on failure, nothing hijacked)
//!     → take the connection's upgrade handle (500 if there is none)
//!     → 200 with empty body
//!     → hyper hands over the raw client stream
//!     → relay.rs pumps bytes until either side closes
//! ```
//!
//! Once the 200 is written the connection is a raw pipe for good; later I/O
//! failures only end the streams and are never reported to the client.

use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;

use crate::http::response::{error_response, service_unavailable, HIJACK_UNSUPPORTED};
use crate::net::{ConnectionSlot, ConnectionTracker};
use crate::proxy::relay::spawn_relay;
use crate::upstream::Dialer;

/// Establish a tunnel for a CONNECT request.
///
/// `slot` is the client connection's listener slot; the tunnel holds it
/// until both relay directions have finished.
pub async fn handle_tunnel<B>(
    dialer: &Dialer,
    tracker: &ConnectionTracker,
    slot: Option<ConnectionSlot>,
    mut request: Request<B>,
) -> Response {
    let target = target_authority(&request);

    let destination = match dialer.dial(&target).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(target = %target, upstream = %dialer, error = %e, "Tunnel dial failed");
            metrics::counter!("proxy_dial_failures_total", "mode" => "tunnel").increment(1);
            return service_unavailable(&e);
        }
    };

    // Removing the handle is the hijack: from here on the request no longer
    // owns the connection's future.
    let Some(on_upgrade) = request.extensions_mut().remove::<OnUpgrade>() else {
        tracing::error!(target = %target, "Connection cannot be hijacked");
        drop(destination);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, HIJACK_UNSUPPORTED);
    };

    let guard = tracker.track(slot);
    let tunnel_id = guard.id();
    tracing::debug!(%tunnel_id, target = %target, upstream = %dialer, "Tunnel established");
    metrics::counter!("proxy_requests_total", "mode" => "tunnel").increment(1);

    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                let relay = spawn_relay(TokioIo::new(upgraded), destination, guard);
                let (upstream, downstream) = tokio::join!(relay.upstream, relay.downstream);
                tracing::debug!(
                    %tunnel_id,
                    bytes_up = upstream.unwrap_or(0),
                    bytes_down = downstream.unwrap_or(0),
                    "Tunnel finished"
                );
            }
            Err(e) => {
                tracing::warn!(%tunnel_id, error = %e, "Client connection upgrade failed");
            }
        }
    });

    StatusCode::OK.into_response()
}

/// Destination named by a CONNECT request: the request-target authority,
/// or the Host header when the target carries none.
fn target_authority<B>(request: &Request<B>) -> String {
    if let Some(authority) = request.uri().authority() {
        return authority.to_string();
    }
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
