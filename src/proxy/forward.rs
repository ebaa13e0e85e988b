//! Forwarding of `http://` and `https://` requests.
//!
//! The inbound request goes out through the request transport as-is; the
//! upstream status, headers and body come back untouched. A transport
//! failure becomes a 503 before anything else is written. Once the status
//! is committed, a body error just cuts the stream short.

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::http::response::{copy_headers, service_unavailable};
use crate::upstream::Transport;

/// Perform one request/response exchange through `transport`.
pub async fn handle_forward(transport: &Transport, request: Request<Body>) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let upstream = match transport.request(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(method = %method, uri = %uri, error = %e, "Forward request failed");
            metrics::counter!("proxy_dial_failures_total", "mode" => "forward").increment(1);
            return service_unavailable(&e);
        }
    };
    metrics::counter!("proxy_requests_total", "mode" => "forward").increment(1);

    let (parts, body) = upstream.into_parts();
    tracing::debug!(method = %method, uri = %uri, status = %parts.status, "Forwarded");

    let mut response = Response::new(Body::new(body));
    copy_headers(response.headers_mut(), &parts.headers);
    *response.status_mut() = parts.status;
    // Carries hyper's header-case map so names go out as the upstream sent them.
    *response.extensions_mut() = parts.extensions;
    response
}
