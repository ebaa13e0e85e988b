//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests relayed, by `mode`
//! - `proxy_dial_failures_total` (counter): unreachable destinations, by `mode`
//! - `proxy_tunnels_active` (gauge): tunnels whose streams are still open
//! - `proxy_tunnel_bytes_total` (counter): tunneled bytes, by `direction`
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an exporter the calls are no-ops
//! - Prometheus endpoint only when enabled in configuration

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}
