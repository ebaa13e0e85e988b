//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Terminate TLS when configured
//! - Serve each connection with hyper's HTTP/1.1 server, upgrades enabled
//! - Wire up middleware (tracing) around the proxy dispatcher
//! - Stop accepting on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::http::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio_rustls::TlsAcceptor;
use tokio_util::either::Either;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::lifecycle::ShutdownSignal;
use crate::net::{ConnectionTracker, Listener, ListenerError, TlsError};
use crate::proxy::{self, ProxyState};

/// Forward proxy server.
pub struct ProxyServer {
    state: Arc<ProxyState>,
    tls: Option<TlsAcceptor>,
}

impl ProxyServer {
    /// Create a plaintext server with the given configuration.
    ///
    /// Fails when the trust anchors for `https` destinations cannot be loaded.
    pub fn new(config: &ProxyConfig) -> Result<Self, TlsError> {
        let state = ProxyState::new(&config.upstream)?;
        tracing::info!(upstream = %state.dialer(), "Upstream dialer selected");
        Ok(Self {
            state: Arc::new(state),
            tls: None,
        })
    }

    /// Terminate TLS on every accepted connection.
    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some(acceptor);
        self
    }

    /// Live tunnel counter, usable after the server has been moved into `run`.
    pub fn tunnels(&self) -> ConnectionTracker {
        self.state.tunnels().clone()
    }

    /// Run the server, accepting connections until `shutdown` fires.
    ///
    /// Connections and tunnels already running are left to finish on their own.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(
            address = %addr,
            tls = self.tls.is_some(),
            "Proxy server starting"
        );

        let state = self.state;
        let service = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .service_fn(move |request: Request<Incoming>| {
                proxy::dispatch(Arc::clone(&state), request)
            });

        loop {
            let (stream, peer_addr, slot) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            };

            // Requests carry the connection's slot so a CONNECT tunnel can
            // keep it after hyper lets go of the connection.
            let service = ServiceBuilder::new()
                .map_request(move |mut request: Request<Incoming>| {
                    request.extensions_mut().insert(slot.clone());
                    request
                })
                .service(service.clone());
            let tls = self.tls.clone();

            tokio::spawn(async move {
                let stream = match tls {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls_stream) => Either::Right(tls_stream),
                        Err(e) => {
                            tracing::debug!(peer_addr = %peer_addr, error = %e, "TLS handshake failed");
                            return;
                        }
                    },
                    None => Either::Left(stream),
                };

                // HTTP/1 only: CONNECT tunnels need the raw connection.
                let result = http1::Builder::new()
                    .preserve_header_case(true)
                    .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
                    .with_upgrades()
                    .await;

                if let Err(e) = result {
                    tracing::debug!(peer_addr = %peer_addr, error = %e, "Connection ended with error");
                }
            });
        }

        tracing::info!("Proxy server stopped");
        Ok(())
    }
}
