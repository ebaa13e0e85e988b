//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Load TLS material: trust anchors for `https` destinations, plus the
//!   server certificate when serving HTTPS
//! - Build the proxy server and bind its listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::path::Path;

use crate::config::validation::describe;
use crate::config::{validate_config, Protocol, ProxyConfig, ValidationError};
use crate::http::ProxyServer;
use crate::net::{load_tls_acceptor, Listener, ListenerError, TlsError};

/// Error that prevents the proxy from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", describe(.0))]
    Config(Vec<ValidationError>),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Everything needed to start serving.
pub struct Prepared {
    pub server: ProxyServer,
    pub listener: Listener,
}

/// Validate `config`, load TLS if needed and bind the listener.
pub async fn prepare(config: &ProxyConfig) -> Result<Prepared, StartupError> {
    validate_config(config).map_err(StartupError::Config)?;

    let mut server = ProxyServer::new(config)?;
    if config.listener.protocol == Protocol::Https {
        let acceptor = load_tls_acceptor(
            Path::new(&config.tls.cert_path),
            Path::new(&config.tls.key_path),
        )?;
        tracing::info!(
            cert_path = %config.tls.cert_path,
            key_path = %config.tls.key_path,
            "TLS enabled"
        );
        server = server.with_tls(acceptor);
    }

    let listener = Listener::bind(&config.listener).await?;

    Ok(Prepared { server, listener })
}
