//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses (bind, SOCKS5 upstream, metrics endpoint)
//! - Require certificate paths when serving HTTPS
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{Protocol, ProxyConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    #[error("max_connections must be greater than zero")]
    ZeroConnections,

    #[error("invalid socks5 address {0:?}: expected host:port")]
    Socks5Address(String),

    #[error("{0} path must not be empty when protocol is https")]
    MissingTlsPath(&'static str),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }

    if let Some(socks) = &config.upstream.socks5 {
        if !is_host_port(socks) {
            errors.push(ValidationError::Socks5Address(socks.clone()));
        }
    }

    if config.listener.protocol == Protocol::Https {
        if config.tls.cert_path.is_empty() {
            errors.push(ValidationError::MissingTlsPath("certificate"));
        }
        if config.tls.key_path.is_empty() {
            errors.push(ValidationError::MissingTlsPath("key"));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Render a list of validation errors on one line.
pub fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `host:port` with a non-empty host and a numeric port. Bracketed IPv6
/// literals are accepted.
fn is_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            !host.is_empty() && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}
