//! TLS configuration and certificate loading.
//!
//! The server side terminates TLS for clients when the listener runs in
//! `https` mode. The client side speaks TLS to `https://` destinations on
//! the forward path, trusting the system roots plus an optional PEM file.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};

/// Error type for TLS setup.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Certificate file not found: {0:?}")]
    CertNotFound(std::path::PathBuf),

    #[error("Private key file not found: {0:?}")]
    KeyNotFound(std::path::PathBuf),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No certificates found in {0:?}")]
    NoCertificates(std::path::PathBuf),

    #[error("No private key found in {0:?}")]
    NoPrivateKey(std::path::PathBuf),

    #[error("Invalid TLS configuration: {0}")]
    Config(#[from] rustls::Error),
}

/// Build a TLS acceptor from PEM certificate and key files.
///
/// Only `http/1.1` is advertised over ALPN: tunnels take over the raw
/// connection, which a multiplexed HTTP/2 session cannot hand out.
pub fn load_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TlsError> {
    if !cert_path.exists() {
        return Err(TlsError::CertNotFound(cert_path.to_path_buf()));
    }
    if !key_path.exists() {
        return Err(TlsError::KeyNotFound(key_path.to_path_buf()));
    }

    let certs = read_certs(cert_path)?;

    let mut key_reader = BufReader::new(File::open(key_path).map_err(read_err(key_path))?);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(read_err(key_path))?
        .ok_or_else(|| TlsError::NoPrivateKey(key_path.to_path_buf()))?;

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Build the connector used for `https://` destinations.
///
/// Trusts the platform's root certificates and, when given, every
/// certificate in `extra_roots`. Only `http/1.1` is offered over ALPN.
pub fn client_tls_connector(extra_roots: Option<&Path>) -> Result<TlsConnector, TlsError> {
    let mut roots = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    if !native.errors.is_empty() {
        tracing::warn!(
            errors = native.errors.len(),
            "Some system root certificates could not be loaded"
        );
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::debug!(added, ignored, "System root certificates loaded");

    if let Some(path) = extra_roots {
        if !path.exists() {
            return Err(TlsError::CertNotFound(path.to_path_buf()));
        }
        for cert in read_certs(path)? {
            roots.add(cert)?;
        }
        tracing::info!(ca_file = %path.display(), "Extra trust anchors loaded");
    }

    let mut config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsConnector::from(Arc::new(config)))
}

fn read_err(path: &Path) -> impl FnOnce(std::io::Error) -> TlsError {
    let path = path.to_path_buf();
    move |source| TlsError::Read { path, source }
}

/// Every certificate in a PEM file; at least one is required.
fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = BufReader::new(File::open(path).map_err(read_err(path))?);
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(read_err(path))?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}
