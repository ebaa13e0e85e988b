//! Request transport for forward mode.
//!
//! The hyper client is given a connector that dials through the configured
//! [`Dialer`], so forwarded requests follow the same route as tunnels.
//! `https://` destinations get a TLS session on top of the dialed stream.
//! Idle pooling is switched off: every request gets a fresh destination
//! connection that is dropped with the response.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Uri;
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tokio_util::either::Either;

use crate::upstream::dialer::{DialError, Dialer};

/// HTTP client used by the forward relay.
pub type Transport = Client<UpstreamConnector, Body>;

/// Build the request transport on top of a dialer.
pub fn build_transport(dialer: Dialer, tls: TlsConnector) -> Transport {
    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(0)
        .http1_preserve_header_case(true)
        .build(UpstreamConnector { dialer, tls })
}

/// `tower::Service<Uri>` that resolves a request URI into a dialed stream.
#[derive(Clone)]
pub struct UpstreamConnector {
    dialer: Dialer,
    tls: TlsConnector,
}

impl std::fmt::Debug for UpstreamConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConnector")
            .field("dialer", &self.dialer)
            .finish_non_exhaustive()
    }
}

impl tower::Service<Uri> for UpstreamConnector {
    type Response = TokioIo<UpstreamStream>;
    type Error = DialError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let dialer = self.dialer.clone();
        let tls = self.tls.clone();
        Box::pin(async move {
            let target = Destination::from_uri(&dst)?;
            let addr = target.addr();
            let stream = dialer.dial(&addr).await?;
            if !target.tls {
                return Ok(TokioIo::new(UpstreamStream(Either::Left(stream))));
            }

            let name = ServerName::try_from(target.host.clone())
                .map_err(|_| DialError::ServerName(target.host.clone()))?;
            let stream = tls
                .connect(name, stream)
                .await
                .map_err(|source| DialError::Tls { addr, source })?;
            Ok(TokioIo::new(UpstreamStream(Either::Right(stream))))
        })
    }
}

/// Connection to a destination: plain TCP or TLS over it.
pub struct UpstreamStream(Either<TcpStream, TlsStream<TcpStream>>);

impl Connection for UpstreamStream {
    fn connected(&self) -> Connected {
        match &self.0 {
            Either::Left(tcp) => tcp.connected(),
            Either::Right(tls) => tls.get_ref().0.connected(),
        }
    }
}

impl AsyncRead for UpstreamStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for UpstreamStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

/// Where a forwarded request goes.
#[derive(Debug, PartialEq, Eq)]
struct Destination {
    /// Host without IPv6 brackets, as used for TLS server names.
    host: String,
    port: u16,
    tls: bool,
}

impl Destination {
    /// Ports default to 80 for `http` and 443 for `https`.
    fn from_uri(uri: &Uri) -> Result<Self, DialError> {
        let (tls, default_port) = match uri.scheme_str() {
            Some("http") => (false, 80),
            Some("https") => (true, 443),
            Some(other) => return Err(DialError::UnsupportedScheme(other.to_string())),
            None => return Err(DialError::MissingAddress),
        };
        let host = uri.host().ok_or(DialError::MissingAddress)?;
        Ok(Self {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port: uri.port_u16().unwrap_or(default_port),
            tls,
        })
    }

    /// `host:port` for the dialer.
    fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination(uri: &str) -> Result<Destination, DialError> {
        Destination::from_uri(&uri.parse().unwrap())
    }

    #[test]
    fn ports_default_by_scheme() {
        assert_eq!(
            destination("http://example.com/index.html").unwrap().addr(),
            "example.com:80"
        );
        assert_eq!(
            destination("http://example.com:8080/").unwrap().addr(),
            "example.com:8080"
        );

        let secure = destination("https://example.com/").unwrap();
        assert!(secure.tls);
        assert_eq!(secure.addr(), "example.com:443");
    }

    #[test]
    fn ipv6_hosts_are_bracketed_only_for_dialing() {
        let target = destination("https://[::1]:8443/").unwrap();
        assert_eq!(target.host, "::1");
        assert_eq!(target.addr(), "[::1]:8443");
    }

    #[test]
    fn rejects_other_schemes_and_relative_uris() {
        assert!(matches!(
            destination("ftp://example.com/"),
            Err(DialError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(destination("/relative"), Err(DialError::MissingAddress)));
    }
}
