//! Destination dialing, direct or through a SOCKS5 hop.
//!
//! # Responsibilities
//! - Open a TCP stream to `host:port`
//! - Optionally negotiate a no-auth SOCKS5 CONNECT through a fixed intermediary
//! - Report every failure as a single [`DialError`]
//!
//! # Design Decisions
//! - One enum chosen at startup, never switched per request
//! - Both variants hand back a plain `TcpStream`: once the SOCKS5 server
//!   confirms the relay, the socket is a transparent byte pipe
//! - Immutable and cheap to clone, so concurrent dials need no locking

use std::fmt;

use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

use crate::config::UpstreamConfig;

/// Failure to reach a destination.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("dial tcp {addr}: {source}")]
    Direct {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("socks5 {proxy} -> {addr}: {source}")]
    Socks5 {
        proxy: String,
        addr: String,
        #[source]
        source: tokio_socks::Error,
    },

    #[error("missing destination address")]
    MissingAddress,

    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("invalid TLS server name {0:?}")]
    ServerName(String),

    #[error("tls handshake with {addr}: {source}")]
    Tls {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Strategy used to open connections to destinations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Dialer {
    /// Plain TCP connect.
    #[default]
    Direct,
    /// Relay through a SOCKS5 server without authentication.
    Socks5 { proxy: String },
}

impl Dialer {
    /// Pick the strategy from configuration.
    pub fn from_config(config: &UpstreamConfig) -> Self {
        match &config.socks5 {
            Some(proxy) => Dialer::Socks5 {
                proxy: proxy.clone(),
            },
            None => Dialer::Direct,
        }
    }

    /// Connect to `addr` (`host:port`).
    pub async fn dial(&self, addr: &str) -> Result<TcpStream, DialError> {
        if addr.is_empty() {
            return Err(DialError::MissingAddress);
        }

        match self {
            Dialer::Direct => {
                TcpStream::connect(addr)
                    .await
                    .map_err(|source| DialError::Direct {
                        addr: addr.to_string(),
                        source,
                    })
            }
            Dialer::Socks5 { proxy } => {
                let stream = Socks5Stream::connect(proxy.as_str(), addr)
                    .await
                    .map_err(|source| DialError::Socks5 {
                        proxy: proxy.clone(),
                        addr: addr.to_string(),
                        source,
                    })?;
                tracing::trace!(proxy = %proxy, addr = %addr, "SOCKS5 relay established");
                Ok(stream.into_inner())
            }
        }
    }
}

impl fmt::Display for Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialer::Direct => f.write_str("direct"),
            Dialer::Socks5 { proxy } => write!(f, "socks5://{}", proxy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    #[test]
    fn strategy_follows_config() {
        assert_eq!(Dialer::from_config(&UpstreamConfig::default()), Dialer::Direct);

        let config = UpstreamConfig {
            socks5: Some("127.0.0.1:1080".into()),
            ..UpstreamConfig::default()
        };
        assert_eq!(
            Dialer::from_config(&config),
            Dialer::Socks5 {
                proxy: "127.0.0.1:1080".into()
            }
        );
    }

    #[tokio::test]
    async fn direct_dial_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"hello").await.unwrap();
        });

        let mut stream = Dialer::Direct.dial(&addr.to_string()).await.unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn direct_dial_refused() {
        let addr = closed_port().await;
        let err = Dialer::Direct.dial(&addr).await.unwrap_err();
        assert!(matches!(err, DialError::Direct { .. }));
        assert!(err.to_string().contains(&addr));
    }

    #[tokio::test]
    async fn socks5_dial_fails_when_proxy_down() {
        let proxy = closed_port().await;
        let dialer = Dialer::Socks5 {
            proxy: proxy.clone(),
        };
        let err = dialer.dial("example.com:80").await.unwrap_err();
        assert!(matches!(err, DialError::Socks5 { .. }));
        assert!(err.to_string().contains(&proxy));
    }

    #[tokio::test]
    async fn empty_address_rejected() {
        let err = Dialer::Direct.dial("").await.unwrap_err();
        assert!(matches!(err, DialError::MissingAddress));
    }
}
