//! Forward HTTP proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                FORWARD PROXY                 │
//!     Client              │  ┌──────────┐   ┌──────────┐                 │
//!     ────────────────────┼─▶│   net    │──▶│  http    │                 │
//!     (HTTP or HTTPS)     │  │ listener │   │  server  │                 │
//!                         │  │  + tls   │   │ (HTTP/1) │                 │
//!                         │  └──────────┘   └────┬─────┘                 │
//!                         │                      │ dispatch              │
//!                         │          CONNECT ┌───┴────┐ other            │
//!                         │                  ▼        ▼                  │
//!                         │          ┌──────────┐ ┌──────────┐           │
//!                         │          │  tunnel  │ │ forward  │           │
//!                         │          │ + relay  │ │          │           │
//!                         │          └────┬─────┘ └────┬─────┘           │
//!                         │               ▼            ▼                 │
//!                         │          ┌──────────────────────┐            │  Destination
//!                         │          │  upstream dialer     │────────────┼──▶ (direct or
//!                         │          │  direct | socks5     │            │     via SOCKS5)
//!                         │          └──────────────────────┘            │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use forward_proxy::config::{read_config, Protocol, ProxyConfig};
use forward_proxy::lifecycle::{self, signals, Shutdown};
use forward_proxy::observability;

#[derive(Parser, Debug)]
#[command(name = "forward-proxy", version, about = "Forward HTTP proxy with CONNECT tunneling and optional SOCKS5 upstream", long_about = None)]
struct Cli {
    /// Optional TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on [default: 0.0.0.0:8888]
    #[arg(long)]
    addr: Option<String>,

    /// Protocol to serve: http or https [default: https]
    #[arg(long)]
    proto: Option<Protocol>,

    /// Path to the PEM certificate [default: server.pem]
    #[arg(long)]
    pem: Option<String>,

    /// Path to the PEM private key [default: server.key]
    #[arg(long)]
    key: Option<String>,

    /// SOCKS5 server (host:port) to reach destinations through
    #[arg(long)]
    socks: Option<String>,

    /// Extra PEM trust anchors for forwarded https:// requests
    #[arg(long)]
    ca_file: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_addr: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, forward_proxy::config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(addr) = self.addr {
            config.listener.bind_address = addr;
        }
        if let Some(proto) = self.proto {
            config.listener.protocol = proto;
        }
        if let Some(pem) = self.pem {
            config.tls.cert_path = pem;
        }
        if let Some(key) = self.key {
            config.tls.key_path = key;
        }
        if let Some(socks) = self.socks {
            config.upstream.socks5 = Some(socks).filter(|s| !s.is_empty());
        }
        if let Some(ca_file) = self.ca_file {
            config.upstream.ca_file = Some(ca_file);
        }
        if let Some(metrics_addr) = self.metrics_addr {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = metrics_addr;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    observability::logging::init(&config.observability.log_filter);

    tracing::info!("forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        protocol = %config.listener.protocol,
        socks5 = config.upstream.socks5.as_deref().unwrap_or("none"),
        max_connections = config.listener.max_connections,
        "Configuration loaded"
    );

    let prepared = lifecycle::prepare(&config).await?;

    if config.observability.metrics_enabled {
        // Address already validated by prepare().
        let addr = config.observability.metrics_address.parse()?;
        observability::metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    prepared
        .server
        .run(prepared.listener, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
