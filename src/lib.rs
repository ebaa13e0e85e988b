//! Forward HTTP proxy library.
//!
//! CONNECT requests become raw TCP tunnels; every other request is
//! forwarded and its response relayed back. Destinations are reached
//! directly or through a SOCKS5 server chosen at startup.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
pub use upstream::Dialer;
