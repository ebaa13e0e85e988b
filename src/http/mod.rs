//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (hyper HTTP/1.1, upgrades enabled, trace layer)
//!     → proxy::dispatch (tunnel or forward)
//!     → response.rs (error mapping, header copy)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use server::ProxyServer;
