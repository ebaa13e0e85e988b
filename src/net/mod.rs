//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (optional TLS handshake, HTTP/1.1 only)
//!     → Hand off to HTTP layer
//!
//! CONNECT requests:
//!     → connection.rs (tunnel ID, live tunnel count)
//! ```
//!
//! # Design Decisions
//! - Bounded accept: a client connection holds its slot for as long as its
//!   HTTP session or CONNECT tunnel lives
//! - TLS is optional and handled transparently

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionTracker, TunnelId};
pub use listener::{ConnectionSlot, Listener, ListenerError};
pub use tls::{client_tls_connector, load_tls_acceptor, TlsError};
