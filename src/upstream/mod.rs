//! Upstream subsystem: how the proxy reaches destinations.
//!
//! # Data Flow
//! ```text
//! UpstreamConfig (socks5 = None | Some(addr))
//!     → dialer.rs (Direct | Socks5), fixed for the process
//!     → tunnel relay dials raw streams directly
//!     → connector.rs wraps the same dialer for the forward relay's client,
//!       adding TLS for https:// destinations
//! ```

pub mod connector;
pub mod dialer;

pub use connector::{build_transport, Transport, UpstreamConnector, UpstreamStream};
pub use dialer::{DialError, Dialer};
