//! Error types for the link engine
//!
//! Network failures are handled inside the supervising task and never
//! surface to the caller; `LinkError` exists for construction-time
//! validation and for diagnostic logging inside the retry loops.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for link operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Core error type for the link engine
#[derive(Error, Debug)]
pub enum LinkError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Hostname resolution failed
    #[error("resolution of '{host}' failed: {source}")]
    Resolution {
        /// Hostname that was being resolved
        host: String,
        /// Underlying resolver error
        source: io::Error,
    },

    /// Resolution succeeded but returned no usable IPv4 address
    #[error("no usable IPv4 address for '{host}'")]
    NoAddress {
        /// Hostname that was resolved
        host: String,
    },

    /// A connection attempt failed
    #[error("connect to {addr} failed: {source}")]
    Connect {
        /// Endpoint the attempt targeted
        addr: SocketAddr,
        /// Underlying socket error
        source: io::Error,
    },
}

impl LinkError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// How a transport-level failure steers the reconnect protocol.
///
/// `PeerClosed` and `PeerReset` always trigger reconnection. `Unclassified`
/// is logged and halts only the receive arm; the send path stays the
/// authoritative liveness detector in that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disruption {
    /// Orderly shutdown by the remote endpoint (zero-length read)
    PeerClosed,
    /// Abrupt termination reported by the platform
    PeerReset,
    /// Any other transport error
    Unclassified,
}

impl Disruption {
    /// Classify a read/send error from the underlying socket.
    pub fn from_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::PeerReset,
            io::ErrorKind::UnexpectedEof => Self::PeerClosed,
            _ => Self::Unclassified,
        }
    }
}
