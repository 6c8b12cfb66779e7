//! Error types for Devproxy
//!
//! This module defines the error taxonomy shared by the dialer, the CONNECT
//! bridge and the front ends.

use std::io;
use thiserror::Error;

/// Main error type for Devproxy operations
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Host could not be resolved, or resolved to nothing
    #[error("cannot resolve {host}: {reason}")]
    Resolution {
        /// Host that failed to resolve
        host: String,
        /// Resolver message
        reason: String,
    },

    /// Device bind or connect failed after the retry budget
    #[error("cannot dial {addr} via device {device:?} after {attempts} attempt(s): {source}")]
    Dial {
        /// Address that was being dialed
        addr: String,
        /// Device the socket was bound to (empty when unbound)
        device: String,
        /// Number of attempts made
        attempts: u32,
        /// Last failure
        #[source]
        source: io::Error,
    },

    /// Rendezvous listener could not be opened
    #[error("cannot listen on {addr}: {source}")]
    Listen {
        /// Address the listener tried to bind
        addr: String,
        /// Bind failure
        #[source]
        source: io::Error,
    },

    /// One direction of a tunnel relay failed
    #[error("relay {direction} failed after {bytes} bytes: {source}")]
    Relay {
        /// Direction label, e.g. "local->remote"
        direction: &'static str,
        /// Bytes copied in that direction before the failure
        bytes: u64,
        /// Copy failure
        #[source]
        source: io::Error,
    },

    /// A front-end server failed to bind its port
    #[error("cannot start {service} server on {addr}: {source}")]
    Startup {
        /// Service name ("socks5" or "http")
        service: &'static str,
        /// Listen address
        addr: String,
        /// Bind failure
        #[source]
        source: io::Error,
    },

    /// Malformed address or network kind
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ProxyError {
    /// The io error underlying a dial or relay failure, if any
    pub fn io_source(&self) -> Option<&io::Error> {
        match self {
            ProxyError::Dial { source, .. }
            | ProxyError::Listen { source, .. }
            | ProxyError::Relay { source, .. }
            | ProxyError::Startup { source, .. } => Some(source),
            ProxyError::Io(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this error ends the process rather than a single request
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProxyError::Startup { .. })
    }
}

/// Convenience result alias for core operations
pub type Result<T> = std::result::Result<T, ProxyError>;
