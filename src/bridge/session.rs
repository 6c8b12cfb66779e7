//! Handle to a running CONNECT tunnel
//!
//! The tunnel worker runs as its own task. Dropping the handle detaches it;
//! awaiting [`TunnelSession::wait`] observes its teardown.

use crate::error::{ProxyError, Result};
use crate::relay::RelayStats;
use std::io;
use std::net::SocketAddr;
use tokio::task::JoinHandle;

/// A CONNECT tunnel between a rendezvous listener and a device-bound target
#[derive(Debug)]
pub struct TunnelSession {
    target: String,
    rendezvous: SocketAddr,
    handle: JoinHandle<Result<RelayStats>>,
}

impl TunnelSession {
    pub(crate) fn new(
        target: String,
        rendezvous: SocketAddr,
        handle: JoinHandle<Result<RelayStats>>,
    ) -> Self {
        TunnelSession {
            target,
            rendezvous,
            handle,
        }
    }

    /// Normalized `host:port` the tunnel dials
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Loopback address the front end must connect to
    pub fn rendezvous_addr(&self) -> SocketAddr {
        self.rendezvous
    }

    /// Wait for the tunnel to end and return its outcome
    pub async fn wait(self) -> Result<RelayStats> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(ProxyError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("tunnel task for {} failed: {}", self.target, e),
            ))),
        }
    }

    /// Abort the tunnel, closing both connections
    pub fn abort(&self) {
        self.handle.abort();
    }
}
