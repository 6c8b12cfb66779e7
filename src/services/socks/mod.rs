//! SOCKS5 front end for Devproxy
//!
//! A minimal RFC 1928 server: no authentication, CONNECT only. Every CONNECT
//! is dialed through the device-bound dialer.

mod auth;
mod command;
mod consts;
mod handler;
mod tcp_relay;
mod types;

pub use command::{encode_reply, read_request, reply_code_for, RequestError};
pub use handler::handle_socks5_on_stream;
pub use types::{SocksCommand, SocksRequest, TargetAddr};

use crate::helper::DEFAULT_LINGER_SECS;
use crate::services::ServiceHandler;
use crate::transport::DeviceDialer;
use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// SOCKS5 service handler implementing the [`ServiceHandler`] trait.
#[derive(Debug, Clone)]
pub struct Socks5ServiceHandler {
    dialer: DeviceDialer,
    linger: Duration,
}

impl Socks5ServiceHandler {
    /// Create a new SOCKS5 service handler dialing through `dialer`.
    pub fn new(dialer: DeviceDialer) -> Self {
        Self {
            dialer,
            linger: Duration::from_secs(DEFAULT_LINGER_SECS),
        }
    }

    /// Set how long a tunnel direction may idle after the other closed
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Get a reference to the dialer.
    pub fn dialer(&self) -> &DeviceDialer {
        &self.dialer
    }
}

#[async_trait::async_trait]
impl ServiceHandler for Socks5ServiceHandler {
    fn service_type(&self) -> &'static str {
        "socks5"
    }

    async fn handle_tcp_stream(&self, stream: TcpStream, _peer: SocketAddr) -> Result<()> {
        handle_socks5_on_stream(stream, &self.dialer, self.linger).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DialConfig;

    #[test]
    fn test_socks5_service_handler_new() {
        let handler = Socks5ServiceHandler::new(DeviceDialer::new(DialConfig::new("wg0")));
        assert_eq!(handler.service_type(), "socks5");
        assert_eq!(handler.dialer().config().device, "wg0");
    }

    #[test]
    fn test_socks5_service_handler_debug() {
        let handler = Socks5ServiceHandler::new(DeviceDialer::new(DialConfig::unbound()));
        let debug_str = format!("{:?}", handler);
        assert!(debug_str.contains("Socks5ServiceHandler"));
    }
}
