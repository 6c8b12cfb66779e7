//! HTTP proxy front end
//!
//! Serves CONNECT tunnels and absolute-URI forwarding. Routing decisions are
//! delegated to an [`HttpHooks`] implementation; in the proxy that is the
//! [`ConnectBridge`](crate::bridge::ConnectBridge).

mod handler;
mod hooks;
mod request;

pub use handler::handle_http_on_stream;
pub use hooks::{ConnectAction, HttpHooks};
pub use request::{read_request_head, OriginRequest, RequestHead, MAX_HEAD_SIZE};

use crate::helper::DEFAULT_LINGER_SECS;
use crate::services::ServiceHandler;
use crate::transport::DeviceDialer;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// HTTP service handler
#[derive(Debug, Clone)]
pub struct HttpServiceHandler {
    hooks: Arc<dyn HttpHooks>,
    dialer: DeviceDialer,
    linger: Duration,
}

impl HttpServiceHandler {
    /// Create a handler that routes through `hooks` and forwards plain
    /// requests with `dialer`
    pub fn new(hooks: Arc<dyn HttpHooks>, dialer: DeviceDialer) -> Self {
        Self {
            hooks,
            dialer,
            linger: Duration::from_secs(DEFAULT_LINGER_SECS),
        }
    }

    /// Set how long a relay direction may idle after the other closed
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }
}

#[async_trait::async_trait]
impl ServiceHandler for HttpServiceHandler {
    fn service_type(&self) -> &'static str {
        "http"
    }

    async fn handle_tcp_stream(&self, stream: TcpStream, _peer: SocketAddr) -> Result<()> {
        handle_http_on_stream(stream, self.hooks.as_ref(), &self.dialer, self.linger).await
    }
}
