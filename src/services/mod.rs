//! Front-end services for Devproxy
//!
//! This module hosts the two protocol front ends (SOCKS5 and HTTP). Both
//! implement the [`ServiceHandler`] trait and are driven by the same accept
//! loop, [`serve`], which spawns one task per connection.

pub mod http;
pub mod socks;

use crate::error::ProxyError;
use anyhow::Result;
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

// Re-export service handler implementations
pub use http::HttpServiceHandler;
pub use socks::Socks5ServiceHandler;

/// Consecutive accept failures after which a server gives up
const MAX_CONSECUTIVE_ACCEPT_ERRORS: u32 = 100;

/// Trait that all front-end handlers implement.
///
/// A ServiceHandler owns one accepted client connection for its whole
/// lifetime. Errors it returns are logged by [`serve`] and never affect
/// other connections.
#[async_trait::async_trait]
pub trait ServiceHandler: Send + Sync + Debug {
    /// Human-readable name of this service type (e.g., "socks5", "http").
    fn service_type(&self) -> &'static str;

    /// Handle one accepted client connection.
    async fn handle_tcp_stream(&self, stream: TcpStream, peer: SocketAddr) -> Result<()>;
}

/// Bind a front-end listener, mapping failure to [`ProxyError::Startup`]
pub async fn bind_listener(
    service: &'static str,
    addr: SocketAddr,
) -> std::result::Result<TcpListener, ProxyError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ProxyError::Startup {
            service,
            addr: addr.to_string(),
            source,
        })
}

/// Accept connections forever, handing each to `handler` on its own task.
///
/// Returns only when accepting keeps failing.
pub async fn serve(listener: TcpListener, handler: Arc<dyn ServiceHandler>) -> Result<()> {
    let service = handler.service_type();
    if let Ok(addr) = listener.local_addr() {
        info!("{} server listening on {}", service, addr);
    }

    let mut consecutive_errors = 0u32;
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => {
                consecutive_errors = 0;
                accepted
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_ACCEPT_ERRORS {
                    anyhow::bail!("{} server stopped accepting: {}", service, e);
                }
                warn!("{} accept failed: {}", service, e);
                if !is_connection_error(&e) {
                    // Typically descriptor exhaustion; give handlers time to finish
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                continue;
            }
        };

        debug!("{} connection from {}", service, peer);
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handler.handle_tcp_stream(stream, peer).await {
                error!("{} connection from {} failed: {:#}", handler.service_type(), peer, e);
            }
        });
    }
}

/// Errors that concern only the connection being accepted
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}
