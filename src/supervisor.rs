//! Process supervisor
//!
//! Binds both front-end listeners, serves them side by side and stops when
//! either one exits or a shutdown signal arrives.

use crate::bridge::{BridgeConfig, ConnectBridge};
use crate::config::ProxyConfig;
use crate::services::{bind_listener, serve, HttpServiceHandler, Socks5ServiceHandler};
use crate::transport::{DeviceDialer, DialConfig};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

/// Both front ends with their listeners bound
#[derive(Debug)]
pub struct Supervisor {
    socks_listener: TcpListener,
    http_listener: TcpListener,
    socks: Arc<Socks5ServiceHandler>,
    http: Arc<HttpServiceHandler>,
}

impl Supervisor {
    /// Bind both listeners for `config`.
    ///
    /// A listener that cannot be bound is a [`ProxyError::Startup`](crate::ProxyError::Startup).
    pub async fn bind(config: &ProxyConfig) -> Result<Self> {
        let dialer = DeviceDialer::new(DialConfig::from_settings(
            config.device.clone(),
            &config.dial,
        ));
        Self::bind_with_dialer(config, dialer).await
    }

    /// Bind both listeners, dialing targets with `dialer`
    pub async fn bind_with_dialer(config: &ProxyConfig, dialer: DeviceDialer) -> Result<Self> {
        let socks_listener = bind_listener("socks5", config.socks_listen_addr()).await?;
        let http_listener = bind_listener("http", config.http_listen_addr()).await?;

        let bridge = Arc::new(ConnectBridge::new(
            dialer.clone(),
            BridgeConfig::from_settings(&config.bridge),
        ));

        let linger = config.bridge.linger();
        Ok(Supervisor {
            socks_listener,
            http_listener,
            socks: Arc::new(Socks5ServiceHandler::new(dialer.clone()).with_linger(linger)),
            http: Arc::new(HttpServiceHandler::new(bridge, dialer).with_linger(linger)),
        })
    }

    /// Address the SOCKS5 server listens on
    pub fn socks_addr(&self) -> Result<SocketAddr> {
        Ok(self.socks_listener.local_addr()?)
    }

    /// Address the HTTP server listens on
    pub fn http_addr(&self) -> Result<SocketAddr> {
        Ok(self.http_listener.local_addr()?)
    }

    /// Serve both front ends until one of them exits or shutdown is signalled.
    ///
    /// A server exiting on its own is an error; a shutdown signal is not.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        let socks = serve(self.socks_listener, self.socks);
        let http = serve(self.http_listener, self.http);

        tokio::select! {
            result = socks => {
                result?;
                anyhow::bail!("socks5 server exited");
            }
            result = http => {
                result?;
                anyhow::bail!("http server exited");
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    }
}

/// Bind and run the proxy described by `config`
pub async fn run_proxy(config: ProxyConfig, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    let supervisor = Supervisor::bind(&config).await?;
    info!(
        "Proxying through device {:?}: socks5 on {}, http on {}",
        config.device,
        supervisor.socks_addr()?,
        supervisor.http_addr()?
    );
    supervisor.run(shutdown_rx).await
}
