//! Device-bound TCP dialer
//!
//! Resolves the destination, picks a single address, and opens a TCP
//! connection whose socket is bound to the configured network device before
//! `connect` is issued.

use super::addr::split_host_port;
use super::resolver::{Resolver, SystemResolver};
use super::Network;
use crate::config::DialSettings;
use crate::error::{ProxyError, Result};
use crate::helper::{RetryConfig, DEFAULT_CONNECT_TIMEOUT_SECS};
use rand::seq::SliceRandom;
use socket2::SockRef;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpSocket, TcpStream};
use tracing::{debug, warn};

/// Immutable dialer configuration, built once at startup
#[derive(Debug, Clone)]
pub struct DialConfig {
    /// Device outbound sockets are bound to; empty means unbound
    pub device: String,
    /// Bind/connect attempt policy
    pub retry: RetryConfig,
    /// Timeout of a single connect attempt
    pub connect_timeout: Duration,
}

impl DialConfig {
    /// Configuration for `device` with the default retry policy
    pub fn new(device: impl Into<String>) -> Self {
        DialConfig {
            device: device.into(),
            retry: RetryConfig::default(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Configuration that leaves sockets unbound
    pub fn unbound() -> Self {
        Self::new(String::new())
    }

    /// Configuration for `device` using file/CLI settings
    pub fn from_settings(device: impl Into<String>, settings: &DialSettings) -> Self {
        DialConfig {
            device: device.into(),
            retry: settings.retry_config(),
            connect_timeout: settings.connect_timeout(),
        }
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-attempt connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Whether sockets get bound to a device
    pub fn is_bound(&self) -> bool {
        !self.device.is_empty()
    }
}

/// Outcome of resolution and family selection for one dial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialPlan {
    /// Family-specific network (`tcp4` or `tcp6`)
    pub network: Network,
    /// The single address that will be connected to
    pub addr: SocketAddr,
}

/// Dialer that binds every outbound socket to one network device
#[derive(Debug, Clone)]
pub struct DeviceDialer {
    config: Arc<DialConfig>,
    resolver: Arc<dyn Resolver>,
}

impl DeviceDialer {
    /// Create a dialer using the system resolver
    pub fn new(config: DialConfig) -> Self {
        Self::with_resolver(config, Arc::new(SystemResolver))
    }

    /// Create a dialer using a custom resolver
    pub fn with_resolver(config: DialConfig, resolver: Arc<dyn Resolver>) -> Self {
        DeviceDialer {
            config: Arc::new(config),
            resolver,
        }
    }

    /// Get the dialer configuration
    pub fn config(&self) -> &DialConfig {
        &self.config
    }

    /// Resolve `addr` and select the address family, without opening a socket.
    ///
    /// Literal IPs never reach the resolver. Host names are resolved freshly
    /// and one answer is picked uniformly at random.
    pub async fn plan(&self, network: &str, addr: &str) -> Result<DialPlan> {
        let requested: Network = network.parse()?;
        let (host, port) = split_host_port(addr)?;

        let ip = match host.parse::<IpAddr>() {
            Ok(ip) => ip,
            Err(_) => self.resolve_one(host).await?,
        };
        let ip = canonical_ip(ip);

        let network = requested.for_ip(ip).ok_or_else(|| ProxyError::Dial {
            addr: SocketAddr::new(ip, port).to_string(),
            device: self.config.device.clone(),
            attempts: 0,
            source: io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{} cannot reach {}", requested, ip),
            ),
        })?;

        Ok(DialPlan {
            network,
            addr: SocketAddr::new(ip, port),
        })
    }

    /// Open a device-bound connection to `addr` (`host:port`).
    pub async fn dial(&self, network: &str, addr: &str) -> Result<TcpStream> {
        let plan = self.plan(network, addr).await?;
        debug!("Dialing {} as {} {}", addr, plan.network, plan.addr);
        self.connect(&plan).await
    }

    /// Connect according to a previously computed plan
    pub async fn connect(&self, plan: &DialPlan) -> Result<TcpStream> {
        let retry = &self.config.retry;
        let mut attempts = 0;
        let mut last_err = None;

        while attempts < retry.max_retries {
            if attempts > 0 {
                let delay = retry.delay_for_attempt(attempts - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            attempts += 1;

            match self.connect_once(plan).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    let retryable = is_retryable(&e);
                    debug!(
                        "Attempt {}/{} to {} failed: {}",
                        attempts, retry.max_retries, plan.addr, e
                    );
                    last_err = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        let source = last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "retry budget is zero")
        });
        Err(ProxyError::Dial {
            addr: plan.addr.to_string(),
            device: self.config.device.clone(),
            attempts,
            source,
        })
    }

    async fn connect_once(&self, plan: &DialPlan) -> io::Result<TcpStream> {
        let socket = match plan.network {
            Network::Tcp6 => TcpSocket::new_v6()?,
            _ => TcpSocket::new_v4()?,
        };

        if self.config.is_bound() {
            bind_to_device(&SockRef::from(&socket), &self.config.device)?;
        }

        let stream = tokio::time::timeout(self.config.connect_timeout, socket.connect(plan.addr))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {} timed out", plan.addr),
                )
            })??;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY on {}: {}", plan.addr, e);
        }

        Ok(stream)
    }

    async fn resolve_one(&self, host: &str) -> Result<IpAddr> {
        let ips = self
            .resolver
            .resolve(host)
            .await
            .map_err(|e| ProxyError::Resolution {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        let chosen = ips.choose(&mut rand::thread_rng()).copied();
        chosen.ok_or_else(|| ProxyError::Resolution {
            host: host.to_string(),
            reason: "does not resolve to an IP address".to_string(),
        })
    }
}

/// Treat IPv4-mapped IPv6 addresses as IPv4
fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

/// Failures that another attempt cannot fix
fn is_retryable(err: &io::Error) -> bool {
    !matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported
    )
}

#[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
fn bind_to_device(socket: &SockRef<'_>, device: &str) -> io::Result<()> {
    socket.bind_device(Some(device.as_bytes()))
}

#[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
fn bind_to_device(_socket: &SockRef<'_>, device: &str) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("binding to device {:?} is not supported on this platform", device),
    ))
}
