//! Proxy configuration types
//!
//! Defines the top-level configuration for the two front ends and the device
//! the outbound connections are bound to.

use super::{BridgeSettings, DialSettings};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Longest interface name the kernel accepts (IFNAMSIZ minus the NUL)
pub const MAX_DEVICE_NAME_LEN: usize = 15;

fn default_device() -> String {
    "mangler".to_string()
}

fn default_http_port() -> u16 {
    3128
}

fn default_socks_port() -> u16 {
    8888
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Proxy configuration
    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// Proxy configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProxyConfig {
    /// Network device outbound sockets are bound to.
    /// An empty name leaves sockets unbound.
    #[serde(default = "default_device")]
    pub device: String,

    /// HTTP proxy port on 127.0.0.1
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// SOCKS5 port on 127.0.0.1
    #[serde(default = "default_socks_port")]
    pub socks_port: u16,

    /// Dialer settings
    #[serde(default)]
    pub dial: DialSettings,

    /// CONNECT bridge settings
    #[serde(default)]
    pub bridge: BridgeSettings,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            http_port: default_http_port(),
            socks_port: default_socks_port(),
            dial: DialSettings::default(),
            bridge: BridgeSettings::default(),
        }
    }
}

impl ProxyConfig {
    /// Loopback address the HTTP front end listens on
    pub fn http_listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.http_port))
    }

    /// Loopback address the SOCKS5 front end listens on
    pub fn socks_listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.socks_port))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.device.len() > MAX_DEVICE_NAME_LEN {
            return Err(format!(
                "Device name {:?} is longer than {} bytes",
                self.device, MAX_DEVICE_NAME_LEN
            ));
        }
        if self.device.contains('\0') {
            return Err("Device name contains a NUL byte".to_string());
        }
        if self.http_port != 0 && self.http_port == self.socks_port {
            return Err(format!(
                "HTTP and SOCKS5 ports must differ (both are {})",
                self.http_port
            ));
        }
        self.dial.validate()?;
        self.bridge.validate()
    }
}
