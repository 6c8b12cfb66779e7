//! Transport module for Devproxy
//!
//! This module provides the outbound side of the proxy: address parsing,
//! host resolution and the device-bound dialer shared by both front ends.

mod addr;
mod dialer;
mod resolver;

pub use addr::{has_port, normalize_target, split_host_port, DEFAULT_HTTP_PORT};
pub use dialer::{DeviceDialer, DialConfig, DialPlan};
pub use resolver::{Resolver, StaticResolver, SystemResolver};

use crate::error::ProxyError;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Network kind of a dial request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// TCP over either family
    Tcp,
    /// TCP over IPv4 only
    Tcp4,
    /// TCP over IPv6 only
    Tcp6,
}

impl Network {
    /// Narrow the network to the family of `ip`.
    ///
    /// Returns `None` when the network is already pinned to the other family.
    pub fn for_ip(self, ip: IpAddr) -> Option<Network> {
        match (self, ip) {
            (Network::Tcp | Network::Tcp4, IpAddr::V4(_)) => Some(Network::Tcp4),
            (Network::Tcp | Network::Tcp6, IpAddr::V6(_)) => Some(Network::Tcp6),
            _ => None,
        }
    }

    /// Name used in dial requests
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
        }
    }
}

impl FromStr for Network {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(ProxyError::InvalidAddress(format!(
                "unsupported network {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
