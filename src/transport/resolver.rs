//! Host name resolution
//!
//! The dialer resolves through the [`Resolver`] trait so the lookup can be
//! replaced. Nothing here caches: every call performs a fresh lookup.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::io;
use std::net::IpAddr;

/// Resolves a host name to the set of addresses it points at
#[async_trait]
pub trait Resolver: Debug + Send + Sync {
    /// Look up `host`. An empty result is not an error at this level.
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo`)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let mut ips: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await?
            .map(|addr| addr.ip())
            .collect();
        ips.sort();
        ips.dedup();
        Ok(ips)
    }
}

/// Resolver answering from a fixed table
///
/// Unknown hosts resolve to an empty set.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the answer for `host`
    pub fn with_host(mut self, host: &str, ips: Vec<IpAddr>) -> Self {
        self.hosts.insert(host.to_ascii_lowercase(), ips);
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        Ok(self
            .hosts
            .get(&host.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}
