//! Configuration module for Devproxy
//!
//! This module provides configuration types and parsing. Values come from an
//! optional TOML file and are then overridden by command-line flags.

mod dial;
mod proxy;

pub use dial::{BridgeSettings, DialSettings};
pub use proxy::{Config, ProxyConfig, MAX_DEVICE_NAME_LEN};

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse configuration")
}
