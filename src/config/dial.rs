//! Dialer and bridge configuration types
//!
//! Retry policy, timeouts and rendezvous settings for outbound connections.

use crate::helper::{
    RetryConfig, DEFAULT_ACCEPT_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_DIAL_ATTEMPTS,
    DEFAULT_LINGER_SECS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_max_retries() -> u32 {
    DEFAULT_DIAL_ATTEMPTS
}

fn default_retry_initial_delay_ms() -> u64 {
    10
}

fn default_retry_max_delay_ms() -> u64 {
    500
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_accept_timeout_secs() -> u64 {
    DEFAULT_ACCEPT_TIMEOUT_SECS
}

fn default_linger_timeout_secs() -> u64 {
    DEFAULT_LINGER_SECS
}

/// Device-bound dialer settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DialSettings {
    /// Bind/connect attempts per dial
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after the first failed attempt, in milliseconds
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    /// Upper bound for the backoff delay, in milliseconds
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Timeout of a single connect attempt, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for DialSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl DialSettings {
    /// Build the retry policy described by these settings
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            ..Default::default()
        }
    }

    /// Per-attempt connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("dial.max_retries must be at least 1".to_string());
        }
        if self.connect_timeout_secs == 0 {
            return Err("dial.connect_timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

/// CONNECT bridge settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BridgeSettings {
    /// How long a rendezvous listener waits for the front end to connect
    #[serde(default = "default_accept_timeout_secs")]
    pub accept_timeout_secs: u64,

    /// How long a relay direction may stay idle after the other direction
    /// has closed, in seconds
    #[serde(default = "default_linger_timeout_secs")]
    pub linger_timeout_secs: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            accept_timeout_secs: default_accept_timeout_secs(),
            linger_timeout_secs: default_linger_timeout_secs(),
        }
    }
}

impl BridgeSettings {
    /// Rendezvous accept timeout
    pub fn accept_timeout(&self) -> Duration {
        Duration::from_secs(self.accept_timeout_secs)
    }

    /// Idle allowance for the surviving relay direction
    pub fn linger(&self) -> Duration {
        Duration::from_secs(self.linger_timeout_secs)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), String> {
        // A zero accept timeout would race the front end's own connect
        if self.accept_timeout_secs == 0 {
            return Err("bridge.accept_timeout_secs must be at least 1".to_string());
        }
        if self.linger_timeout_secs == 0 {
            return Err("bridge.linger_timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }
}
