//! # Devproxy - Device-Bound Forward Proxy
//!
//! Devproxy is a local forward proxy that sends all outbound traffic through
//! one named network device (for example a VPN or mangling interface),
//! regardless of the host's routing table.
//!
//! ## Features
//!
//! - **SOCKS5 front end**: RFC 1928 CONNECT without authentication
//! - **HTTP front end**: CONNECT tunnels and absolute-URI forwarding
//! - **Device-bound dialing**: every upstream socket is bound with
//!   `SO_BINDTODEVICE` before it connects
//! - **Loopback rendezvous**: CONNECT tunnels are bridged through a
//!   single-use listener on 127.0.0.1
//!
//! ## Usage
//!
//! ```rust,ignore
//! use devproxy::config::load_config;
//! use devproxy::supervisor::run_proxy;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("devproxy.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_proxy(config.proxy, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 client -> SOCKS5 server ----------------------> DeviceDialer -> device -> target
//! HTTP client   -> HTTP server -> 127.0.0.1 rendezvous -> DeviceDialer -> device -> target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bridge;
pub mod config;
pub mod error;
pub mod helper;
pub mod relay;
pub mod services;
pub mod supervisor;
pub mod transport;

// Re-export commonly used items
pub use bridge::{ConnectBridge, TunnelSession};
pub use config::{load_config, Config, ProxyConfig};
pub use error::ProxyError;
pub use supervisor::{run_proxy, Supervisor};
pub use transport::{DeviceDialer, DialConfig};

/// Version of the Devproxy library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
