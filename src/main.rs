//! Devproxy - Device-Bound Forward Proxy
//!
//! This is the main entry point for the Devproxy application.

use anyhow::{anyhow, Result};
use clap::Parser;
use devproxy::config::{load_config, Config};
use devproxy::supervisor::run_proxy;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Devproxy - SOCKS5 and HTTP proxy that sends traffic out one network device
#[derive(Parser, Debug)]
#[command(name = "devproxy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Network device to bind outbound connections to [default: mangler]
    #[arg(long)]
    device: Option<String>,

    /// HTTP proxy port on 127.0.0.1 [default: 3128]
    #[arg(long)]
    http: Option<u16>,

    /// SOCKS5 proxy port on 127.0.0.1 [default: 8888]
    #[arg(long)]
    socks: Option<u16>,

    /// Path to an optional configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    let mut config = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            info!("Configuration loaded from: {:?}", path);
            config
        }
        None => Config::default(),
    };

    // Command-line flags win over the file
    if let Some(device) = args.device {
        config.proxy.device = device;
    }
    if let Some(port) = args.http {
        config.proxy.http_port = port;
    }
    if let Some(port) = args.socks {
        config.proxy.socks_port = port;
    }
    config
        .proxy
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    info!("Devproxy v{}", devproxy::VERSION);
    info!("Outbound device: {:?}", config.proxy.device);

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Handle Ctrl+C and termination signals (cross-platform)
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            info!("Received Ctrl+C, shutting down...");
                        }
                        _ = sigterm.recv() => {
                            info!("Received SIGTERM, shutting down...");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Received Ctrl+C, shutting down...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down...");
        }

        let _ = shutdown_tx_clone.send(true);
    });

    run_proxy(config.proxy, shutdown_rx).await
}

/// Setup logging based on configuration.
///
/// `RUST_LOG` directives, when set, refine the `--log-level` default.
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    Ok(())
}
