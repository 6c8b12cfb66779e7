//! Test utilities for Devproxy
//!
//! Loopback servers and a fully wired proxy bound to ephemeral ports with an
//! unbound dialer, so integration tests need no privileges.

#![allow(dead_code)]

use devproxy::config::ProxyConfig;
use devproxy::helper::RetryConfig;
use devproxy::transport::{DeviceDialer, DialConfig, StaticResolver};
use devproxy::Supervisor;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Host name the test resolver maps to 127.0.0.1
pub const TEST_HOST: &str = "echo.test";

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start a server that echoes every connection until EOF
pub async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Start an origin server that answers every request with `body`
pub async fn spawn_http_origin(body: &'static str) -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_head(&mut stream).await.is_empty() {
                    return;
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
            });
        }
    });
    addr
}

/// An address nothing listens on
pub async fn refused_addr() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    addr
}

/// Read up to and including the blank line ending an HTTP head
pub async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(1) => head.push(byte[0]),
            _ => break,
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// A running proxy with both front ends on ephemeral ports
pub struct TestProxy {
    pub socks_addr: SocketAddr,
    pub http_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<bool>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestProxy {
    /// Bind and start the proxy
    pub async fn start() -> Self {
        let config = ProxyConfig {
            device: String::new(),
            http_port: 0,
            socks_port: 0,
            ..Default::default()
        };
        let resolver = StaticResolver::new()
            .with_host(TEST_HOST, vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]);
        let dialer = DeviceDialer::with_resolver(
            DialConfig::unbound().with_retry(RetryConfig::immediate(2)),
            Arc::new(resolver),
        );

        let supervisor = Supervisor::bind_with_dialer(&config, dialer).await.unwrap();
        let socks_addr = supervisor.socks_addr().unwrap();
        let http_addr = supervisor.http_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(supervisor.run(shutdown_rx));

        TestProxy {
            socks_addr,
            http_addr,
            shutdown_tx,
            task,
        }
    }

    /// Signal shutdown and wait for the supervisor to return
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        self.task.await.unwrap().unwrap();
    }
}
