//! CONNECT tunnel bridge
//!
//! The HTTP front end only knows how to satisfy a CONNECT by connecting to an
//! address. To hand it a device-bound connection instead, the bridge opens a
//! loopback listener, returns that listener's address right away, and in the
//! background dials the real target, accepts the single front-end connection
//! and relays between the two.
//!
//! ```text
//! HTTP client -> front end -> 127.0.0.1:<ephemeral> -> bridge -> device -> target
//! ```

mod session;

pub use session::TunnelSession;

use crate::config::BridgeSettings;
use crate::error::{ProxyError, Result};
use crate::helper::{DEFAULT_ACCEPT_TIMEOUT_SECS, DEFAULT_LINGER_SECS};
use crate::relay::{relay, RelayStats};
use crate::services::http::{ConnectAction, HttpHooks, RequestHead};
use crate::transport::{normalize_target, DeviceDialer};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Level};

/// CONNECT bridge settings
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Where rendezvous listeners are opened (port 0 picks a free one)
    pub rendezvous_addr: SocketAddr,
    /// How long a listener waits for the front end to connect
    pub accept_timeout: Duration,
    /// Idle allowance for one tunnel direction after the other has closed
    pub linger: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            rendezvous_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            accept_timeout: Duration::from_secs(DEFAULT_ACCEPT_TIMEOUT_SECS),
            linger: Duration::from_secs(DEFAULT_LINGER_SECS),
        }
    }
}

impl BridgeConfig {
    /// Build from file/CLI settings
    pub fn from_settings(settings: &BridgeSettings) -> Self {
        BridgeConfig {
            accept_timeout: settings.accept_timeout(),
            linger: settings.linger(),
            ..Default::default()
        }
    }
}

/// Result of a CONNECT decision
#[derive(Debug)]
pub struct ConnectDecision {
    /// What the front end should connect to
    pub action: ConnectAction,
    /// The background tunnel, absent in degraded mode
    pub session: Option<TunnelSession>,
}

/// Fulfils HTTP CONNECT requests through the device-bound dialer
#[derive(Debug, Clone)]
pub struct ConnectBridge {
    dialer: DeviceDialer,
    config: BridgeConfig,
}

impl ConnectBridge {
    /// Create a new bridge
    pub fn new(dialer: DeviceDialer, config: BridgeConfig) -> Self {
        ConnectBridge { dialer, config }
    }

    /// Get the dialer used for tunnel targets
    pub fn dialer(&self) -> &DeviceDialer {
        &self.dialer
    }

    /// Decide how a CONNECT to `host` is served.
    ///
    /// Never waits for the tunnel: the rendezvous address is returned while
    /// the dial, accept and relay proceed on a spawned task. If no listener
    /// can be opened, the front end is told to connect to the target directly
    /// (no device binding). Must be called from within a Tokio runtime.
    pub fn connect_decision(&self, host: &str) -> ConnectDecision {
        let target = normalize_target(host);

        let listener = match self.listen() {
            Ok(listener) => listener,
            Err(e) => {
                warn!("{}; proxying {} without device binding", e, target);
                return ConnectDecision {
                    action: ConnectAction::Direct(target),
                    session: None,
                };
            }
        };

        let rendezvous = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Rendezvous listener has no address: {}; proxying {} directly", e, target);
                return ConnectDecision {
                    action: ConnectAction::Direct(target),
                    session: None,
                };
            }
        };

        debug!("Rendezvous for {} on {}", target, rendezvous);

        let handle = tokio::spawn(run_tunnel(
            self.dialer.clone(),
            listener,
            target.clone(),
            self.config.accept_timeout,
            self.config.linger,
        ));

        ConnectDecision {
            action: ConnectAction::Proxy(rendezvous),
            session: Some(TunnelSession::new(target, rendezvous, handle)),
        }
    }

    fn listen(&self) -> Result<TcpListener> {
        let addr = self.config.rendezvous_addr;
        let listen_err = |source: io::Error| ProxyError::Listen {
            addr: addr.to_string(),
            source,
        };

        let listener = std::net::TcpListener::bind(addr).map_err(listen_err)?;
        listener.set_nonblocking(true).map_err(listen_err)?;
        TcpListener::from_std(listener).map_err(listen_err)
    }
}

impl HttpHooks for ConnectBridge {
    fn on_error(&self, stage: &str, err: &anyhow::Error) {
        error!("ERROR: {}: {:#}", stage, err);
    }

    fn on_accept(&self, request: &RequestHead) -> bool {
        if accept_log_level(request) == Level::DEBUG {
            debug!("HTTP {} {}", request.method, request.target);
        } else {
            info!("HTTP {} {}", request.method, request.target);
        }
        false
    }

    fn on_connect(&self, host: &str) -> ConnectAction {
        info!("HTTP CONNECT {}", host);
        self.connect_decision(host).action
    }
}

/// CONNECT gets its info line from `on_connect`
fn accept_log_level(request: &RequestHead) -> Level {
    if request.is_connect() {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Tunnel worker: dial, accept exactly once, relay, tear down
async fn run_tunnel(
    dialer: DeviceDialer,
    listener: TcpListener,
    target: String,
    accept_timeout: Duration,
    linger: Duration,
) -> Result<RelayStats> {
    let remote = match dialer.dial("tcp", &target).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("cannot dial {:?}: {}", target, e);
            return Err(e);
        }
    };

    let accepted = tokio::time::timeout(accept_timeout, listener.accept()).await;
    // One handoff only
    drop(listener);

    let local = match accepted {
        Ok(Ok((stream, peer))) => {
            debug!("Rendezvous for {} accepted from {}", target, peer);
            stream
        }
        Ok(Err(e)) => {
            error!("cannot accept loopback connection: {}", e);
            return Err(e.into());
        }
        Err(_) => {
            error!("no loopback connection for {} within {:?}", target, accept_timeout);
            return Err(ProxyError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "rendezvous accept timed out",
            )));
        }
    };

    match relay(local, remote, linger).await {
        Ok(stats) => {
            debug!(
                "Tunnel to {} closed ({} bytes up, {} bytes down)",
                target, stats.local_to_remote, stats.remote_to_local
            );
            Ok(stats)
        }
        Err(e) => {
            warn!("Tunnel to {} closed: {}", target, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::RetryConfig;
    use crate::transport::DialConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn test_bridge(config: BridgeConfig) -> ConnectBridge {
        let dialer = DeviceDialer::new(DialConfig::unbound().with_retry(RetryConfig::immediate(1)));
        ConnectBridge::new(dialer, config)
    }

    async fn echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let (mut r, mut w) = stream.split();
                    let _ = tokio::io::copy(&mut r, &mut w).await;
                });
            }
        });
        addr
    }

    #[test]
    fn test_bridge_config_default() {
        let config = BridgeConfig::default();
        assert!(config.rendezvous_addr.ip().is_loopback());
        assert_eq!(config.rendezvous_addr.port(), 0);
        assert_eq!(config.accept_timeout, Duration::from_secs(30));
        assert_eq!(config.linger, Duration::from_secs(2));
    }

    #[test]
    fn test_bridge_config_from_settings() {
        let config = BridgeConfig::from_settings(&BridgeSettings {
            accept_timeout_secs: 3,
            linger_timeout_secs: 4,
        });
        assert_eq!(config.accept_timeout, Duration::from_secs(3));
        assert_eq!(config.linger, Duration::from_secs(4));
        assert!(config.rendezvous_addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_connect_decision_round_trip() {
        let target = echo_server().await;
        let bridge = test_bridge(BridgeConfig::default());

        let decision = bridge.connect_decision(&target.to_string());
        let rendezvous = match decision.action {
            ConnectAction::Proxy(addr) => addr,
            other => panic!("unexpected action: {:?}", other),
        };
        assert!(rendezvous.ip().is_loopback());
        let session = decision.session.unwrap();
        assert_eq!(session.rendezvous_addr(), rendezvous);

        let mut client = TcpStream::connect(rendezvous).await.unwrap();
        client.write_all(b"ping over the tunnel").await.unwrap();
        let mut buf = [0u8; 20];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping over the tunnel");

        drop(client);
        let stats = tokio::time::timeout(Duration::from_secs(2), session.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.local_to_remote, 20);
        assert_eq!(stats.remote_to_local, 20);
    }

    #[tokio::test]
    async fn test_session_ends_when_target_never_closes() {
        // Target accepts, then holds the connection open without a word
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(stream);
        });

        let bridge = test_bridge(BridgeConfig {
            linger: Duration::from_millis(200),
            ..Default::default()
        });
        let decision = bridge.connect_decision(&target.to_string());
        let rendezvous = match decision.action {
            ConnectAction::Proxy(addr) => addr,
            other => panic!("unexpected action: {:?}", other),
        };

        let mut client = TcpStream::connect(rendezvous).await.unwrap();
        client.write_all(b"x").await.unwrap();
        drop(client);

        let stats = tokio::time::timeout(Duration::from_secs(3), decision.session.unwrap().wait())
            .await
            .expect("tunnel must close once the silent target idles past the linger")
            .unwrap();
        assert_eq!(stats.local_to_remote, 1);
        assert_eq!(stats.remote_to_local, 0);
    }

    #[tokio::test]
    async fn test_connect_decision_normalizes_port() {
        let bridge = test_bridge(BridgeConfig::default());
        let decision = bridge.connect_decision("127.0.0.1");
        let session = decision.session.unwrap();
        assert_eq!(session.target(), "127.0.0.1:80");
        session.abort();
    }

    #[tokio::test]
    async fn test_listener_is_single_use() {
        let target = echo_server().await;
        let bridge = test_bridge(BridgeConfig::default());

        let decision = bridge.connect_decision(&target.to_string());
        let session = decision.session.unwrap();
        let rendezvous = session.rendezvous_addr();

        let mut first = TcpStream::connect(rendezvous).await.unwrap();
        first.write_all(b"x").await.unwrap();
        let mut buf = [0u8; 1];
        first.read_exact(&mut buf).await.unwrap();

        // The listener was closed after the first accept
        assert!(TcpStream::connect(rendezvous).await.is_err());

        drop(first);
        tokio::time::timeout(Duration::from_secs(2), session.wait())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_dial_failure_ends_session_without_accept() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let bridge = test_bridge(BridgeConfig::default());

        let decision = bridge.connect_decision(&format!("127.0.0.1:{}", port));
        assert!(matches!(decision.action, ConnectAction::Proxy(_)));

        let err = tokio::time::timeout(Duration::from_secs(2), decision.session.unwrap().wait())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ProxyError::Dial { .. }));
    }

    #[tokio::test]
    async fn test_accept_timeout_ends_session() {
        let target = echo_server().await;
        let bridge = test_bridge(BridgeConfig {
            accept_timeout: Duration::from_millis(50),
            ..Default::default()
        });

        let decision = bridge.connect_decision(&target.to_string());
        let err = tokio::time::timeout(Duration::from_secs(2), decision.session.unwrap().wait())
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.io_source().map(|e| e.kind()), Some(io::ErrorKind::TimedOut));
    }

    #[tokio::test]
    async fn test_listen_failure_degrades_to_direct() {
        // TEST-NET-1 is never a local address, so binding fails
        let bridge = test_bridge(BridgeConfig {
            rendezvous_addr: "192.0.2.1:0".parse().unwrap(),
            ..Default::default()
        });

        let decision = bridge.connect_decision("example.com");
        assert!(decision.session.is_none());
        match decision.action {
            ConnectAction::Direct(target) => assert_eq!(target, "example.com:80"),
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hooks_delegate_to_bridge() {
        let bridge = test_bridge(BridgeConfig::default());
        let head = RequestHead {
            method: "GET".to_string(),
            target: "http://example.com/".to_string(),
            version: 1,
            headers: vec![],
        };
        assert!(!bridge.on_accept(&head));
        assert_eq!(accept_log_level(&head), Level::INFO);
        bridge.on_error("test", &anyhow::anyhow!("logged only"));

        let connect = RequestHead {
            method: "CONNECT".to_string(),
            target: "example.com:443".to_string(),
            ..head
        };
        assert!(!bridge.on_accept(&connect));
        assert_eq!(accept_log_level(&connect), Level::DEBUG);

        let degraded = test_bridge(BridgeConfig {
            rendezvous_addr: "192.0.2.1:0".parse().unwrap(),
            ..Default::default()
        });
        assert_eq!(
            degraded.on_connect("example.com:443"),
            ConnectAction::Direct("example.com:443".to_string())
        );
    }
}
