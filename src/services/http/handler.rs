//! HTTP proxy request handling
//!
//! One request per client connection. CONNECT requests are routed through
//! [`HttpHooks::on_connect`]; absolute-URI requests are forwarded to the
//! origin through the device-bound dialer.

use super::hooks::{ConnectAction, HttpHooks};
use super::request::{read_request_head, RequestHead};
use crate::relay::relay;
use crate::transport::DeviceDialer;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const CONNECT_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";

/// Serve one HTTP proxy connection.
///
/// Failures are reported through [`HttpHooks::on_error`]. The returned error
/// covers only writes to the client that could not be reported otherwise.
pub async fn handle_http_on_stream<S>(
    mut stream: S,
    hooks: &dyn HttpHooks,
    dialer: &DeviceDialer,
    linger: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (head, leftover) = match read_request_head(&mut stream).await {
        Ok(Some(parsed)) => parsed,
        Ok(None) => return Ok(()),
        Err(e) => {
            hooks.on_error("read request", &e);
            return write_status(&mut stream, 400, "Bad Request").await;
        }
    };

    if hooks.on_accept(&head) {
        return Ok(());
    }

    if head.is_connect() {
        serve_connect(stream, &head, &leftover, hooks, linger).await
    } else {
        serve_forward(stream, &head, &leftover, hooks, dialer, linger).await
    }
}

async fn serve_connect<S>(
    mut stream: S,
    head: &RequestHead,
    leftover: &[u8],
    hooks: &dyn HttpHooks,
    linger: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let action = hooks.on_connect(&head.target);
    let upstream_addr = action.upstream();
    if let ConnectAction::Direct(_) = action {
        debug!("CONNECT {} served without device binding", head.target);
    }

    let mut upstream = match TcpStream::connect(upstream_addr.as_str()).await {
        Ok(upstream) => upstream,
        Err(e) => {
            let err = anyhow::Error::new(e)
                .context(format!("cannot connect to {} for {}", upstream_addr, head.target));
            hooks.on_error("connect", &err);
            return write_status(&mut stream, 502, "Bad Gateway").await;
        }
    };

    stream
        .write_all(CONNECT_ESTABLISHED)
        .await
        .context("failed to send CONNECT response")?;
    if !leftover.is_empty() {
        upstream
            .write_all(leftover)
            .await
            .context("failed to forward early tunnel bytes")?;
    }

    if let Err(e) = relay(stream, upstream, linger).await {
        hooks.on_error("relay", &anyhow::Error::new(e).context(head.target.clone()));
    }
    Ok(())
}

async fn serve_forward<S>(
    mut stream: S,
    head: &RequestHead,
    leftover: &[u8],
    hooks: &dyn HttpHooks,
    dialer: &DeviceDialer,
    linger: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let origin = match head.to_origin_request() {
        Ok(origin) => origin,
        Err(e) => {
            hooks.on_error("parse request", &e);
            return write_status(&mut stream, 400, "Bad Request").await;
        }
    };

    let mut upstream = match dialer.dial("tcp", &origin.addr).await {
        Ok(upstream) => upstream,
        Err(e) => {
            hooks.on_error("dial", &anyhow::Error::new(e));
            return write_status(&mut stream, 502, "Bad Gateway").await;
        }
    };

    upstream
        .write_all(&origin.head)
        .await
        .with_context(|| format!("failed to send request to {}", origin.addr))?;
    if !leftover.is_empty() {
        upstream
            .write_all(leftover)
            .await
            .with_context(|| format!("failed to send request body to {}", origin.addr))?;
    }

    if let Err(e) = relay(stream, upstream, linger).await {
        hooks.on_error("relay", &anyhow::Error::new(e).context(origin.addr));
    }
    Ok(())
}

/// Write a minimal error response and close the client side
async fn write_status<S>(stream: &mut S, code: u16, reason: &str) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let body = format!("{} {}\n", code, reason);
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        code,
        reason,
        body.len(),
        body
    );
    stream
        .write_all(response.as_bytes())
        .await
        .context("failed to send error response")?;
    stream.shutdown().await.ok();
    Ok(())
}
