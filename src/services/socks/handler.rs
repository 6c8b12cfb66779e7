//! Main SOCKS5 handler
//!
//! Entry point for one SOCKS5 client connection: method negotiation,
//! request decoding, then CONNECT or a refusal.

use crate::services::socks::auth::negotiate;
use crate::services::socks::command::{read_request, send_reply};
use crate::services::socks::consts::rep;
use crate::services::socks::tcp_relay::handle_tcp_connect;
use crate::services::socks::types::SocksCommand;
use crate::transport::DeviceDialer;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

/// Handle SOCKS5 protocol on a stream
///
/// # Protocol Flow
///
/// 1. Method negotiation (no authentication only)
/// 2. Request decoding; a refused request still gets its reply code
/// 3. CONNECT is dialed through `dialer`; BIND and UDP ASSOCIATE are refused
pub async fn handle_socks5_on_stream<S>(
    mut stream: S,
    dialer: &DeviceDialer,
    linger: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    negotiate(&mut stream)
        .await
        .with_context(|| "Method negotiation failed")?;

    let request = match read_request(&mut stream).await {
        Ok(request) => request,
        Err(e) => {
            if let Some(code) = e.reply_code() {
                send_reply(&mut stream, code, None).await?;
            }
            return Err(anyhow::Error::new(e).context("Invalid SOCKS5 request"));
        }
    };

    match request.command {
        SocksCommand::Connect => {
            info!("SOCKS {}", request.target);
            handle_tcp_connect(stream, request.target, dialer, linger).await?;
        }
        SocksCommand::Bind | SocksCommand::UdpAssociate => {
            warn!("SOCKS {} {} not supported", request.command, request.target);
            send_reply(&mut stream, rep::COMMAND_NOT_SUPPORTED, None).await?;
        }
    }

    Ok(())
}
