//! SOCKS5 CONNECT
//!
//! Dials the requested target through the device-bound dialer and relays
//! data bidirectionally.

use crate::relay::relay;
use crate::services::socks::command::{reply_code_for, send_reply};
use crate::services::socks::consts::rep;
use crate::services::socks::types::TargetAddr;
use crate::transport::DeviceDialer;
use anyhow::Result;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error};

/// Serve a CONNECT to `target_addr`
///
/// 1. Dials the target through the device-bound dialer
/// 2. Sends the success reply, or a failure reply mapped from the dial error
/// 3. Relays data bidirectionally between client and target
pub async fn handle_tcp_connect<S>(
    mut client_stream: S,
    target_addr: TargetAddr,
    dialer: &DeviceDialer,
    linger: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let target = target_addr.to_string();

    let target_stream = match dialer.dial("tcp", &target).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("SOCKS dial {} failed: {}", target, e);
            send_reply(&mut client_stream, reply_code_for(&e), None).await?;
            return Err(e.into());
        }
    };

    let local_addr = target_stream.local_addr().ok();
    send_reply(&mut client_stream, rep::SUCCEEDED, local_addr).await?;

    debug!("SOCKS5 tunnel established to {}", target);

    let stats = relay(client_stream, target_stream, linger).await?;
    debug!(
        "SOCKS5 tunnel to {} closed ({} bytes up, {} bytes down)",
        target, stats.local_to_remote, stats.remote_to_local
    );
    Ok(())
}
