//! Bidirectional relay
//!
//! Copies bytes between a local and a remote stream in both directions at
//! once. Each direction half-closes its destination when its source reaches
//! EOF. Once one direction is done, the other may keep moving data but is
//! cut off after staying idle for the linger period, so a peer that never
//! closes cannot hold the relay open.

use crate::error::{ProxyError, Result};
use crate::helper::DEFAULT_BUFFER_SIZE;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Byte counts of a finished relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from the local side to the remote side
    pub local_to_remote: u64,
    /// Bytes copied from the remote side to the local side
    pub remote_to_local: u64,
}

enum FirstDone {
    Up(Result<u64>),
    Down(Result<u64>),
}

/// Relay data bidirectionally between `local` and `remote`
///
/// Returns the byte counts once both directions are done (or the surviving
/// direction went idle for `linger`), or the first direction's failure as
/// [`ProxyError::Relay`]. Both streams are dropped on return.
pub async fn relay<L, R>(local: L, remote: R, linger: Duration) -> Result<RelayStats>
where
    L: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + AsyncWrite + Unpin,
{
    let (mut local_read, mut local_write) = tokio::io::split(local);
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);
    let up_bytes = AtomicU64::new(0);
    let down_bytes = AtomicU64::new(0);

    let up = pipe("local->remote", &mut local_read, &mut remote_write, &up_bytes);
    let down = pipe("remote->local", &mut remote_read, &mut local_write, &down_bytes);
    tokio::pin!(up, down);

    let first = tokio::select! {
        result = &mut up => FirstDone::Up(result),
        result = &mut down => FirstDone::Down(result),
    };

    let (up, down) = match first {
        FirstDone::Up(result) => {
            let rest = linger_on("remote->local", down.as_mut(), &down_bytes, linger).await;
            (result, rest)
        }
        FirstDone::Down(result) => {
            let rest = linger_on("local->remote", up.as_mut(), &up_bytes, linger).await;
            (rest, result)
        }
    };

    Ok(RelayStats {
        local_to_remote: up?,
        remote_to_local: down?,
    })
}

/// Drive the surviving direction until it finishes or idles for `linger`
async fn linger_on<F>(
    direction: &'static str,
    mut pipe: Pin<&mut F>,
    copied: &AtomicU64,
    linger: Duration,
) -> Result<u64>
where
    F: Future<Output = Result<u64>>,
{
    loop {
        let before = copied.load(Ordering::Relaxed);
        match tokio::time::timeout(linger, pipe.as_mut()).await {
            Ok(result) => return result,
            Err(_) if copied.load(Ordering::Relaxed) != before => continue,
            Err(_) => {
                let bytes = copied.load(Ordering::Relaxed);
                debug!("{} idle for {:?} after peer closed; cutting off", direction, linger);
                return Ok(bytes);
            }
        }
    }
}

async fn pipe<R, W>(
    direction: &'static str,
    reader: &mut R,
    writer: &mut W,
    copied: &AtomicU64,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];

    let result = loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(source) => break Err(source),
        };
        if let Err(source) = writer.write_all(&buf[..n]).await {
            break Err(source);
        }
        copied.fetch_add(n as u64, Ordering::Relaxed);
    };

    // Propagate EOF (or our failure) to the peer so its side winds down too
    if let Err(e) = writer.shutdown().await {
        debug!("{} shutdown: {}", direction, e);
    }

    let bytes = copied.load(Ordering::Relaxed);
    match result {
        Ok(()) => {
            debug!("{} finished: {} bytes", direction, bytes);
            Ok(bytes)
        }
        Err(source) => Err(ProxyError::Relay {
            direction,
            bytes,
            source,
        }),
    }
}
