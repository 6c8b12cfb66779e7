//! SOCKS5 replies
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//! ```

use crate::error::ProxyError;
use crate::services::socks::consts::{atyp, rep, RESERVED, VERSION};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Encode a reply; `bound` defaults to `0.0.0.0:0`
pub fn encode_reply(code: u8, bound: Option<SocketAddr>) -> Vec<u8> {
    let bound = bound.unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));

    let mut reply = vec![VERSION, code, RESERVED];
    match bound {
        SocketAddr::V4(addr) => {
            reply.push(atyp::IPV4);
            reply.extend_from_slice(&addr.ip().octets());
        }
        SocketAddr::V6(addr) => {
            reply.push(atyp::IPV6);
            reply.extend_from_slice(&addr.ip().octets());
        }
    }
    reply.extend_from_slice(&bound.port().to_be_bytes());
    reply
}

/// Write a reply and flush it
pub async fn send_reply<S>(stream: &mut S, code: u8, bound: Option<SocketAddr>) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&encode_reply(code, bound)).await?;
    stream.flush().await
}

/// Reply code reported to the client for a failed dial
pub fn reply_code_for(err: &ProxyError) -> u8 {
    match err {
        ProxyError::Resolution { .. } => rep::HOST_UNREACHABLE,
        ProxyError::Dial { source, .. } => match source.kind() {
            io::ErrorKind::ConnectionRefused => rep::CONNECTION_REFUSED,
            io::ErrorKind::NetworkUnreachable => rep::NETWORK_UNREACHABLE,
            io::ErrorKind::TimedOut
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::AddrNotAvailable => rep::HOST_UNREACHABLE,
            io::ErrorKind::PermissionDenied => rep::NOT_ALLOWED,
            _ => rep::GENERAL_FAILURE,
        },
        _ => rep::GENERAL_FAILURE,
    }
}
