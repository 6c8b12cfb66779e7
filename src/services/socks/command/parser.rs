//! SOCKS5 request decoding
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//! ```

use crate::services::socks::consts::{atyp, rep, VERSION};
use crate::services::socks::types::{SocksCommand, SocksRequest, TargetAddr};
use std::io;
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Why a request could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The connection failed or ended mid-request; no reply is possible
    #[error("failed to read request: {0}")]
    Read(#[from] io::Error),

    /// The request is refused; the client gets a reply with `code`
    #[error("{reason}")]
    Refused {
        /// `REP` byte to send back
        code: u8,
        /// What was wrong
        reason: String,
    },
}

impl RequestError {
    fn refused(code: u8, reason: impl Into<String>) -> Self {
        RequestError::Refused {
            code,
            reason: reason.into(),
        }
    }

    /// Reply code owed to the client, if it can still be told
    pub fn reply_code(&self) -> Option<u8> {
        match self {
            RequestError::Refused { code, .. } => Some(*code),
            RequestError::Read(_) => None,
        }
    }
}

/// Read one request off `stream`
pub async fn read_request<S>(stream: &mut S) -> Result<SocksRequest, RequestError>
where
    S: AsyncRead + Unpin,
{
    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    let [version, command, _reserved, addr_type] = head;

    if version != VERSION {
        return Err(RequestError::refused(
            rep::GENERAL_FAILURE,
            format!("request carries SOCKS version {}", version),
        ));
    }

    let command = SocksCommand::try_from(command).map_err(|byte| {
        RequestError::refused(rep::COMMAND_NOT_SUPPORTED, format!("unknown command 0x{:02x}", byte))
    })?;

    let target = read_target(stream, addr_type).await?;
    debug!("SOCKS5 request: {} {}", command, target);

    Ok(SocksRequest { command, target })
}

async fn read_target<S>(stream: &mut S, addr_type: u8) -> Result<TargetAddr, RequestError>
where
    S: AsyncRead + Unpin,
{
    let target = match addr_type {
        atyp::IPV4 => {
            let mut octets = [0u8; 4];
            stream.read_exact(&mut octets).await?;
            TargetAddr::Ip(SocketAddr::new(IpAddr::from(octets), stream.read_u16().await?))
        }
        atyp::IPV6 => {
            let mut octets = [0u8; 16];
            stream.read_exact(&mut octets).await?;
            TargetAddr::Ip(SocketAddr::new(IpAddr::from(octets), stream.read_u16().await?))
        }
        atyp::DOMAIN => {
            let len = stream.read_u8().await? as usize;
            if len == 0 {
                return Err(RequestError::refused(rep::GENERAL_FAILURE, "empty domain name"));
            }
            let mut name = vec![0u8; len];
            stream.read_exact(&mut name).await?;
            let name = String::from_utf8(name).map_err(|_| {
                RequestError::refused(rep::GENERAL_FAILURE, "domain name is not UTF-8")
            })?;
            TargetAddr::Domain(name, stream.read_u16().await?)
        }
        other => {
            return Err(RequestError::refused(
                rep::ADDRESS_TYPE_NOT_SUPPORTED,
                format!("unsupported address type 0x{:02x}", other),
            ))
        }
    };

    Ok(target)
}
