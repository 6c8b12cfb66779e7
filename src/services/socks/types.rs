//! Decoded SOCKS5 request

use super::consts::cmd;
use std::fmt;
use std::net::SocketAddr;

/// Request command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// Open a TCP connection to the destination
    Connect,
    /// Refused with "command not supported"
    Bind,
    /// Refused with "command not supported"
    UdpAssociate,
}

impl TryFrom<u8> for SocksCommand {
    /// The unrecognized `CMD` byte
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            cmd::CONNECT => Ok(SocksCommand::Connect),
            cmd::BIND => Ok(SocksCommand::Bind),
            cmd::UDP_ASSOCIATE => Ok(SocksCommand::UdpAssociate),
            other => Err(other),
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SocksCommand::Connect => "CONNECT",
            SocksCommand::Bind => "BIND",
            SocksCommand::UdpAssociate => "UDP ASSOCIATE",
        })
    }
}

/// Request destination. Domain names stay unresolved so the dialer picks
/// the address.
///
/// `Display` yields the `host:port` string handed to the dialer, with IPv6
/// literals bracketed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// Literal address
    Ip(SocketAddr),
    /// Domain name and port
    Domain(String, u16),
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

/// A complete SOCKS5 request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksRequest {
    /// What the client asks for
    pub command: SocksCommand,
    /// Where to
    pub target: TargetAddr,
}
