//! SOCKS5 wire constants (RFC 1928), grouped by the field they appear in

/// `VER` byte of every SOCKS5 message
pub const VERSION: u8 = 0x05;

/// `RSV` byte of requests and replies
pub const RESERVED: u8 = 0x00;

/// `METHOD` values of the method-selection exchange
pub mod method {
    /// No authentication required
    pub const NO_AUTH: u8 = 0x00;
    /// None of the offered methods is acceptable
    pub const NONE_ACCEPTABLE: u8 = 0xFF;
}

/// `CMD` values of a request
pub mod cmd {
    /// CONNECT
    pub const CONNECT: u8 = 0x01;
    /// BIND
    pub const BIND: u8 = 0x02;
    /// UDP ASSOCIATE
    pub const UDP_ASSOCIATE: u8 = 0x03;
}

/// `ATYP` values of requests and replies
pub mod atyp {
    /// IPv4 address, 4 bytes
    pub const IPV4: u8 = 0x01;
    /// Length-prefixed domain name
    pub const DOMAIN: u8 = 0x03;
    /// IPv6 address, 16 bytes
    pub const IPV6: u8 = 0x04;
}

/// `REP` values of a reply
pub mod rep {
    /// Succeeded
    pub const SUCCEEDED: u8 = 0x00;
    /// General SOCKS server failure
    pub const GENERAL_FAILURE: u8 = 0x01;
    /// Connection not allowed by ruleset
    pub const NOT_ALLOWED: u8 = 0x02;
    /// Network unreachable
    pub const NETWORK_UNREACHABLE: u8 = 0x03;
    /// Host unreachable
    pub const HOST_UNREACHABLE: u8 = 0x04;
    /// Connection refused
    pub const CONNECTION_REFUSED: u8 = 0x05;
    /// Command not supported
    pub const COMMAND_NOT_SUPPORTED: u8 = 0x07;
    /// Address type not supported
    pub const ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;
}
