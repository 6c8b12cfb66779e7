//! Target address parsing
//!
//! Splits `host:port` strings (with `[v6]:port` bracket form) and normalizes
//! CONNECT targets that arrive without a port.

use crate::error::{ProxyError, Result};
use std::net::Ipv6Addr;

/// Port assumed for CONNECT targets that carry none
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Split `host:port` into its host and numeric port.
///
/// IPv6 literals must be bracketed (`[::1]:443`); the brackets are stripped
/// from the returned host.
pub fn split_host_port(addr: &str) -> Result<(&str, u16)> {
    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| ProxyError::InvalidAddress(format!("{}: missing ']'", addr)))?;
        let port = tail
            .strip_prefix(':')
            .ok_or_else(|| ProxyError::InvalidAddress(format!("{}: missing port", addr)))?;
        (host, port)
    } else {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| ProxyError::InvalidAddress(format!("{}: missing port", addr)))?;
        if host.contains(':') {
            return Err(ProxyError::InvalidAddress(format!(
                "{}: too many colons",
                addr
            )));
        }
        (host, port)
    };

    if host.is_empty() {
        return Err(ProxyError::InvalidAddress(format!("{}: missing host", addr)));
    }

    let port = port
        .parse::<u16>()
        .map_err(|_| ProxyError::InvalidAddress(format!("{}: invalid port {:?}", addr, port)))?;

    Ok((host, port))
}

/// Whether `target` already carries an explicit port
pub fn has_port(target: &str) -> bool {
    split_host_port(target).is_ok()
}

/// Append [`DEFAULT_HTTP_PORT`] to a target that has no port.
///
/// Targets that already have a port are returned unchanged. A bare IPv6
/// literal is bracketed first.
pub fn normalize_target(target: &str) -> String {
    if has_port(target) {
        return target.to_string();
    }

    if let Ok(ip) = target.parse::<Ipv6Addr>() {
        return format!("[{}]:{}", ip, DEFAULT_HTTP_PORT);
    }

    let host = target.strip_suffix(':').unwrap_or(target);
    format!("{}:{}", host, DEFAULT_HTTP_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port_domain() {
        assert_eq!(split_host_port("example.com:80").unwrap(), ("example.com", 80));
    }

    #[test]
    fn test_split_host_port_ipv4() {
        assert_eq!(
            split_host_port("93.184.216.34:443").unwrap(),
            ("93.184.216.34", 443)
        );
    }

    #[test]
    fn test_split_host_port_ipv6() {
        assert_eq!(split_host_port("[2001:db8::1]:8080").unwrap(), ("2001:db8::1", 8080));
        assert_eq!(split_host_port("[::1]:0").unwrap(), ("::1", 0));
    }

    #[test]
    fn test_split_host_port_errors() {
        assert!(split_host_port("example.com").is_err());
        assert!(split_host_port("example.com:http").is_err());
        assert!(split_host_port("example.com:70000").is_err());
        assert!(split_host_port("::1:80").is_err());
        assert!(split_host_port("[::1]").is_err());
        assert!(split_host_port("[::1:80").is_err());
        assert!(split_host_port(":80").is_err());
    }

    #[test]
    fn test_normalize_target_without_port() {
        assert_eq!(normalize_target("example.com"), "example.com:80");
        assert_eq!(normalize_target("10.1.2.3"), "10.1.2.3:80");
        assert_eq!(normalize_target("[::1]"), "[::1]:80");
        assert_eq!(normalize_target("2001:db8::1"), "[2001:db8::1]:80");
        assert_eq!(normalize_target("example.com:"), "example.com:80");
    }

    #[test]
    fn test_normalize_target_with_port() {
        assert_eq!(normalize_target("example.com:443"), "example.com:443");
        assert_eq!(normalize_target("[::1]:8443"), "[::1]:8443");
    }

    #[test]
    fn test_normalized_target_has_port() {
        for target in ["example.com", "[::1]", "fe80::1", "1.1.1.1"] {
            assert!(has_port(&normalize_target(target)), "{}", target);
        }
    }
}
