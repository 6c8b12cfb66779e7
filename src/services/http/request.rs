//! HTTP request head parsing
//!
//! Reads a request head off the client connection and rewrites proxy-form
//! requests (`GET http://host/path`) into origin-form for the upstream.

use crate::helper::DEFAULT_BUFFER_SIZE;
use crate::transport::DEFAULT_HTTP_PORT;
use anyhow::{anyhow, bail, Result};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use url::Url;

/// Largest request head accepted from a client
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

const MAX_HEADERS: usize = 100;

/// Headers that only concern the client-proxy hop
const HOP_BY_HOP: [&str; 5] = [
    "connection",
    "keep-alive",
    "proxy-authorization",
    "proxy-connection",
    "te",
];

/// Parsed HTTP/1.x request line and headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Request method, e.g. `GET` or `CONNECT`
    pub method: String,
    /// Request target as sent (absolute URI or authority)
    pub target: String,
    /// Minor HTTP version (`1` for HTTP/1.1)
    pub version: u8,
    /// Header name/value pairs in order
    pub headers: Vec<(String, String)>,
}

/// A proxy-form request rewritten for the origin server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginRequest {
    /// `host:port` to dial
    pub addr: String,
    /// Serialized request head to send upstream
    pub head: Vec<u8>,
}

impl RequestHead {
    /// Parse a request head from the start of `buf`.
    ///
    /// Returns `None` while the head is incomplete, otherwise the head and
    /// the number of bytes it occupied.
    pub fn parse(buf: &[u8]) -> Result<Option<(RequestHead, usize)>> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let consumed = match req.parse(buf).map_err(|e| anyhow!("malformed request: {}", e))? {
            httparse::Status::Partial => return Ok(None),
            httparse::Status::Complete(n) => n,
        };

        let head = RequestHead {
            method: req.method.unwrap_or_default().to_string(),
            target: req.path.unwrap_or_default().to_string(),
            version: req.version.unwrap_or(1),
            headers: req
                .headers
                .iter()
                .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
                .collect(),
        };

        Ok(Some((head, consumed)))
    }

    /// Whether this is a CONNECT request
    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }

    /// First value of header `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Rewrite an absolute-URI request for the origin server.
    ///
    /// The request line gets the origin-form path, hop-by-hop headers are
    /// dropped, a `Host` header is supplied when missing, and the upstream
    /// connection is marked `Connection: close`.
    pub fn to_origin_request(&self) -> Result<OriginRequest> {
        let url = Url::parse(&self.target)
            .map_err(|e| anyhow!("invalid request URI {:?}: {}", self.target, e))?;

        if url.scheme() != "http" {
            bail!("unsupported scheme {:?} in {}", url.scheme(), self.target);
        }

        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("request URI {:?} has no host", self.target))?;
        let port = url.port().unwrap_or(DEFAULT_HTTP_PORT);
        let addr = format!("{}:{}", host, port);

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        let mut head = format!("{} {} HTTP/1.{}\r\n", self.method, path, self.version);
        if self.header("host").is_none() {
            match url.port() {
                Some(port) => head.push_str(&format!("Host: {}:{}\r\n", host, port)),
                None => head.push_str(&format!("Host: {}\r\n", host)),
            }
        }
        for (name, value) in &self.headers {
            if HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h)) {
                continue;
            }
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str("Connection: close\r\n\r\n");

        Ok(OriginRequest {
            addr,
            head: head.into_bytes(),
        })
    }
}

/// Read one request head from `stream`.
///
/// Returns `None` if the client closed the connection before sending
/// anything. Bytes read past the head are returned alongside it.
pub async fn read_request_head<S>(stream: &mut S) -> Result<Option<(RequestHead, BytesMut)>>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(DEFAULT_BUFFER_SIZE);

    loop {
        if !buf.is_empty() {
            if let Some((head, consumed)) = RequestHead::parse(&buf)? {
                let leftover = buf.split_off(consumed);
                return Ok(Some((head, leftover)));
            }
        }

        if buf.len() >= MAX_HEAD_SIZE {
            bail!("request head exceeds {} bytes", MAX_HEAD_SIZE);
        }

        buf.reserve(DEFAULT_BUFFER_SIZE);
        if stream.read_buf(&mut buf).await? == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            bail!("connection closed inside the request head");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_complete(raw: &str) -> RequestHead {
        let (head, consumed) = RequestHead::parse(raw.as_bytes()).unwrap().unwrap();
        assert_eq!(consumed, raw.len());
        head
    }

    #[test]
    fn test_parse_connect() {
        let head = parse_complete("CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n");
        assert!(head.is_connect());
        assert_eq!(head.target, "example.com:443");
        assert_eq!(head.version, 1);
        assert_eq!(head.header("HOST"), Some("example.com:443"));
    }

    #[test]
    fn test_parse_partial() {
        assert!(RequestHead::parse(b"GET http://a/ HTTP/1.1\r\nHost: a\r\n").unwrap().is_none());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(RequestHead::parse(b"GET\0 / HTTP/1.1\r\n\r\n").is_err());
    }

    #[test]
    fn test_origin_request_rewrite() {
        let head = parse_complete(
            "GET http://example.com:8080/a/b?x=1 HTTP/1.1\r\n\
             Host: example.com:8080\r\n\
             Proxy-Connection: keep-alive\r\n\
             Proxy-Authorization: Basic Zm9vOmJhcg==\r\n\
             Accept: */*\r\n\r\n",
        );

        let origin = head.to_origin_request().unwrap();
        assert_eq!(origin.addr, "example.com:8080");
        let text = String::from_utf8(origin.head).unwrap();
        assert!(text.starts_with("GET /a/b?x=1 HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.com:8080\r\n"));
        assert!(text.contains("Accept: */*\r\n"));
        assert!(!text.to_ascii_lowercase().contains("proxy-"));
        assert!(text.ends_with("Connection: close\r\n\r\n"));
    }

    #[test]
    fn test_origin_request_defaults() {
        let head = parse_complete("GET http://example.com HTTP/1.0\r\n\r\n");
        let origin = head.to_origin_request().unwrap();
        assert_eq!(origin.addr, "example.com:80");
        let text = String::from_utf8(origin.head).unwrap();
        assert!(text.starts_with("GET / HTTP/1.0\r\nHost: example.com\r\n"));
    }

    #[test]
    fn test_origin_request_ipv6_host() {
        let head = parse_complete("GET http://[::1]:8000/ HTTP/1.1\r\n\r\n");
        let origin = head.to_origin_request().unwrap();
        assert_eq!(origin.addr, "[::1]:8000");
    }

    #[test]
    fn test_origin_request_rejects_origin_form_and_https() {
        let head = parse_complete("GET /index.html HTTP/1.1\r\nHost: a\r\n\r\n");
        assert!(head.to_origin_request().is_err());

        let head = parse_complete("GET https://example.com/ HTTP/1.1\r\n\r\n");
        assert!(head.to_origin_request().is_err());
    }

    #[tokio::test]
    async fn test_read_request_head_with_leftover() {
        let raw = b"POST http://example.com/upload HTTP/1.1\r\nContent-Length: 4\r\n\r\nbody".to_vec();
        let mut cursor = Cursor::new(raw);

        let (head, leftover) = read_request_head(&mut cursor).await.unwrap().unwrap();
        assert_eq!(head.method, "POST");
        assert_eq!(head.header("content-length"), Some("4"));
        assert_eq!(&leftover[..], b"body");
    }

    #[tokio::test]
    async fn test_read_request_head_empty_connection() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(read_request_head(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_request_head_truncated() {
        let mut cursor = Cursor::new(b"GET http://example.com/ HTTP/1.1\r\nHost".to_vec());
        assert!(read_request_head(&mut cursor).await.is_err());
    }

    #[tokio::test]
    async fn test_read_request_head_too_large() {
        let mut raw = b"GET http://example.com/ HTTP/1.1\r\n".to_vec();
        while raw.len() <= MAX_HEAD_SIZE {
            raw.extend_from_slice(b"X-Filler: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n");
        }
        let mut cursor = Cursor::new(raw);
        let err = read_request_head(&mut cursor).await.unwrap_err();
        assert!(err.to_string().contains("exceeds") || err.to_string().contains("malformed"));
    }
}
