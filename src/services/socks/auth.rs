//! SOCKS5 method negotiation
//!
//! Only the "no authentication" method is offered. Clients that do not list
//! it are told no method is acceptable.

use super::consts::{method, VERSION};
use anyhow::{bail, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read the client's greeting and answer with the selected method
///
/// ```text
/// +----+----------+----------+      +----+--------+
/// |VER | NMETHODS | METHODS  |  ->  |VER | METHOD |
/// +----+----------+----------+      +----+--------+
/// | 1  |    1     | 1 to 255 |      | 1  |   1    |
/// +----+----------+----------+      +----+--------+
/// ```
pub async fn negotiate<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).await?;

    let version = buf[0];
    let num_methods = buf[1];

    if version != VERSION {
        bail!("Unsupported SOCKS version: {}", version);
    }

    if num_methods == 0 {
        bail!("No authentication methods provided");
    }

    let mut methods = vec![0u8; num_methods as usize];
    stream.read_exact(&mut methods).await?;

    let selected = select_method(&methods);
    stream.write_all(&[VERSION, selected]).await?;
    stream.flush().await?;

    if selected == method::NONE_ACCEPTABLE {
        bail!("No acceptable authentication method in {:?}", methods);
    }

    Ok(())
}

fn select_method(methods: &[u8]) -> u8 {
    if methods.contains(&method::NO_AUTH) {
        method::NO_AUTH
    } else {
        method::NONE_ACCEPTABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn test_select_method() {
        assert_eq!(select_method(&[0x02, 0x00]), method::NO_AUTH);
        assert_eq!(select_method(&[0x02]), method::NONE_ACCEPTABLE);
    }

    #[tokio::test]
    async fn test_negotiate_no_auth() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[VERSION, 2, 0x02, 0x00]).await.unwrap();

        negotiate(&mut server).await.unwrap();

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [VERSION, method::NO_AUTH]);
    }

    #[tokio::test]
    async fn test_negotiate_rejects_password_only() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[VERSION, 1, 0x02]).await.unwrap();

        assert!(negotiate(&mut server).await.is_err());

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [VERSION, method::NONE_ACCEPTABLE]);
    }

    #[tokio::test]
    async fn test_negotiate_rejects_socks4() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0x04, 1, 0x00]).await.unwrap();

        let err = negotiate(&mut server).await.unwrap_err();
        assert!(err.to_string().contains("version"));
    }
}
