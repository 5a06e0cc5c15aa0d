//! Connection chain construction and chained tunnel establishment

use crate::proxy::models::{HopDescriptor, ProxyRecord, ProxyType};
use crate::Result;
use anyhow::{anyhow, Context};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_socks::tcp::{Socks4Stream, Socks5Stream};

/// Ordered sequence of hops a test connection traverses: the optional
/// upstream tunnel first, the candidate endpoint always last. Built fresh
/// for every check and discarded once the probe completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChain {
    hops: Vec<HopDescriptor>,
}

impl ConnectionChain {
    /// Assemble the hop order for one record. Pure; invalid endpoints only
    /// surface later as connection failures.
    pub fn build(record: &ProxyRecord, proto: ProxyType) -> Self {
        let mut hops = Vec::with_capacity(2);
        if let Some(tunnel) = &record.tunnel {
            hops.push(tunnel.hop.clone());
        }
        hops.push(record.endpoint_hop(proto));
        Self { hops }
    }

    pub fn hops(&self) -> &[HopDescriptor] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Establish a TCP stream to `target_host:target_port` through every hop
    /// in order. The first hop is dialed directly; each hop then performs its
    /// protocol handshake toward the next hop, the last one toward the
    /// target. HTTP hops tunnel with CONNECT.
    pub async fn connect(&self, target_host: &str, target_port: u16) -> Result<TcpStream> {
        let first = self
            .hops
            .first()
            .ok_or_else(|| anyhow!("connection chain is empty"))?;

        let mut stream = TcpStream::connect((first.host.as_str(), first.port))
            .await
            .with_context(|| format!("connecting first hop {}", first))?;

        for (i, hop) in self.hops.iter().enumerate() {
            let (next_host, next_port) = match self.hops.get(i + 1) {
                Some(next) => (next.host.as_str(), next.port),
                None => (target_host, target_port),
            };
            stream = handshake(stream, hop, next_host, next_port)
                .await
                .with_context(|| format!("handshake at hop {}", hop))?;
        }

        Ok(stream)
    }
}

/// Run one hop's handshake over an already-connected stream, yielding a
/// stream that now terminates at `next_host:next_port`.
async fn handshake(
    stream: TcpStream,
    hop: &HopDescriptor,
    next_host: &str,
    next_port: u16,
) -> Result<TcpStream> {
    match hop.proto {
        ProxyType::Socks5 => {
            let s = Socks5Stream::connect_with_socket(stream, (next_host, next_port)).await?;
            Ok(s.into_inner())
        }
        ProxyType::Socks4 => {
            let s = Socks4Stream::connect_with_socket(stream, (next_host, next_port)).await?;
            Ok(s.into_inner())
        }
        ProxyType::Http => {
            let mut stream = stream;
            http_connect(&mut stream, next_host, next_port).await?;
            Ok(stream)
        }
    }
}

/// CONNECT handshake against an HTTP proxy
async fn http_connect(stream: &mut TcpStream, host: &str, port: u16) -> Result<()> {
    let request = format!(
        "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\nProxy-Connection: keep-alive\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await?;

    // Read until the end of the response headers; the proxy sends no body
    // on success.
    let mut response = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !response.ends_with(b"\r\n\r\n") {
        if response.len() > 4096 {
            return Err(anyhow!("oversized CONNECT response"));
        }
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Err(anyhow!("proxy closed connection during CONNECT"));
        }
        response.push(byte[0]);
    }

    let status_line = response
        .split(|&b| b == b'\r')
        .next()
        .map(String::from_utf8_lossy)
        .unwrap_or_default()
        .into_owned();
    let code = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| anyhow!("malformed CONNECT status line: {status_line}"))?;

    if !(200..300).contains(&code) {
        return Err(anyhow!("CONNECT rejected with status {code}"));
    }
    Ok(())
}
