//! Probe executor: one HTTP GET through an established proxy chain

use crate::proxy::chain::ConnectionChain;
use crate::proxy::geo::GeoLookup;
use crate::Result;
use anyhow::anyhow;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{HOST, USER_AGENT};
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::time::{Duration, Instant};
use url::Url;

/// User agent presented to the probe target
pub const PROBE_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; rv:109.0) Gecko/20100101 Firefox/117.0";

/// Result of one probe attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success {
        /// Full round trip: chain establishment through body receipt
        latency: Duration,
        /// Parsed geolocation body; present only for the default endpoint
        geo: Option<GeoLookup>,
    },
    Failure(ProbeFailure),
}

/// Why a probe attempt yielded no result. All variants are recoverable:
/// the record simply stays unclassified and the scan moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// Some hop in the chain could not be established
    Connect,
    /// Deadline exceeded at any stage
    Timeout,
    /// Non-2xx/3xx response status
    HttpStatus(u16),
    /// Body was not valid JSON when JSON was expected
    Parse,
}

/// Issue a single GET to `url` through `chain`, bounded by `deadline`.
///
/// When `expect_json` is set (the default geolocation endpoint), the body is
/// fully buffered and parsed; otherwise a non-error status suffices and the
/// body is drained to completion so the connection is never left
/// half-consumed. Latency covers the whole round trip through every hop.
pub async fn probe(
    chain: &ConnectionChain,
    url: &Url,
    deadline: Duration,
    expect_json: bool,
) -> ProbeOutcome {
    let start = Instant::now();
    match tokio::time::timeout(deadline, request(chain, url)).await {
        Ok(Ok(body)) => {
            let latency = start.elapsed();
            if expect_json {
                match serde_json::from_slice::<GeoLookup>(&body) {
                    Ok(geo) => ProbeOutcome::Success {
                        latency,
                        geo: Some(geo),
                    },
                    Err(_) => ProbeOutcome::Failure(ProbeFailure::Parse),
                }
            } else {
                ProbeOutcome::Success { latency, geo: None }
            }
        }
        Ok(Err(err)) => ProbeOutcome::Failure(match err.downcast_ref::<ProbeFailure>() {
            Some(failure) => failure.clone(),
            None => ProbeFailure::Connect,
        }),
        // Dropping the in-flight future aborts the underlying connection
        Err(_) => ProbeOutcome::Failure(ProbeFailure::Timeout),
    }
}

/// Connect the chain and run the HTTP exchange, returning the raw body
async fn request(chain: &ConnectionChain, url: &Url) -> Result<Bytes> {
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("check URL has no host: {url}"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("check URL has no port: {url}"))?;

    let stream = chain.connect(host, port).await?;

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let path_and_query = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };
    let host_header = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let req = Request::builder()
        .uri(path_and_query)
        .header(HOST, host_header)
        .header(USER_AGENT, PROBE_USER_AGENT)
        .body(Empty::<Bytes>::new())?;

    let response = sender.send_request(req).await?;
    let status = response.status();
    if !(status.is_success() || status.is_redirection()) {
        return Err(anyhow!(ProbeFailure::HttpStatus(status.as_u16())));
    }

    // Buffer the body regardless of whether the caller wants it
    let body = response.collect().await?.to_bytes();
    Ok(body)
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailure::Connect => write!(f, "connect failure"),
            ProbeFailure::Timeout => write!(f, "timeout"),
            ProbeFailure::HttpStatus(code) => write!(f, "http status {code}"),
            ProbeFailure::Parse => write!(f, "invalid json body"),
        }
    }
}

impl std::error::Error for ProbeFailure {}
