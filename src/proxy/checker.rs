//! Proxy checker: per-record check routine and concurrent fan-out

use crate::proxy::chain::ConnectionChain;
use crate::proxy::gate;
use crate::proxy::geo;
use crate::proxy::models::{ProxyRecord, ProxyType};
use crate::proxy::policy::{Decision, HaltFlag, LocationPolicy};
use crate::proxy::probe::{self, ProbeOutcome};
use crate::Result;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use url::Url;

/// Default timeout for proxy checks in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default global concurrency budget
const DEFAULT_CONCURRENCY: usize = 10;

/// Sentinel mapping to the built-in geolocation endpoint
pub const DEFAULT_URL_SENTINEL: &str = "default";

/// Geolocation endpoint; `fields=8217` selects query, country, regionName
/// and city
pub const DEFAULT_CHECK_URL: &str = "http://ip-api.com/json/?fields=8217";

/// Configuration for the proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Deadline for each proxy check, chain establishment included
    pub timeout: Duration,
    /// Global budget of in-flight checks
    pub concurrency: usize,
    /// URL to probe through each proxy; `"default"` selects the built-in
    /// geolocation endpoint
    pub test_url: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            test_url: DEFAULT_URL_SENTINEL.to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_test_url(mut self, url: String) -> Self {
        self.test_url = url;
        self
    }
}

/// Proxy checker validating candidate proxies through optional upstream
/// tunnels
pub struct Checker {
    config: CheckerConfig,
    policy: LocationPolicy,
    halt: HaltFlag,
    global: Arc<Semaphore>,
    target: Url,
    /// Whether the target is the geolocation endpoint and the body must be
    /// buffered and parsed
    expect_json: bool,
}

impl Checker {
    /// Create a checker from a configuration and the operator's location
    /// policy. Fails only on an unparseable test URL.
    pub fn with_config(config: CheckerConfig, policy: LocationPolicy) -> Result<Self> {
        let resolved = if config.test_url == DEFAULT_URL_SENTINEL {
            DEFAULT_CHECK_URL
        } else {
            config.test_url.as_str()
        };
        let target = Url::parse(resolved)?;
        let expect_json = target.as_str() == DEFAULT_CHECK_URL;
        let global = Arc::new(Semaphore::new(config.concurrency));
        Ok(Self {
            config,
            policy,
            halt: HaltFlag::new(),
            global,
            target,
            expect_json,
        })
    }

    /// Shared halt signal; raised on a stop-location match and consultable
    /// by the caller's run loop
    pub fn halt_flag(&self) -> HaltFlag {
        self.halt.clone()
    }

    /// Check one candidate proxy, populating its result fields on success.
    ///
    /// Admission order is fixed: the global gate first, then the tunnel
    /// gate while the global permit is held. Both are released (tunnel
    /// first) as soon as the probe finishes, on every exit path;
    /// classification and logging happen outside the gates.
    pub async fn check_record(&self, mut record: ProxyRecord, proto: ProxyType) -> ProxyRecord {
        if self.halt.is_halted() {
            return record;
        }

        let tunnel_gate = record.tunnel.as_ref().map(|t| Arc::clone(&t.gate));
        let admission = gate::admit(Arc::clone(&self.global), tunnel_gate).await;

        let chain = ConnectionChain::build(&record, proto);
        if let Some(tunnel) = &record.tunnel {
            debug!("CHAIN: {} -> {}:{}", tunnel.hop, record.host, record.port);
        }

        let outcome =
            probe::probe(&chain, &self.target, self.config.timeout, self.expect_json).await;
        drop(admission);

        match outcome {
            ProbeOutcome::Success { latency, geo } => {
                record.latency = Some(latency);
                if record.check_mode {
                    // Tunnel liveness confirmed; nothing to classify
                    match &record.tunnel {
                        Some(tunnel) => info!("{}", tunnel.hop),
                        None => info!("{}://{}", proto, record),
                    }
                    return record;
                }
                if let Some(geo) = geo {
                    geo::classify(&mut record, &geo);
                    if self.policy.evaluate(&record, proto) == Decision::Halt {
                        self.halt.halt();
                    }
                }
            }
            ProbeOutcome::Failure(kind) => {
                debug!("CHECK FAILED ({}): {}: {}", proto.label(), record, kind);
            }
        }
        record
    }

    /// Check many candidates concurrently. Completion order is arbitrary;
    /// once the halt flag is raised no further records are probed, while
    /// already-admitted checks run to completion.
    pub async fn check_records(
        &self,
        records: Vec<ProxyRecord>,
        proto: ProxyType,
    ) -> Vec<ProxyRecord> {
        stream::iter(records)
            .map(|record| self.check_record(record, proto))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await
    }
}
