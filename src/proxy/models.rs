//! Proxy data models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Proxy protocol enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProxyType {
    #[default]
    Http,
    Socks4,
    Socks5,
}

impl ProxyType {
    /// Uppercase protocol name used in per-proxy log lines
    pub fn label(&self) -> &'static str {
        match self {
            ProxyType::Http => "HTTP",
            ProxyType::Socks4 => "SOCKS4",
            ProxyType::Socks5 => "SOCKS5",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyType::Http => write!(f, "http"),
            ProxyType::Socks4 => write!(f, "socks4"),
            ProxyType::Socks5 => write!(f, "socks5"),
        }
    }
}

/// One forwarding hop in a proxy chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopDescriptor {
    pub proto: ProxyType,
    pub host: String,
    pub port: u16,
}

impl HopDescriptor {
    pub fn new(proto: ProxyType, host: String, port: u16) -> Self {
        Self { proto, host, port }
    }
}

impl fmt::Display for HopDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.proto, self.host, self.port)
    }
}

/// A fixed upstream proxy shared by multiple candidate records.
///
/// The admission gate bounds how many checks may traverse this tunnel at
/// once. Records hold the tunnel behind an `Arc` so the gate is the same
/// object for every record naming it; capacity is a property of the tunnel,
/// not of any one check.
#[derive(Debug)]
pub struct UpstreamTunnel {
    pub hop: HopDescriptor,
    pub gate: Arc<Semaphore>,
}

impl UpstreamTunnel {
    pub fn new(hop: HopDescriptor, capacity: usize) -> Self {
        Self {
            hop,
            gate: Arc::new(Semaphore::new(capacity)),
        }
    }
}

/// One candidate proxy under test.
///
/// Result fields (`latency`, `is_anonymous`, `geolocation`) are absent until
/// a successful probe populates them; a failed check leaves them absent,
/// which is how callers distinguish pass from fail.
#[derive(Debug, Clone, Default)]
pub struct ProxyRecord {
    pub host: String,
    pub port: u16,
    pub tunnel: Option<Arc<UpstreamTunnel>>,
    /// Only confirm the tunnel itself works; skip classification.
    pub check_mode: bool,
    pub latency: Option<Duration>,
    pub is_anonymous: Option<bool>,
    pub geolocation: Option<String>,
}

impl ProxyRecord {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            ..Default::default()
        }
    }

    pub fn with_tunnel(host: String, port: u16, tunnel: Arc<UpstreamTunnel>) -> Self {
        Self {
            host,
            port,
            tunnel: Some(tunnel),
            ..Default::default()
        }
    }

    /// The final hop of every chain built for this record
    pub fn endpoint_hop(&self, proto: ProxyType) -> HopDescriptor {
        HopDescriptor::new(proto, self.host.clone(), self.port)
    }

    /// Canonical descriptor, optionally with the geolocation tag appended
    pub fn as_str(&self, include_geolocation: bool) -> String {
        if include_geolocation {
            format!(
                "{}:{}{}",
                self.host,
                self.port,
                self.geolocation.as_deref().unwrap_or("")
            )
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = ProxyRecord::new("127.0.0.1".to_string(), 8080);
        assert_eq!(record.host, "127.0.0.1");
        assert_eq!(record.port, 8080);
        assert!(record.tunnel.is_none());
        assert!(record.latency.is_none());
        assert!(record.is_anonymous.is_none());
        assert!(record.geolocation.is_none());
    }

    #[test]
    fn test_record_as_str_without_geolocation() {
        let record = ProxyRecord::new("1.2.3.4".to_string(), 8080);
        assert_eq!(record.as_str(false), "1.2.3.4:8080");
        // No tag yet, so the descriptor stays bare even when requested
        assert_eq!(record.as_str(true), "1.2.3.4:8080");
    }

    #[test]
    fn test_record_as_str_with_geolocation() {
        let mut record = ProxyRecord::new("1.2.3.4".to_string(), 8080);
        record.geolocation = Some("|US|California|LA|1.2.3.4".to_string());
        assert_eq!(record.as_str(true), "1.2.3.4:8080|US|California|LA|1.2.3.4");
        assert_eq!(record.as_str(false), "1.2.3.4:8080");
    }

    #[test]
    fn test_tunnel_gate_shared_by_reference() {
        let tunnel = Arc::new(UpstreamTunnel::new(
            HopDescriptor::new(ProxyType::Socks5, "10.0.0.1".to_string(), 1080),
            4,
        ));
        let a = ProxyRecord::with_tunnel("1.1.1.1".to_string(), 80, Arc::clone(&tunnel));
        let b = ProxyRecord::with_tunnel("2.2.2.2".to_string(), 80, Arc::clone(&tunnel));
        let gate_a = &a.tunnel.as_ref().unwrap().gate;
        let gate_b = &b.tunnel.as_ref().unwrap().gate;
        assert!(Arc::ptr_eq(gate_a, gate_b));
    }

    #[test]
    fn test_proxy_type_labels() {
        assert_eq!(ProxyType::Socks5.label(), "SOCKS5");
        assert_eq!(ProxyType::Socks4.label(), "SOCKS4");
        assert_eq!(ProxyType::Http.label(), "HTTP");
        assert_eq!(ProxyType::Socks5.to_string(), "socks5");
    }

    #[test]
    fn test_record_display_is_bare_endpoint() {
        let mut record = ProxyRecord::new("1.2.3.4".to_string(), 8080);
        record.geolocation = Some("|US|California|LA|1.2.3.4".to_string());
        // Display never carries the geolocation tag
        assert_eq!(record.to_string(), "1.2.3.4:8080");
    }

    #[test]
    fn test_hop_display() {
        let hop = HopDescriptor::new(ProxyType::Http, "10.0.0.1".to_string(), 3128);
        assert_eq!(hop.to_string(), "http://10.0.0.1:3128");
    }
}
