//! Proxy validation engine
//!
//! This module provides functionality for:
//! - Building connection chains through an optional upstream tunnel
//! - Admitting checks through global and per-tunnel concurrency gates
//! - Probing candidates with a deadline and measuring latency
//! - Classifying anonymity and geolocation from the probe response
//! - Matching operator-defined bingo/stop locations

pub mod chain;
pub mod checker;
pub mod gate;
pub mod geo;
pub mod models;
pub mod policy;
pub mod probe;

pub use chain::ConnectionChain;
pub use checker::{Checker, CheckerConfig, DEFAULT_CHECK_URL, DEFAULT_URL_SENTINEL};
pub use gate::{admit, Admission};
pub use geo::{classify, GeoLookup};
pub use models::{HopDescriptor, ProxyRecord, ProxyType, UpstreamTunnel};
pub use policy::{Decision, HaltFlag, LocationPolicy};
pub use probe::{probe, ProbeFailure, ProbeOutcome, PROBE_USER_AGENT};
