//! Proxy Vet - Chained Proxy Validation Engine
//!
//! Validates candidate proxies by routing a test HTTP request through each
//! one, optionally via a fixed upstream tunnel first. Measures latency,
//! determines anonymity and geolocation, and flags proxies whose location
//! matches operator-defined bingo or stop criteria.

pub mod proxy;

pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
