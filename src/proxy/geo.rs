//! Geolocation response model and anonymity classification

use crate::proxy::models::ProxyRecord;
use serde::Deserialize;

/// Fields consumed from the default geolocation endpoint's JSON response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeoLookup {
    /// Public IP the target observed as the client
    pub query: String,
    pub country: String,
    #[serde(rename = "regionName")]
    pub region_name: String,
    pub city: String,
}

impl GeoLookup {
    /// Canonical `|country|region|city|ip` tag
    pub fn tag(&self) -> String {
        format!(
            "|{}|{}|{}|{}",
            self.country, self.region_name, self.city, self.query
        )
    }
}

/// Annotate a record from a successful default-endpoint probe.
///
/// The proxy is anonymous exactly when its declared host differs from the
/// client IP the target observed; a match means the proxy exposed itself
/// (or forwarded the origin) rather than masking it. Pure in the response
/// body and the record's host.
pub fn classify(record: &mut ProxyRecord, geo: &GeoLookup) {
    record.is_anonymous = Some(record.host != geo.query);
    record.geolocation = Some(geo.tag());
}
