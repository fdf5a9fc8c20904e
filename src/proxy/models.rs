//! Proxy record and probe outcome models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Country label applied when the catalog carries no geolocation for a record.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Proxy protocol enumeration, limited to the entry types proxychains
/// understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Socks4,
    Socks5,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Socks4 => write!(f, "socks4"),
            Protocol::Socks5 => write!(f, "socks5"),
        }
    }
}

/// Proxy authentication credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

impl ProxyAuth {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }
}

/// A single catalog entry: one proxy endpoint plus the metadata the
/// catalog declared for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyRecord {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub auth: Option<ProxyAuth>,
    /// Response time in seconds as measured upstream, if declared.
    pub declared_timeout_secs: Option<f64>,
    /// English country name, or [`UNKNOWN_COUNTRY`] when the catalog had none.
    pub country: String,
}

impl ProxyRecord {
    /// Create a new record without authentication or geolocation.
    pub fn new(protocol: Protocol, host: String, port: u16) -> Self {
        Self {
            protocol,
            host,
            port,
            auth: None,
            declared_timeout_secs: None,
            country: UNKNOWN_COUNTRY.to_string(),
        }
    }

    pub fn with_auth(mut self, username: String, password: String) -> Self {
        self.auth = Some(ProxyAuth::new(username, password));
        self
    }

    pub fn with_declared_timeout(mut self, secs: f64) -> Self {
        self.declared_timeout_secs = Some(secs);
        self
    }

    pub fn with_country(mut self, country: String) -> Self {
        self.country = country;
        self
    }

    /// The proxy endpoint as a URL, without credentials.
    ///
    /// This doubles as the record's identity: two records with the same
    /// endpoint URL are the same proxy no matter what else differs.
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// Upstream-declared response time, with records that never declared
    /// one sorting as infinitely slow.
    pub fn declared_timeout(&self) -> f64 {
        self.declared_timeout_secs.unwrap_or(f64::INFINITY)
    }
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint_url())
    }
}

/// Result of probing one proxy
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeStatus {
    Passed,
    Failed(String),
}

/// Detailed outcome of a liveness probe
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub record: ProxyRecord,
    pub status: ProbeStatus,
    pub elapsed: Option<Duration>,
    pub checked_at: DateTime<Utc>,
}

impl ProbeOutcome {
    pub fn passed(record: ProxyRecord, elapsed: Duration) -> Self {
        Self {
            record,
            status: ProbeStatus::Passed,
            elapsed: Some(elapsed),
            checked_at: Utc::now(),
        }
    }

    pub fn failed(record: ProxyRecord, reason: String) -> Self {
        Self {
            record,
            status: ProbeStatus::Failed(reason),
            elapsed: None,
            checked_at: Utc::now(),
        }
    }

    /// Failure that still measured a round trip, e.g. a response slower
    /// than the liveness threshold.
    pub fn failed_after(record: ProxyRecord, reason: String, elapsed: Duration) -> Self {
        Self {
            record,
            status: ProbeStatus::Failed(reason),
            elapsed: Some(elapsed),
            checked_at: Utc::now(),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self.status, ProbeStatus::Passed)
    }

    /// Failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match &self.status {
            ProbeStatus::Passed => None,
            ProbeStatus::Failed(reason) => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = ProxyRecord::new(Protocol::Http, "127.0.0.1".to_string(), 8080);
        assert_eq!(record.host, "127.0.0.1");
        assert_eq!(record.port, 8080);
        assert_eq!(record.protocol, Protocol::Http);
        assert!(record.auth.is_none());
        assert_eq!(record.country, UNKNOWN_COUNTRY);
    }

    #[test]
    fn test_record_with_auth() {
        let record = ProxyRecord::new(Protocol::Socks5, "127.0.0.1".to_string(), 1080)
            .with_auth("user".to_string(), "pass".to_string());
        let auth = record.auth.unwrap();
        assert_eq!(auth.username, "user");
        assert_eq!(auth.password, "pass");
    }

    #[test]
    fn test_endpoint_url_excludes_credentials() {
        let record = ProxyRecord::new(Protocol::Socks5, "192.168.1.1".to_string(), 1080)
            .with_auth("user".to_string(), "pass".to_string());
        assert_eq!(record.endpoint_url(), "socks5://192.168.1.1:1080");
    }

    #[test]
    fn test_declared_timeout_defaults_to_infinity() {
        let record = ProxyRecord::new(Protocol::Http, "10.0.0.1".to_string(), 3128);
        assert_eq!(record.declared_timeout(), f64::INFINITY);

        let record = record.with_declared_timeout(0.42);
        assert_eq!(record.declared_timeout(), 0.42);
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Http.to_string(), "http");
        assert_eq!(Protocol::Socks4.to_string(), "socks4");
        assert_eq!(Protocol::Socks5.to_string(), "socks5");
    }

    #[test]
    fn test_probe_outcome() {
        let record = ProxyRecord::new(Protocol::Http, "127.0.0.1".to_string(), 8080);

        let outcome = ProbeOutcome::passed(record.clone(), Duration::from_millis(120));
        assert!(outcome.is_passed());
        assert_eq!(outcome.elapsed, Some(Duration::from_millis(120)));
        assert!(outcome.reason().is_none());

        let outcome = ProbeOutcome::failed(record.clone(), "connection refused".to_string());
        assert!(!outcome.is_passed());
        assert_eq!(outcome.reason(), Some("connection refused"));

        let outcome = ProbeOutcome::failed_after(
            record,
            "exceeded liveness threshold".to_string(),
            Duration::from_secs(3),
        );
        assert!(!outcome.is_passed());
        assert!(outcome.elapsed.is_some());
    }
}
