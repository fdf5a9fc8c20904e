//! Proxy catalog loading from the proxy-list JSON format
//!
//! The catalog is a JSON array of records shaped like the public
//! proxy-list dumps: `protocol`, `host`, `port`, optional credentials,
//! an upstream-measured `timeout` and nested `geolocation` data. Records
//! that do not carry a usable endpoint are dropped, never fatal.

use crate::proxy::models::{Protocol, ProxyRecord, UNKNOWN_COUNTRY};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Default location of the catalog, relative to the working directory.
pub const DEFAULT_CATALOG_PATH: &str = "proxy-list/proxies.json";

/// Raw catalog entry as it appears on disk. Everything is optional;
/// validation decides what survives.
#[derive(Debug, Deserialize)]
struct RawRecord {
    protocol: Option<Protocol>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<f64>,
    geolocation: Option<RawGeolocation>,
}

#[derive(Debug, Deserialize)]
struct RawGeolocation {
    country: Option<RawCountry>,
}

#[derive(Debug, Deserialize)]
struct RawCountry {
    names: Option<RawCountryNames>,
}

#[derive(Debug, Deserialize)]
struct RawCountryNames {
    en: Option<String>,
}

impl RawRecord {
    /// Validate the raw entry into a [`ProxyRecord`].
    ///
    /// An absent protocol defaults to HTTP. A missing or empty host, or a
    /// missing or zero port, drops the entry. Credentials count only when
    /// both halves are present and non-empty.
    fn into_record(self) -> Option<ProxyRecord> {
        let host = self.host.filter(|h| !h.trim().is_empty())?;
        let port = self.port.filter(|p| *p != 0)?;
        let protocol = self.protocol.unwrap_or_default();

        let mut record = ProxyRecord::new(protocol, host, port);

        if let (Some(username), Some(password)) = (self.username, self.password) {
            if !username.is_empty() && !password.is_empty() {
                record = record.with_auth(username, password);
            }
        }

        if let Some(secs) = self.timeout {
            record = record.with_declared_timeout(secs);
        }

        let country = self
            .geolocation
            .and_then(|g| g.country)
            .and_then(|c| c.names)
            .and_then(|n| n.en)
            .filter(|name| !name.is_empty());
        if let Some(country) = country {
            record = record.with_country(country);
        }

        Some(record)
    }
}

/// An in-memory proxy catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<ProxyRecord>,
}

impl Catalog {
    /// Parse a catalog from JSON text, keeping document order.
    ///
    /// A document that is not a JSON array yields an empty catalog;
    /// individual records that fail validation are dropped and counted.
    pub fn from_json(content: &str) -> Self {
        let entries: Vec<serde_json::Value> = match serde_json::from_str(content) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("catalog is not a JSON array of records: {}", err);
                return Self::default();
            }
        };

        let total = entries.len();
        let records: Vec<ProxyRecord> = entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<RawRecord>(entry).ok())
            .filter_map(RawRecord::into_record)
            .collect();

        let dropped = total - records.len();
        if dropped > 0 {
            debug!("dropped {} malformed catalog records", dropped);
        }

        Self { records }
    }

    /// Load a catalog from a file. A missing or unreadable file is
    /// reported and yields an empty catalog.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                let catalog = Self::from_json(&content);
                debug!(
                    "loaded {} records from {}",
                    catalog.len(),
                    path.display()
                );
                catalog
            }
            Err(err) => {
                warn!("could not read catalog {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    pub fn records(&self) -> &[ProxyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted unique country names present in the catalog. The unknown
    /// sentinel is left out since it can never be selected.
    pub fn countries(&self) -> Vec<String> {
        let mut countries: Vec<String> = self
            .records
            .iter()
            .map(|r| r.country.clone())
            .filter(|c| c != UNKNOWN_COUNTRY)
            .collect();
        countries.sort();
        countries.dedup();
        countries
    }
}
