//! Country filtering over catalog records

use crate::proxy::models::{ProxyRecord, UNKNOWN_COUNTRY};
use std::time::Duration;

/// Narrow `records` to the proxies located in `country`.
///
/// `None` or an empty selector keeps every record. Matching is
/// case-insensitive on the full English country name, and records whose
/// country is unknown never match a named selector.
pub fn filter_by_country(records: &[ProxyRecord], country: Option<&str>) -> Vec<ProxyRecord> {
    let selector = match country {
        Some(c) if !c.trim().is_empty() => c.trim(),
        _ => return records.to_vec(),
    };

    records
        .iter()
        .filter(|record| {
            !record.country.eq_ignore_ascii_case(UNKNOWN_COUNTRY)
                && record.country.eq_ignore_ascii_case(selector)
        })
        .cloned()
        .collect()
}

/// True when the record's upstream-declared response time is already slower
/// than the liveness threshold, so no probe could ever pass it.
pub fn exceeds_declared_timeout(record: &ProxyRecord, threshold: Duration) -> bool {
    record.declared_timeout() > threshold.as_secs_f64()
}
