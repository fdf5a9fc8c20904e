//! Proxy catalog, filtering, probing and selection
//!
//! This module provides functionality for:
//! - Loading proxy records from a proxy-list JSON catalog
//! - Filtering records by country
//! - Probing liveness and latency through each candidate proxy
//! - Collecting a working pool over retry rounds and sampling from it

pub mod catalog;
pub mod filter;
pub mod models;
pub mod prober;
pub mod selector;

pub use catalog::{Catalog, DEFAULT_CATALOG_PATH};
pub use filter::{exceeds_declared_timeout, filter_by_country};
pub use models::{ProbeOutcome, ProbeStatus, Protocol, ProxyAuth, ProxyRecord, UNKNOWN_COUNTRY};
pub use prober::{ProberConfig, ProxyProber};
pub use selector::{PoolReport, PoolStatus, ProxySelector, SelectorConfig, WorkingPool};
