//! geoprox - Geo-filtered proxy selection for proxychains
//!
//! Loads a public proxy catalog, filters it by country, probes which
//! proxies are actually alive and fast enough, then routes an
//! application through a random subset of them via proxychains.

pub mod error;
pub mod proxy;
pub mod proxychains;
pub mod ui;

pub use error::{Error, Result};
pub use proxy::*;
pub use proxychains::*;
