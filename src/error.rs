use std::io;

/// Error type for geoprox operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The proxy catalog could not be loaded or held no usable records.
    #[error("proxy catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Probing finished without a single working proxy.
    #[error("no working proxies available")]
    NoProxiesAvailable,

    /// Interactive input stayed invalid past the retry allowance.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// IO error from the config sink or the terminal.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for geoprox operations.
pub type Result<T> = std::result::Result<T, Error>;
