//! Liveness probing through candidate proxies
//!
//! A probe fetches a well-known URL through the candidate proxy and
//! passes only when the response is exactly 200 and arrives within the
//! liveness threshold. Records whose catalog-declared timeout already
//! exceeds the threshold are failed up front without touching the
//! network.

use crate::proxy::filter::exceeds_declared_timeout;
use crate::proxy::models::{ProbeOutcome, Protocol, ProxyRecord};
use reqwest::{Client, Proxy as ReqwestProxy, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default URL fetched through each candidate proxy
pub const DEFAULT_PROBE_URL: &str = "http://www.google.com";

/// Default timeout for the whole probe request in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Default round-trip budget a passing probe must stay within, in seconds
pub const DEFAULT_LIVENESS_THRESHOLD_SECS: f64 = 1.0;

/// Configuration for the liveness prober
#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// URL fetched through each candidate
    pub probe_url: String,
    /// Hard timeout for each probe request
    pub request_timeout: Duration,
    /// Round trips slower than this fail even when the response is 200
    pub liveness_threshold: Duration,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            probe_url: DEFAULT_PROBE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            liveness_threshold: Duration::from_secs_f64(DEFAULT_LIVENESS_THRESHOLD_SECS),
        }
    }
}

impl ProberConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe_url(mut self, url: String) -> Self {
        self.probe_url = url;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_liveness_threshold(mut self, threshold: Duration) -> Self {
        self.liveness_threshold = threshold;
        self
    }
}

/// Prober for testing whether candidate proxies are alive
#[derive(Clone)]
pub struct ProxyProber {
    config: ProberConfig,
    probes_sent: Arc<AtomicUsize>,
}

impl ProxyProber {
    /// Create a new prober with default configuration
    pub fn new() -> Self {
        Self::with_config(ProberConfig::default())
    }

    /// Create a new prober with custom configuration
    pub fn with_config(config: ProberConfig) -> Self {
        Self {
            config,
            probes_sent: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &ProberConfig {
        &self.config
    }

    /// Number of probes that actually hit the network. Records failed by
    /// the declared-timeout pre-filter are not counted.
    pub fn network_probe_count(&self) -> usize {
        self.probes_sent.load(Ordering::Relaxed)
    }

    /// Probe a single candidate proxy
    pub async fn probe(&self, record: &ProxyRecord) -> ProbeOutcome {
        if exceeds_declared_timeout(record, self.config.liveness_threshold) {
            let reason = match record.declared_timeout_secs {
                Some(secs) => {
                    format!("declared timeout {:.2}s above liveness threshold", secs)
                }
                None => "no declared timeout".to_string(),
            };
            debug!("{} skipped: {}", record, reason);
            return ProbeOutcome::failed(record.clone(), reason);
        }

        self.probes_sent.fetch_add(1, Ordering::Relaxed);

        let client = match self.build_client(record) {
            Ok(client) => client,
            Err(e) => return ProbeOutcome::failed(record.clone(), e.to_string()),
        };

        let start = Instant::now();
        match tokio::time::timeout(
            self.config.request_timeout,
            client.get(&self.config.probe_url).send(),
        )
        .await
        {
            Ok(Ok(response)) => {
                let elapsed = start.elapsed();
                if response.status() != StatusCode::OK {
                    debug!("{} failed: HTTP status {}", record, response.status());
                    ProbeOutcome::failed(
                        record.clone(),
                        format!("HTTP status: {}", response.status()),
                    )
                } else if elapsed > self.config.liveness_threshold {
                    debug!("{} too slow: {:.2}s", record, elapsed.as_secs_f64());
                    ProbeOutcome::failed_after(
                        record.clone(),
                        format!(
                            "exceeded liveness threshold: {:.2}s",
                            elapsed.as_secs_f64()
                        ),
                        elapsed,
                    )
                } else {
                    debug!("{} passed in {:.2}s", record, elapsed.as_secs_f64());
                    ProbeOutcome::passed(record.clone(), elapsed)
                }
            }
            Ok(Err(e)) => {
                debug!("{} failed: {}", record, e);
                ProbeOutcome::failed(record.clone(), e.to_string())
            }
            Err(_) => {
                debug!("{} timed out", record);
                ProbeOutcome::failed(
                    record.clone(),
                    format!("timed out after {:?}", self.config.request_timeout),
                )
            }
        }
    }

    /// Create a reqwest client routed through the candidate proxy
    fn build_client(&self, record: &ProxyRecord) -> reqwest::Result<Client> {
        let endpoint = record.endpoint_url();

        let proxy = match record.protocol {
            Protocol::Http => ReqwestProxy::http(&endpoint)?,
            Protocol::Socks4 | Protocol::Socks5 => ReqwestProxy::all(&endpoint)?,
        };

        Client::builder()
            .proxy(proxy)
            .timeout(self.config.request_timeout)
            .build()
    }
}

impl Default for ProxyProber {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Fake HTTP proxy that answers every request with `response`
    /// after an optional delay. Returns the port it listens on.
    async fn spawn_fake_proxy(response: &'static str, delay: Duration) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        port
    }

    const OK_RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";
    const UNAVAILABLE_RESPONSE: &str =
        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    fn candidate(port: u16) -> ProxyRecord {
        ProxyRecord::new(Protocol::Http, "127.0.0.1".to_string(), port)
            .with_declared_timeout(0.01)
    }

    #[test]
    fn test_prober_config_default() {
        let config = ProberConfig::default();
        assert_eq!(config.probe_url, DEFAULT_PROBE_URL);
        assert_eq!(
            config.request_timeout,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert_eq!(config.liveness_threshold, Duration::from_secs(1));
    }

    #[test]
    fn test_prober_config_builder() {
        let config = ProberConfig::new()
            .with_probe_url("http://example.com".to_string())
            .with_request_timeout(Duration::from_secs(30))
            .with_liveness_threshold(Duration::from_millis(500));

        assert_eq!(config.probe_url, "http://example.com");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.liveness_threshold, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_probe_passes_on_fast_200() {
        let port = spawn_fake_proxy(OK_RESPONSE, Duration::ZERO).await;
        let prober = ProxyProber::new();

        let outcome = prober.probe(&candidate(port)).await;
        assert!(outcome.is_passed());
        assert!(outcome.elapsed.unwrap() <= prober.config().liveness_threshold);
        assert_eq!(prober.network_probe_count(), 1);
    }

    #[tokio::test]
    async fn test_probe_fails_on_non_200_status() {
        let port = spawn_fake_proxy(UNAVAILABLE_RESPONSE, Duration::ZERO).await;
        let prober = ProxyProber::new();

        let outcome = prober.probe(&candidate(port)).await;
        assert!(!outcome.is_passed());
        assert!(outcome.reason().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_probe_fails_above_liveness_threshold() {
        let port = spawn_fake_proxy(OK_RESPONSE, Duration::from_millis(300)).await;
        let config = ProberConfig::new().with_liveness_threshold(Duration::from_millis(50));
        let prober = ProxyProber::with_config(config);

        let outcome = prober.probe(&candidate(port)).await;
        assert!(!outcome.is_passed());
        assert!(outcome.reason().unwrap().contains("threshold"));
        assert!(outcome.elapsed.unwrap() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_probe_is_bounded_by_request_timeout() {
        // Responder stalls far longer than the request timeout.
        let port = spawn_fake_proxy(OK_RESPONSE, Duration::from_secs(30)).await;
        let config = ProberConfig::new()
            .with_request_timeout(Duration::from_millis(200))
            .with_liveness_threshold(Duration::from_millis(100));
        let prober = ProxyProber::with_config(config);

        let start = Instant::now();
        let outcome = prober.probe(&candidate(port)).await;
        assert!(!outcome.is_passed());
        assert!(outcome.reason().is_some());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_probe_fails_on_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = ProxyProber::new();
        let outcome = prober.probe(&candidate(port)).await;
        assert!(!outcome.is_passed());
        assert_eq!(prober.network_probe_count(), 1);
    }

    #[tokio::test]
    async fn test_prefiltered_records_send_no_network_probe() {
        let prober = ProxyProber::new();

        // No declared timeout sorts as infinitely slow.
        let undeclared = ProxyRecord::new(Protocol::Http, "10.0.0.1".to_string(), 8080);
        let slow = ProxyRecord::new(Protocol::Http, "10.0.0.2".to_string(), 8080)
            .with_declared_timeout(3.0);

        let outcome = prober.probe(&undeclared).await;
        assert!(!outcome.is_passed());
        assert!(outcome.reason().unwrap().contains("declared timeout"));

        let outcome = prober.probe(&slow).await;
        assert!(!outcome.is_passed());

        assert_eq!(prober.network_probe_count(), 0);
    }
}
