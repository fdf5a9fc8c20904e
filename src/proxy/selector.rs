//! Working-pool collection and bounded random selection
//!
//! The selector drives probe rounds over a candidate list until enough
//! working proxies are pooled or the retry budget runs out, then samples
//! a bounded subset of the pool for use.

use crate::error::{Error, Result};
use crate::proxy::models::{ProbeOutcome, ProxyRecord};
use crate::proxy::prober::ProxyProber;
use crate::ui;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Default number of working proxies that ends the retry loop
pub const DEFAULT_MIN_QUORUM: usize = 5;

/// Default hard cap on the working pool
pub const DEFAULT_MAX_POOL: usize = 10;

/// Default number of probe rounds before giving up
pub const DEFAULT_MAX_ROUNDS: u32 = 3;

/// Default pause between probe rounds in seconds
pub const DEFAULT_ROUND_DELAY_SECS: f64 = 1.0;

/// Default number of concurrent probes per round
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Configuration for the selection controller
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Stop retrying once the pool holds this many working proxies
    pub min_quorum: usize,
    /// Never pool more than this many working proxies
    pub max_pool: usize,
    /// Give up after this many probe rounds
    pub max_rounds: u32,
    /// Pause between rounds
    pub round_delay: Duration,
    /// Concurrent probes per round
    pub concurrency: usize,
    /// Fixed seed for sampling, for reproducible selections
    pub sample_seed: Option<u64>,
    /// Show a per-round progress bar
    pub progress: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_quorum: DEFAULT_MIN_QUORUM,
            max_pool: DEFAULT_MAX_POOL,
            max_rounds: DEFAULT_MAX_ROUNDS,
            round_delay: Duration::from_secs_f64(DEFAULT_ROUND_DELAY_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            sample_seed: None,
            progress: false,
        }
    }
}

impl SelectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_quorum(mut self, quorum: usize) -> Self {
        self.min_quorum = quorum;
        self
    }

    pub fn with_max_pool(mut self, cap: usize) -> Self {
        self.max_pool = cap;
        self
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_round_delay(mut self, delay: Duration) -> Self {
        self.round_delay = delay;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_sample_seed(mut self, seed: u64) -> Self {
        self.sample_seed = Some(seed);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

/// Pool of proxies that passed a probe, deduplicated by endpoint and
/// capped at a fixed size.
#[derive(Debug, Clone)]
pub struct WorkingPool {
    records: Vec<ProxyRecord>,
    seen: HashSet<String>,
    cap: usize,
}

impl WorkingPool {
    pub fn new(cap: usize) -> Self {
        Self {
            records: Vec::new(),
            seen: HashSet::new(),
            cap,
        }
    }

    /// Insert a record, returning whether it was actually added. Records
    /// whose endpoint is already pooled, or arriving once the pool is
    /// full, are rejected.
    pub fn insert(&mut self, record: ProxyRecord) -> bool {
        if self.records.len() >= self.cap {
            return false;
        }
        if !self.seen.insert(record.endpoint_url()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn contains(&self, record: &ProxyRecord) -> bool {
        self.seen.contains(&record.endpoint_url())
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.cap
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ProxyRecord] {
        &self.records
    }
}

/// How pool collection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// The quorum was reached within the retry budget
    QuorumMet,
    /// Every round ran (or no candidates remained) without reaching quorum
    RetryBudgetExhausted,
}

/// Result of collecting a working pool
#[derive(Debug, Clone)]
pub struct PoolReport {
    pub status: PoolStatus,
    /// Probe rounds actually run
    pub rounds: u32,
    pub pool: WorkingPool,
    /// The passing outcome behind each pooled record, in pool order.
    pub passes: Vec<ProbeOutcome>,
}

/// Selection controller driving probe rounds and final sampling
pub struct ProxySelector {
    prober: ProxyProber,
    config: SelectorConfig,
}

impl ProxySelector {
    pub fn new(prober: ProxyProber, config: SelectorConfig) -> Self {
        Self { prober, config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn prober(&self) -> &ProxyProber {
        &self.prober
    }

    /// Probe `candidates` in rounds until the pool reaches quorum or the
    /// round budget is spent.
    ///
    /// Every round re-probes each candidate not yet pooled; proxies that
    /// already passed are never probed again. A round ends early once the
    /// pool is full, dropping whatever probes are still in flight. The
    /// inter-round delay only runs when another round is actually coming.
    pub async fn collect_pool(&self, candidates: &[ProxyRecord]) -> PoolReport {
        let mut pool = WorkingPool::new(self.config.max_pool);
        let mut passes: Vec<ProbeOutcome> = Vec::new();
        let mut rounds = 0u32;

        while pool.len() < self.config.min_quorum && rounds < self.config.max_rounds {
            let pending: Vec<ProxyRecord> = candidates
                .iter()
                .filter(|record| !pool.contains(record))
                .cloned()
                .collect();
            if pending.is_empty() {
                debug!("no candidates left to probe");
                break;
            }

            rounds += 1;
            info!(
                "round {}/{}: probing {} candidates",
                rounds,
                self.config.max_rounds,
                pending.len()
            );

            self.run_round(pending, &mut pool, &mut passes).await;

            info!(
                "round {} done: {} working of {} wanted",
                rounds,
                pool.len(),
                self.config.min_quorum
            );

            let more_candidates = candidates.iter().any(|record| !pool.contains(record));
            if pool.len() < self.config.min_quorum
                && rounds < self.config.max_rounds
                && more_candidates
            {
                tokio::time::sleep(self.config.round_delay).await;
            }
        }

        let status = if pool.len() >= self.config.min_quorum {
            PoolStatus::QuorumMet
        } else {
            PoolStatus::RetryBudgetExhausted
        };

        PoolReport {
            status,
            rounds,
            pool,
            passes,
        }
    }

    /// Run one probe round over `pending`, pooling passes as they land.
    async fn run_round(
        &self,
        pending: Vec<ProxyRecord>,
        pool: &mut WorkingPool,
        passes: &mut Vec<ProbeOutcome>,
    ) {
        let bar = if self.config.progress {
            ui::round_progress(pending.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        let mut outcomes = stream::iter(pending)
            .map(|record| {
                let sem = Arc::clone(&semaphore);
                let prober = &self.prober;
                async move {
                    // Semaphore acquire only fails if the semaphore is closed,
                    // which won't happen here since we own the Arc and keep it
                    // alive for the duration of the round.
                    let _permit = sem
                        .acquire()
                        .await
                        .expect("Semaphore closed unexpectedly");
                    prober.probe(&record).await
                }
            })
            .buffer_unordered(self.config.concurrency);

        while let Some(outcome) = outcomes.next().await {
            bar.inc(1);
            if outcome.is_passed() && pool.insert(outcome.record.clone()) {
                passes.push(outcome);
                if pool.is_full() {
                    break;
                }
            }
        }

        bar.finish_and_clear();
    }

    /// Sample up to `count` proxies from the pool, uniformly and without
    /// replacement. An empty pool is an error; a pool smaller than `count`
    /// yields the whole pool in sampled order.
    pub fn sample(&self, pool: &WorkingPool, count: usize) -> Result<Vec<ProxyRecord>> {
        if pool.is_empty() {
            return Err(Error::NoProxiesAvailable);
        }

        let mut rng = match self.config.sample_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let take = count.min(pool.len());
        Ok(pool
            .records()
            .choose_multiple(&mut rng, take)
            .cloned()
            .collect())
    }
}
