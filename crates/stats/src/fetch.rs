//! Cache-aware block fetching with failure-kind-specific retries.

use crate::block::Block;
use crate::cache::BlockCache;
use crate::source::{BlockSource, SourceError, SourceResult};
use chainpulse_config::RetryConfig;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default delay between retries for a not-yet-indexed height.
pub const DEFAULT_UNINDEXED_DELAY: Duration = Duration::from_millis(500);

/// Default delay between retries for a network failure.
pub const DEFAULT_NETWORK_DELAY: Duration = Duration::from_millis(250);

/// Default total attempts per height for network failures.
pub const DEFAULT_MAX_NETWORK_ATTEMPTS: u32 = 3;

/// Per-failure-kind retry parameters.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay between unbounded retries of an unindexed height
    pub unindexed_delay: Duration,
    /// Delay between bounded retries of a network failure
    pub network_delay: Duration,
    /// Total attempts allowed per height when the network fails
    pub max_network_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            unindexed_delay: DEFAULT_UNINDEXED_DELAY,
            network_delay: DEFAULT_NETWORK_DELAY,
            max_network_attempts: DEFAULT_MAX_NETWORK_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            unindexed_delay: config.unindexed_retry(),
            network_delay: config.network_retry(),
            max_network_attempts: config.max_network_attempts,
        }
    }
}

/// Counters exposed for observability; updated by every fetch.
#[derive(Debug, Default)]
pub struct FetchCounters {
    cache_hits: AtomicU64,
    blocks_fetched: AtomicU64,
    unindexed_retries: AtomicU64,
    network_failures: AtomicU64,
    missing_data: AtomicU64,
}

impl FetchCounters {
    /// Fetches answered from the cache without network I/O.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Blocks successfully fetched from the source.
    pub fn blocks_fetched(&self) -> u64 {
        self.blocks_fetched.load(Ordering::Relaxed)
    }

    /// Retries spent waiting for unindexed heights.
    pub fn unindexed_retries(&self) -> u64 {
        self.unindexed_retries.load(Ordering::Relaxed)
    }

    /// Individual failed attempts due to network errors.
    pub fn network_failures(&self) -> u64 {
        self.network_failures.load(Ordering::Relaxed)
    }

    /// Heights given up on after exhausting network retries.
    pub fn missing_data(&self) -> u64 {
        self.missing_data.load(Ordering::Relaxed)
    }
}

/// Fetches blocks through the cache, retrying per [`RetryPolicy`].
///
/// Two entry points with different failure contracts:
/// - [`fetch`](Self::fetch) waits out unindexed heights indefinitely and
///   propagates network failures to the caller. Used for the frontier
///   block, whose loss aborts the whole cycle.
/// - [`fetch_tolerant`](Self::fetch_tolerant) additionally bounds network
///   failures and degrades to `None` on exhaustion. Used for window
///   members, where a missing datum is tolerated by the aggregate.
pub struct BlockFetcher {
    source: Arc<dyn BlockSource>,
    cache: Arc<BlockCache>,
    policy: RetryPolicy,
    counters: FetchCounters,
    // Heights currently stuck behind the node's indexer, by first-seen time.
    unindexed_since: Mutex<BTreeMap<u64, Instant>>,
}

impl BlockFetcher {
    pub fn new(source: Arc<dyn BlockSource>, cache: Arc<BlockCache>, policy: RetryPolicy) -> Self {
        Self {
            source,
            cache,
            policy,
            counters: FetchCounters::default(),
            unindexed_since: Mutex::new(BTreeMap::new()),
        }
    }

    /// Fetch counters for observability.
    pub fn counters(&self) -> &FetchCounters {
        &self.counters
    }

    /// The cache this fetcher reads through.
    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    /// How long the longest-waiting unindexed height has been pending, if
    /// any. Lets operators detect a stuck chain indexer despite the
    /// unbounded retry loop.
    pub fn oldest_unindexed_wait(&self) -> Option<Duration> {
        let waits = self.unindexed_since.lock();
        waits.values().min().map(Instant::elapsed)
    }

    /// Fetches one block, waiting out unindexed heights indefinitely.
    /// Network failures propagate immediately.
    pub async fn fetch(&self, height: u64) -> SourceResult<Block> {
        if let Some(block) = self.cache.get(height) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(block);
        }

        loop {
            match self.source.block_at(height).await {
                Ok(block) => {
                    self.complete(height, block);
                    return Ok(block);
                }
                Err(SourceError::Unindexed(_)) => {
                    self.record_unindexed(height);
                    sleep(self.policy.unindexed_delay).await;
                }
                Err(err) => {
                    self.clear_unindexed(height);
                    self.counters.network_failures.fetch_add(1, Ordering::Relaxed);
                    return Err(err);
                }
            }
        }
    }

    /// Fetches one block, degrading to `None` once network retries are
    /// exhausted. Unindexed heights are still waited out indefinitely.
    pub async fn fetch_tolerant(&self, height: u64) -> Option<Block> {
        if let Some(block) = self.cache.get(height) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Some(block);
        }

        let mut attempts = 0u32;
        loop {
            match self.source.block_at(height).await {
                Ok(block) => {
                    self.complete(height, block);
                    return Some(block);
                }
                Err(SourceError::Unindexed(_)) => {
                    self.record_unindexed(height);
                    sleep(self.policy.unindexed_delay).await;
                }
                Err(SourceError::Network(reason)) => {
                    attempts += 1;
                    self.counters.network_failures.fetch_add(1, Ordering::Relaxed);
                    if attempts >= self.policy.max_network_attempts {
                        self.clear_unindexed(height);
                        self.counters.missing_data.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            target: "chainpulse",
                            height,
                            attempts,
                            reason,
                            "giving up on block, treating as missing"
                        );
                        return None;
                    }
                    debug!(
                        target: "chainpulse",
                        height,
                        attempts,
                        reason,
                        "block fetch failed, retrying"
                    );
                    sleep(self.policy.network_delay).await;
                }
            }
        }
    }

    fn complete(&self, height: u64, block: Block) {
        self.clear_unindexed(height);
        self.cache.insert(block);
        self.counters.blocks_fetched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_unindexed(&self, height: u64) {
        self.unindexed_since
            .lock()
            .entry(height)
            .or_insert_with(Instant::now);
        self.counters.unindexed_retries.fetch_add(1, Ordering::Relaxed);
        debug!(target: "chainpulse", height, "block not indexed yet, retrying");
    }

    fn clear_unindexed(&self, height: u64) {
        self.unindexed_since.lock().remove(&height);
    }
}

impl std::fmt::Debug for BlockFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockFetcher")
            .field("policy", &self.policy)
            .field("counters", &self.counters)
            .finish()
    }
}
