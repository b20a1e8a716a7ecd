//! Poll-cycle orchestration for both window strategies.

use crate::block::Block;
use crate::cache::BlockCache;
use crate::fetch::{BlockFetcher, RetryPolicy};
use crate::fixed_window::FixedWindowAggregator;
use crate::publish::Publisher;
use crate::source::{BlockSource, SourceError};
use crate::state::StatsState;
use crate::stats::{unix_now, Stats};
use crate::time_window::TimeWindowAggregator;
use chainpulse_config::MonitorConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Failure that aborts a single poll cycle.
///
/// Cycle failures are transient by construction: the next tick starts a
/// fresh cycle, so none of these tears the service down.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to read chain height: {0}")]
    Height(SourceError),
    #[error("failed to fetch frontier block {height}: {source}")]
    Frontier { height: u64, source: SourceError },
}

/// How a completed poll cycle resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// Snapshot committed and published.
    Committed(Stats),
    /// Chain had not advanced past the already-committed frontier.
    Behind { height: u64, latest: u64 },
    /// Snapshot lost the commit race to a newer cycle.
    Discarded(Stats),
}

/// Owns the fetch machinery and drives poll cycles for the enabled
/// window strategies, committing their snapshots through a shared
/// [`StatsState`].
pub struct Collector {
    source: Arc<dyn BlockSource>,
    fetcher: Arc<BlockFetcher>,
    state: Arc<StatsState>,
    publisher: Arc<dyn Publisher>,
    fixed: FixedWindowAggregator,
    time: TimeWindowAggregator,
    fixed_poll: Duration,
    time_poll: Duration,
}

impl Collector {
    pub fn new(
        config: &MonitorConfig,
        source: Arc<dyn BlockSource>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let cache = Arc::new(BlockCache::new(
            config.fixed_window.window_blocks,
            config.cache.retention_buffer,
        ));
        let fetcher = Arc::new(BlockFetcher::new(
            Arc::clone(&source),
            cache,
            RetryPolicy::from_config(&config.retry),
        ));
        let fixed = FixedWindowAggregator::new(
            Arc::clone(&fetcher),
            config.fixed_window.window_blocks,
            config.fixed_window.max_in_flight,
        );
        let time = TimeWindowAggregator::new(Arc::clone(&fetcher), config.time_window.window());
        Self {
            source,
            fetcher,
            state: Arc::new(StatsState::new()),
            publisher,
            fixed,
            time,
            fixed_poll: config.fixed_window.poll_interval(),
            time_poll: config.time_window.poll_interval(),
        }
    }

    /// Shared snapshot state, for the HTTP surface and metrics.
    pub fn state(&self) -> &Arc<StatsState> {
        &self.state
    }

    /// Fetch machinery, for metrics.
    pub fn fetcher(&self) -> &Arc<BlockFetcher> {
        &self.fetcher
    }

    /// Runs one fixed-window cycle: read the chain height, skip if the
    /// chain fell behind the committed frontier, otherwise fetch the
    /// frontier, aggregate its trailing window, and race to commit.
    pub async fn cycle_fixed(&self) -> Result<CycleOutcome, CycleError> {
        let height = self
            .source
            .chain_height()
            .await
            .map_err(CycleError::Height)?;
        let latest = self.state.latest_height();
        if height < latest {
            debug!(
                target: "chainpulse",
                height,
                latest,
                "chain behind committed frontier, skipping cycle"
            );
            return Ok(CycleOutcome::Behind { height, latest });
        }
        let frontier = self.fetch_frontier(height).await?;
        let stats = self.fixed.aggregate(frontier, unix_now()).await;
        Ok(self.commit(stats))
    }

    /// Runs one time-window cycle. No height pre-check here: the commit
    /// gate alone arbitrates, and a backward walk from a stale frontier
    /// costs only cache reads.
    pub async fn cycle_time_window(&self) -> Result<CycleOutcome, CycleError> {
        let height = self
            .source
            .chain_height()
            .await
            .map_err(CycleError::Height)?;
        let frontier = self.fetch_frontier(height).await?;
        let stats = self.time.aggregate(frontier, unix_now()).await;
        Ok(self.commit(stats))
    }

    async fn fetch_frontier(&self, height: u64) -> Result<Block, CycleError> {
        self.fetcher
            .fetch(height)
            .await
            .map_err(|source| CycleError::Frontier { height, source })
    }

    fn commit(&self, stats: Stats) -> CycleOutcome {
        if self.state.try_commit(stats, self.publisher.as_ref()) {
            CycleOutcome::Committed(stats)
        } else {
            CycleOutcome::Discarded(stats)
        }
    }

    /// Drives fixed-window cycles forever. Each tick spawns its cycle,
    /// so a slow fan-out never delays the next poll; the commit gate
    /// keeps overlapping cycles consistent.
    pub async fn run_fixed(self: Arc<Self>) {
        let mut ticker = interval(self.fixed_poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let collector = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(err) = collector.cycle_fixed().await {
                    warn!(target: "chainpulse", error = %err, "fixed window cycle failed");
                }
            });
        }
    }

    /// Drives time-window cycles forever, one at a time. The backward
    /// walk is serial and unbounded, so cycles are awaited inline
    /// rather than spawned.
    pub async fn run_time_window(self: Arc<Self>) {
        let mut ticker = interval(self.time_poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.cycle_time_window().await {
                warn!(target: "chainpulse", error = %err, "time window cycle failed");
            }
        }
    }
}
