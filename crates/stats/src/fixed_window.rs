//! Rolling window over a fixed number of trailing blocks.

use crate::block::Block;
use crate::fetch::BlockFetcher;
use crate::stats::{rate, round2, Stats};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::debug;

/// Aggregates throughput over the `window_blocks` blocks behind the
/// frontier, fanning member fetches out concurrently.
///
/// Members that stay unavailable after retries are tolerated: their
/// transactions simply drop out of the totals while the averaging
/// divisors keep the configured window size, biasing the published
/// rates low rather than failing the cycle.
pub struct FixedWindowAggregator {
    fetcher: Arc<BlockFetcher>,
    window_blocks: u64,
    max_in_flight: usize,
}

impl FixedWindowAggregator {
    pub fn new(fetcher: Arc<BlockFetcher>, window_blocks: u64, max_in_flight: usize) -> Self {
        Self {
            fetcher,
            window_blocks,
            max_in_flight,
        }
    }

    /// Builds a snapshot for `frontier` from the trailing window.
    ///
    /// Fetches heights `frontier - 1 ..= frontier - window_blocks`
    /// (clamped at genesis), at most `max_in_flight` in flight at once.
    /// `now_secs` is the wall-clock instant the poll observed the
    /// frontier, used for the frontier staleness figure.
    pub async fn aggregate(&self, frontier: Block, now_secs: f64) -> Stats {
        let lo = frontier.height.saturating_sub(self.window_blocks);
        let members: Vec<Option<Block>> = stream::iter((lo..frontier.height).rev().map(|height| {
            let fetcher = Arc::clone(&self.fetcher);
            async move { fetcher.fetch_tolerant(height).await }
        }))
        .buffer_unordered(self.max_in_flight)
        .collect()
        .await;

        let mut oldest = frontier.timestamp;
        let mut total = frontier.tx_count;
        let mut missing = 0u64;
        for member in &members {
            match member {
                Some(block) => {
                    total += block.tx_count;
                    oldest = oldest.min(block.timestamp);
                }
                None => missing += 1,
            }
        }
        if missing > 0 {
            debug!(
                target: "chainpulse",
                height = frontier.height,
                missing,
                "window aggregated with missing blocks"
            );
        }

        let elapsed = frontier.timestamp.saturating_sub(oldest) as f64;
        Stats {
            latest_height: frontier.height,
            window_size: self.window_blocks,
            elapsed_seconds: round2(elapsed),
            total_transactions: total,
            tx_per_second: rate(total as f64, elapsed),
            block_time_seconds: rate(elapsed, self.window_blocks as f64),
            seconds_since_last_block: round2(now_secs - frontier.timestamp as f64),
        }
    }
}
