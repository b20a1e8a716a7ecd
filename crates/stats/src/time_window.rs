//! Rolling window over a fixed span of wall-clock time.

use crate::block::Block;
use crate::fetch::BlockFetcher;
use crate::stats::{rate, round2, Stats};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Aggregates throughput over however many blocks span `threshold` of
/// chain time behind the frontier.
///
/// Walks backward one height at a time until it reaches a block whose
/// timestamp lags the frontier by at least the threshold. That boundary
/// block closes the window: it is counted, its timestamp fixes the
/// elapsed span, but its transactions fall outside the window. Heights
/// that stay unavailable after retries are skipped entirely and the
/// walk continues past them.
pub struct TimeWindowAggregator {
    fetcher: Arc<BlockFetcher>,
    threshold: Duration,
}

impl TimeWindowAggregator {
    pub fn new(fetcher: Arc<BlockFetcher>, threshold: Duration) -> Self {
        Self { fetcher, threshold }
    }

    /// Builds a snapshot for `frontier` by walking back through chain
    /// time. `now_secs` is the wall-clock instant the poll observed the
    /// frontier.
    pub async fn aggregate(&self, frontier: Block, now_secs: f64) -> Stats {
        let threshold_secs = self.threshold.as_secs();
        let mut count = 1u64;
        let mut total = frontier.tx_count;
        let mut oldest_seen = frontier.timestamp;
        let mut missing = 0u64;
        let mut elapsed = None;

        let mut height = frontier.height;
        while height > 0 {
            height -= 1;
            let block = match self.fetcher.fetch_tolerant(height).await {
                Some(block) => block,
                None => {
                    missing += 1;
                    continue;
                }
            };
            count += 1;
            let difference = frontier.timestamp.saturating_sub(block.timestamp);
            if difference >= threshold_secs {
                elapsed = Some(difference);
                break;
            }
            total += block.tx_count;
            oldest_seen = oldest_seen.min(block.timestamp);
        }
        // A walk that drains the chain without reaching the threshold
        // spans only as far back as its oldest fetched block.
        let elapsed = elapsed.unwrap_or_else(|| frontier.timestamp.saturating_sub(oldest_seen));

        if missing > 0 {
            debug!(
                target: "chainpulse",
                height = frontier.height,
                missing,
                "time window walked past missing blocks"
            );
        }

        let elapsed = elapsed as f64;
        Stats {
            latest_height: frontier.height,
            window_size: count,
            elapsed_seconds: round2(elapsed),
            total_transactions: total,
            tx_per_second: rate(total as f64, elapsed),
            block_time_seconds: rate(elapsed, count as f64),
            seconds_since_last_block: round2(now_secs - frontier.timestamp as f64),
        }
    }
}
