//! Prometheus metrics for the chainpulse daemon.
//!
//! Snapshot gauges mirror the last committed window; runtime gauges and
//! counters track the fetch machinery. Counters are advanced by delta
//! from the collector's running totals so a refresh never double counts.

use chainpulse_stats::{BlockFetcher, Publisher, Stats, StatsState};
use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, TextEncoder};
use std::sync::atomic::{AtomicU64, Ordering};

fn register_gauge_best_effort(name: &str, help: &str) -> Gauge {
    let gauge = Gauge::new(name, help)
        .unwrap_or_else(|_| Gauge::new("chainpulse_invalid_metric", "Invalid").unwrap());
    let _ = prometheus::register(Box::new(gauge.clone()));
    gauge
}

fn register_counter_best_effort(name: &str, help: &str) -> Counter {
    let counter = Counter::new(name, help)
        .unwrap_or_else(|_| Counter::new("chainpulse_invalid_counter", "Invalid").unwrap());
    let _ = prometheus::register(Box::new(counter.clone()));
    counter
}

lazy_static! {
    // Snapshot gauges, refreshed on every commit.
    static ref LATEST_HEIGHT: Gauge = register_gauge_best_effort(
        "chainpulse_latest_height",
        "Frontier height of the last committed snapshot",
    );
    static ref WINDOW_SIZE: Gauge = register_gauge_best_effort(
        "chainpulse_window_size",
        "Blocks covered by the last committed window",
    );
    static ref ELAPSED_SECONDS: Gauge = register_gauge_best_effort(
        "chainpulse_elapsed_seconds",
        "Chain time spanned by the last committed window",
    );
    static ref TOTAL_TRANSACTIONS: Gauge = register_gauge_best_effort(
        "chainpulse_total_transactions",
        "Transactions inside the last committed window",
    );
    static ref TX_PER_SECOND: Gauge = register_gauge_best_effort(
        "chainpulse_tx_per_second",
        "Transaction throughput over the last committed window",
    );
    static ref BLOCK_TIME_SECONDS: Gauge = register_gauge_best_effort(
        "chainpulse_block_time_seconds",
        "Average block interval over the last committed window",
    );
    static ref SECONDS_SINCE_LAST_BLOCK: Gauge = register_gauge_best_effort(
        "chainpulse_seconds_since_last_block",
        "Frontier staleness observed at the last commit",
    );

    // Runtime gauges, refreshed periodically.
    static ref CACHE_BLOCKS: Gauge = register_gauge_best_effort(
        "chainpulse_cache_blocks",
        "Blocks currently retained in the cache",
    );
    static ref UNINDEXED_WAIT_SECONDS: Gauge = register_gauge_best_effort(
        "chainpulse_unindexed_wait_seconds",
        "Longest current wait on a height the node has not indexed yet",
    );

    // Counters advanced by delta from running totals.
    static ref COMMITS_TOTAL: Counter = register_counter_best_effort(
        "chainpulse_commits_total",
        "Snapshots committed since startup",
    );
    static ref STALE_CYCLES_TOTAL: Counter = register_counter_best_effort(
        "chainpulse_stale_cycles_total",
        "Snapshots discarded for losing the commit race",
    );
    static ref MISSING_DATA_TOTAL: Counter = register_counter_best_effort(
        "chainpulse_missing_data_total",
        "Window members given up on after exhausting network retries",
    );
    static ref CACHE_HITS_TOTAL: Counter = register_counter_best_effort(
        "chainpulse_cache_hits_total",
        "Block fetches answered from the cache",
    );
    static ref BLOCKS_FETCHED_TOTAL: Counter = register_counter_best_effort(
        "chainpulse_blocks_fetched_total",
        "Blocks fetched from the source",
    );
    static ref UNINDEXED_RETRIES_TOTAL: Counter = register_counter_best_effort(
        "chainpulse_unindexed_retries_total",
        "Retries spent waiting for not-yet-indexed heights",
    );
    static ref NETWORK_FAILURES_TOTAL: Counter = register_counter_best_effort(
        "chainpulse_network_failures_total",
        "Failed fetch attempts due to network errors",
    );

    static ref COMMITS_LAST: AtomicU64 = AtomicU64::new(0);
    static ref STALE_CYCLES_LAST: AtomicU64 = AtomicU64::new(0);
    static ref MISSING_DATA_LAST: AtomicU64 = AtomicU64::new(0);
    static ref CACHE_HITS_LAST: AtomicU64 = AtomicU64::new(0);
    static ref BLOCKS_FETCHED_LAST: AtomicU64 = AtomicU64::new(0);
    static ref UNINDEXED_RETRIES_LAST: AtomicU64 = AtomicU64::new(0);
    static ref NETWORK_FAILURES_LAST: AtomicU64 = AtomicU64::new(0);
}

/// Publisher that mirrors each committed snapshot into the gauges.
pub struct MetricsPublisher;

impl Publisher for MetricsPublisher {
    fn publish(&self, _event: &str, stats: &Stats) {
        update_stats(stats);
    }
}

/// Updates the snapshot gauges from a committed snapshot.
pub fn update_stats(stats: &Stats) {
    LATEST_HEIGHT.set(stats.latest_height as f64);
    WINDOW_SIZE.set(stats.window_size as f64);
    ELAPSED_SECONDS.set(stats.elapsed_seconds);
    TOTAL_TRANSACTIONS.set(stats.total_transactions as f64);
    TX_PER_SECOND.set(stats.tx_per_second);
    BLOCK_TIME_SECONDS.set(stats.block_time_seconds);
    SECONDS_SINCE_LAST_BLOCK.set(stats.seconds_since_last_block);
}

/// Updates the runtime gauges and counters from the collector's totals.
pub fn update_runtime(state: &StatsState, fetcher: &BlockFetcher) {
    CACHE_BLOCKS.set(fetcher.cache().len() as f64);
    UNINDEXED_WAIT_SECONDS.set(
        fetcher
            .oldest_unindexed_wait()
            .map(|wait| wait.as_secs_f64())
            .unwrap_or(0.0),
    );

    let counters = fetcher.counters();
    bump_by_delta(&COMMITS_TOTAL, &COMMITS_LAST, state.commits());
    bump_by_delta(&STALE_CYCLES_TOTAL, &STALE_CYCLES_LAST, state.stale_discards());
    bump_by_delta(&MISSING_DATA_TOTAL, &MISSING_DATA_LAST, counters.missing_data());
    bump_by_delta(&CACHE_HITS_TOTAL, &CACHE_HITS_LAST, counters.cache_hits());
    bump_by_delta(
        &BLOCKS_FETCHED_TOTAL,
        &BLOCKS_FETCHED_LAST,
        counters.blocks_fetched(),
    );
    bump_by_delta(
        &UNINDEXED_RETRIES_TOTAL,
        &UNINDEXED_RETRIES_LAST,
        counters.unindexed_retries(),
    );
    bump_by_delta(
        &NETWORK_FAILURES_TOTAL,
        &NETWORK_FAILURES_LAST,
        counters.network_failures(),
    );
}

fn bump_by_delta(counter: &Counter, last: &AtomicU64, current: u64) {
    let previous = last.swap(current, Ordering::Relaxed);
    if current > previous {
        counter.inc_by((current - previous) as f64);
    }
}

/// Gathers all metrics in Prometheus text format.
pub fn gather() -> Vec<u8> {
    let _ = &*LATEST_HEIGHT;
    let _ = &*WINDOW_SIZE;
    let _ = &*ELAPSED_SECONDS;
    let _ = &*TOTAL_TRANSACTIONS;
    let _ = &*TX_PER_SECOND;
    let _ = &*BLOCK_TIME_SECONDS;
    let _ = &*SECONDS_SINCE_LAST_BLOCK;
    let _ = &*CACHE_BLOCKS;
    let _ = &*UNINDEXED_WAIT_SECONDS;
    let _ = &*COMMITS_TOTAL;
    let _ = &*STALE_CYCLES_TOTAL;
    let _ = &*MISSING_DATA_TOTAL;
    let _ = &*CACHE_HITS_TOTAL;
    let _ = &*BLOCKS_FETCHED_TOTAL;
    let _ = &*UNINDEXED_RETRIES_TOTAL;
    let _ = &*NETWORK_FAILURES_TOTAL;

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or(());
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_exposes_snapshot_gauges() {
        let stats = Stats {
            latest_height: 1000,
            window_size: 9,
            elapsed_seconds: 90.0,
            total_transactions: 50,
            tx_per_second: 0.56,
            block_time_seconds: 10.0,
            seconds_since_last_block: 12.0,
        };
        update_stats(&stats);

        let text = String::from_utf8(gather()).unwrap();

        assert!(text.contains("chainpulse_latest_height 1000"));
        assert!(text.contains("chainpulse_tx_per_second 0.56"));
        assert!(text.contains("chainpulse_commits_total"));
    }

    #[test]
    fn counters_advance_by_delta_and_never_rewind() {
        let counter = Counter::new("chainpulse_test_delta", "test").unwrap();
        let last = AtomicU64::new(0);

        bump_by_delta(&counter, &last, 5);
        assert_eq!(counter.get(), 5.0);

        bump_by_delta(&counter, &last, 7);
        assert_eq!(counter.get(), 7.0);

        // A total that went backwards must not move the counter.
        bump_by_delta(&counter, &last, 3);
        assert_eq!(counter.get(), 7.0);
    }
}
