//! The published statistics snapshot.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Rounds to two decimal places, the precision every published rate and
/// time field carries.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Current unix time in seconds, as a float.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// `numerator / denominator` rounded to two decimals, 0.0 when the
/// denominator is zero (a window of identical timestamps publishes zero
/// rates rather than NaN).
pub(crate) fn rate(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        round2(numerator / denominator)
    }
}

/// One committed statistics snapshot.
///
/// Produced atomically at the end of an aggregation cycle and never
/// partially visible to subscribers. Serialized field names are the wire
/// format downstream consumers already read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Frontier height the snapshot was computed at
    pub latest_height: u64,
    /// Blocks the window covers: the configured K for the fixed strategy,
    /// the walked count for the time strategy
    pub window_size: u64,
    /// Wall-clock span of the window, in seconds
    pub elapsed_seconds: f64,
    /// Transactions counted inside the window
    pub total_transactions: u64,
    /// Throughput over the window
    pub tx_per_second: f64,
    /// Average block interval over the window
    pub block_time_seconds: f64,
    /// Age of the frontier block when the cycle ran
    pub seconds_since_last_block: f64,
}

impl Stats {
    /// Multi-line human-readable form, the shape operators are used to
    /// seeing in the logs.
    pub fn summary(&self) -> String {
        format!(
            "Latest Block: {}\n\
             Window Size: {} blocks\n\
             Total time elapsed: {} seconds\n\
             Total Transactions: {}\n\
             Tx Per Second: {}\n\
             Block Time: {} seconds\n\
             Since Last Block: {} seconds",
            self.latest_height,
            self.window_size,
            self.elapsed_seconds,
            self.total_transactions,
            self.tx_per_second,
            self.block_time_seconds,
            self.seconds_since_last_block,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_truncates_to_two_decimals() {
        assert_eq!(round2(0.5555), 0.56);
        assert_eq!(round2(50.0 / 90.0), 0.56);
        assert_eq!(round2(10.0), 10.0);
        assert_eq!(round2(23.333333), 23.33);
    }

    #[test]
    fn rate_is_zero_for_zero_denominator() {
        assert_eq!(rate(100.0, 0.0), 0.0);
        assert_eq!(rate(12.0, 70.0), 0.17);
    }

    #[test]
    fn serializes_with_camel_case_wire_names() {
        let stats = Stats {
            latest_height: 1000,
            window_size: 9,
            elapsed_seconds: 90.0,
            total_transactions: 50,
            tx_per_second: 0.56,
            block_time_seconds: 10.0,
            seconds_since_last_block: 4.2,
        };
        let value = serde_json::to_value(stats).unwrap();
        assert_eq!(value["latestHeight"], 1000);
        assert_eq!(value["windowSize"], 9);
        assert_eq!(value["elapsedSeconds"], 90.0);
        assert_eq!(value["totalTransactions"], 50);
        assert_eq!(value["txPerSecond"], 0.56);
        assert_eq!(value["blockTimeSeconds"], 10.0);
        assert_eq!(value["secondsSinceLastBlock"], 4.2);
    }

    #[test]
    fn summary_names_every_field() {
        let stats = Stats {
            latest_height: 9000,
            window_size: 1000,
            elapsed_seconds: 180.0,
            total_transactions: 250,
            tx_per_second: 1.39,
            block_time_seconds: 0.18,
            seconds_since_last_block: 2.0,
        };
        let summary = stats.summary();
        assert!(summary.contains("Latest Block: 9000"));
        assert!(summary.contains("Tx Per Second: 1.39"));
        assert!(summary.contains("Block Time: 0.18 seconds"));
    }
}
