//! Shared snapshot state with a monotonic commit gate.

use crate::publish::Publisher;
use crate::stats::Stats;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Default)]
struct Inner {
    latest_height: u64,
    last_stats: Option<Stats>,
}

/// The single authority on what the service currently believes.
///
/// Cycles race: an older cycle can finish after a newer one when fan-outs
/// resolve at different speeds. [`try_commit`](Self::try_commit) arbitrates
/// by frontier height, discarding any snapshot older than the committed
/// one, and publishes inside the critical section so subscribers observe
/// commits in commit order.
pub struct StatsState {
    inner: Mutex<Inner>,
    commits: AtomicU64,
    stale_discards: AtomicU64,
}

impl StatsState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            commits: AtomicU64::new(0),
            stale_discards: AtomicU64::new(0),
        }
    }

    /// Height of the last committed snapshot, zero before the first.
    pub fn latest_height(&self) -> u64 {
        self.inner.lock().latest_height
    }

    /// The last committed snapshot, if any cycle has completed yet.
    pub fn last_stats(&self) -> Option<Stats> {
        self.inner.lock().last_stats
    }

    /// Whether at least one snapshot has been committed.
    pub fn is_ready(&self) -> bool {
        self.inner.lock().last_stats.is_some()
    }

    /// Commits `stats` unless a newer frontier has already been
    /// committed. A snapshot at the same height replaces the previous
    /// one. Returns whether the commit happened.
    pub fn try_commit(&self, stats: Stats, publisher: &dyn Publisher) -> bool {
        let mut inner = self.inner.lock();
        if stats.latest_height < inner.latest_height {
            drop(inner);
            self.stale_discards.fetch_add(1, Ordering::Relaxed);
            debug!(
                target: "chainpulse",
                height = stats.latest_height,
                "discarding stale snapshot"
            );
            return false;
        }
        inner.latest_height = stats.latest_height;
        inner.last_stats = Some(stats);
        publisher.publish(crate::publish::STAT_UPDATE_EVENT, &stats);
        drop(inner);
        self.commits.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Snapshots committed since startup.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Snapshots discarded for arriving behind a newer commit.
    pub fn stale_discards(&self) -> u64 {
        self.stale_discards.load(Ordering::Relaxed)
    }
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::{BroadcastPublisher, STAT_UPDATE_EVENT};

    fn stats_at(height: u64) -> Stats {
        Stats {
            latest_height: height,
            window_size: 9,
            elapsed_seconds: 90.0,
            total_transactions: 50,
            tx_per_second: 0.56,
            block_time_seconds: 10.0,
            seconds_since_last_block: 1.0,
        }
    }

    #[test]
    fn commits_advance_and_stale_snapshots_are_discarded() {
        let state = StatsState::new();
        let publisher = BroadcastPublisher::new(8);

        assert!(state.try_commit(stats_at(5), &publisher));
        assert!(!state.try_commit(stats_at(3), &publisher));
        assert!(state.try_commit(stats_at(7), &publisher));

        assert_eq!(state.latest_height(), 7);
        assert_eq!(state.commits(), 2);
        assert_eq!(state.stale_discards(), 1);
    }

    #[test]
    fn equal_height_snapshot_replaces_the_previous_one() {
        let state = StatsState::new();
        let publisher = BroadcastPublisher::new(8);
        let mut refreshed = stats_at(5);
        refreshed.total_transactions = 99;

        assert!(state.try_commit(stats_at(5), &publisher));
        assert!(state.try_commit(refreshed, &publisher));

        assert_eq!(state.last_stats().map(|s| s.total_transactions), Some(99));
        assert_eq!(state.commits(), 2);
    }

    #[test]
    fn starts_empty_and_becomes_ready_on_first_commit() {
        let state = StatsState::new();
        let publisher = BroadcastPublisher::new(8);

        assert!(!state.is_ready());
        assert_eq!(state.latest_height(), 0);
        assert!(state.last_stats().is_none());

        state.try_commit(stats_at(1), &publisher);

        assert!(state.is_ready());
    }

    #[test]
    fn committed_snapshots_reach_subscribers_in_commit_order() {
        let state = StatsState::new();
        let publisher = BroadcastPublisher::new(8);
        let mut receiver = publisher.subscribe();

        state.try_commit(stats_at(5), &publisher);
        state.try_commit(stats_at(3), &publisher);
        state.try_commit(stats_at(7), &publisher);

        let first = receiver.try_recv().unwrap();
        let second = receiver.try_recv().unwrap();
        assert_eq!(first.event, STAT_UPDATE_EVENT);
        assert_eq!(first.stats.latest_height, 5);
        assert_eq!(second.stats.latest_height, 7);
        assert!(receiver.try_recv().is_err());
    }
}
