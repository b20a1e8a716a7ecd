//! Outbound delivery of committed snapshots.

use crate::stats::Stats;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Event name attached to every committed snapshot.
pub const STAT_UPDATE_EVENT: &str = "StatUpdate";

/// Sink for committed snapshots.
///
/// Implementations must be cheap and non-blocking: `publish` runs inside
/// the commit critical section so that delivery order matches commit
/// order.
pub trait Publisher: Send + Sync {
    fn publish(&self, event: &str, stats: &Stats);
}

/// A committed snapshot tagged with its event name.
#[derive(Debug, Clone)]
pub struct StatsEvent {
    pub event: String,
    pub stats: Stats,
}

/// Fans snapshots out to in-process subscribers over a broadcast
/// channel. Slow subscribers lag and lose old snapshots rather than
/// holding up commits.
pub struct BroadcastPublisher {
    sender: broadcast::Sender<StatsEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatsEvent> {
        self.sender.subscribe()
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&self, event: &str, stats: &Stats) {
        let _ = self.sender.send(StatsEvent {
            event: event.to_string(),
            stats: *stats,
        });
    }
}

/// Writes each snapshot to the log, with the full breakdown at debug.
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(&self, event: &str, stats: &Stats) {
        info!(
            target: "chainpulse",
            event,
            height = stats.latest_height,
            tx_per_second = stats.tx_per_second,
            block_time_seconds = stats.block_time_seconds,
            "stats updated"
        );
        debug!(target: "chainpulse", "{}", stats.summary());
    }
}

/// Delivers every snapshot to each configured sink in order.
pub struct MultiPublisher {
    sinks: Vec<Arc<dyn Publisher>>,
}

impl MultiPublisher {
    pub fn new(sinks: Vec<Arc<dyn Publisher>>) -> Self {
        Self { sinks }
    }
}

impl Publisher for MultiPublisher {
    fn publish(&self, event: &str, stats: &Stats) {
        for sink in &self.sinks {
            sink.publish(event, stats);
        }
    }
}
