//! ChainPulse Aggregation Engine
//!
//! This crate turns an unbounded, unreliable stream of discretely-numbered
//! blocks into consistent, monotonically-advancing throughput statistics.
//! Two strategies run side by side over the same cache, source, and retry
//! machinery:
//!
//! - [`FixedWindowAggregator`] covers exactly the last K blocks per cycle,
//!   fetched through a bounded parallel fan-out.
//! - [`TimeWindowAggregator`] walks backward one block at a time until a
//!   wall-clock budget is spanned.
//!
//! Committed snapshots flow through [`StatsState`], which guarantees the
//! published stream never regresses to an earlier chain height even when
//! overlapping cycles resolve out of order.

pub mod block;
pub mod cache;
pub mod collector;
pub mod fetch;
pub mod fixed_window;
pub mod publish;
pub mod source;
pub mod state;
pub mod stats;
pub mod time_window;

#[cfg(test)]
mod testutil;

pub use block::Block;
pub use cache::BlockCache;
pub use collector::{Collector, CycleError, CycleOutcome};
pub use fetch::{BlockFetcher, FetchCounters, RetryPolicy};
pub use fixed_window::FixedWindowAggregator;
pub use publish::{
    BroadcastPublisher, LogPublisher, MultiPublisher, Publisher, StatsEvent, STAT_UPDATE_EVENT,
};
pub use source::{BlockSource, SourceError, SourceResult};
pub use state::StatsState;
pub use stats::{round2, unix_now, Stats};
pub use time_window::TimeWindowAggregator;
