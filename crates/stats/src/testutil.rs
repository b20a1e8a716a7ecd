//! Scripted source plumbing shared by the unit tests.

use crate::block::Block;
use crate::cache::BlockCache;
use crate::fetch::{BlockFetcher, RetryPolicy};
use crate::source::{BlockSource, SourceError, SourceResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Replays scripted responses, one per call, failing loudly on any
/// request the test did not script.
pub struct ScriptedSource {
    heights: Mutex<VecDeque<SourceResult<u64>>>,
    responses: Mutex<HashMap<u64, VecDeque<SourceResult<Block>>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            heights: Mutex::new(VecDeque::new()),
            responses: Mutex::new(HashMap::new()),
        }
    }

    pub fn script(&self, height: u64, response: SourceResult<Block>) {
        self.responses
            .lock()
            .entry(height)
            .or_default()
            .push_back(response);
    }

    pub fn script_height(&self, response: SourceResult<u64>) {
        self.heights.lock().push_back(response);
    }
}

#[async_trait]
impl BlockSource for ScriptedSource {
    async fn chain_height(&self) -> SourceResult<u64> {
        self.heights
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::Network("no chain height scripted".into())))
    }

    async fn block_at(&self, height: u64) -> SourceResult<Block> {
        self.responses
            .lock()
            .get_mut(&height)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(SourceError::Network(format!("unexpected fetch of {height}"))))
    }
}

/// Millisecond-scale retry delays so retry paths stay fast under test.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        unindexed_delay: Duration::from_millis(1),
        network_delay: Duration::from_millis(1),
        max_network_attempts: 3,
    }
}

/// A fetcher over `source` with a roomy cache and [`fast_policy`] delays.
pub fn fetcher_over(source: Arc<ScriptedSource>) -> Arc<BlockFetcher> {
    let cache = Arc::new(BlockCache::new(1000, 5));
    Arc::new(BlockFetcher::new(source, cache, fast_policy()))
}
