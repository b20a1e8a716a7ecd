//! Height-indexed block cache with trailing eviction.

use crate::block::Block;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Bounded mapping from height to fetched block data.
///
/// Eviction is height-based, not recency-based: an entry is kept purely
/// because it is numerically close to the highest height seen so far. The
/// aggregators always need a contiguous trailing range, never a hot-set, so
/// every insert evicts everything below
/// `highest_inserted - window - retention_buffer`.
pub struct BlockCache {
    window: u64,
    retention_buffer: u64,
    inner: RwLock<Inner>,
}

struct Inner {
    by_height: BTreeMap<u64, Block>,
    highest_inserted: Option<u64>,
}

impl BlockCache {
    /// Creates a cache retaining `window + retention_buffer` trailing heights.
    pub fn new(window: u64, retention_buffer: u64) -> Self {
        Self {
            window,
            retention_buffer,
            inner: RwLock::new(Inner {
                by_height: BTreeMap::new(),
                highest_inserted: None,
            }),
        }
    }

    /// Looks up a block by height. Never triggers network I/O.
    pub fn get(&self, height: u64) -> Option<Block> {
        let inner = self.inner.read();
        inner.by_height.get(&height).copied()
    }

    /// Inserts a block, then evicts every entry below the retention cutoff.
    ///
    /// A block already below the cutoff is dropped instead of stored; it
    /// would be evicted by the next insert anyway.
    pub fn insert(&self, block: Block) {
        let mut inner = self.inner.write();
        let highest = inner
            .highest_inserted
            .map_or(block.height, |h| h.max(block.height));
        inner.highest_inserted = Some(highest);

        let cutoff = self.cutoff(highest);
        if block.height >= cutoff {
            inner.by_height.insert(block.height, block);
        }
        if cutoff > 0 {
            // split_off keeps >= cutoff, leaving the evicted range behind.
            inner.by_height = inner.by_height.split_off(&cutoff);
        }
    }

    /// Highest height ever inserted, if any.
    pub fn highest_inserted(&self) -> Option<u64> {
        self.inner.read().highest_inserted
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.inner.read().by_height.len()
    }

    /// Checks if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_height.is_empty()
    }

    /// Lowest height below which entries are evicted.
    fn cutoff(&self, highest: u64) -> u64 {
        highest.saturating_sub(self.window + self.retention_buffer)
    }
}

impl std::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCache")
            .field("len", &self.len())
            .field("window", &self.window)
            .field("retention_buffer", &self.retention_buffer)
            .field("highest_inserted", &self.highest_inserted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(height: u64) -> Block {
        Block::new(height, 1_000 + height, height % 7)
    }

    #[test]
    fn insert_then_get_round_trips() {
        let cache = BlockCache::new(10, 2);
        cache.insert(block(5));
        assert_eq!(cache.get(5), Some(block(5)));
        assert_eq!(cache.get(6), None);
        assert_eq!(cache.highest_inserted(), Some(5));
    }

    #[test]
    fn insert_evicts_below_cutoff() {
        let cache = BlockCache::new(3, 1);
        for h in 0..10 {
            cache.insert(block(h));
        }
        // cutoff = 9 - 3 - 1 = 5: heights 5..=9 retained.
        assert_eq!(cache.len(), 5);
        for h in 0..5 {
            assert_eq!(cache.get(h), None, "height {h} should be evicted");
        }
        for h in 5..10 {
            assert!(cache.get(h).is_some(), "height {h} should be retained");
        }
    }

    #[test]
    fn every_retained_entry_is_within_the_window() {
        let cache = BlockCache::new(5, 2);
        // Insert out of order with gaps.
        for h in [100, 3, 97, 50, 101, 99, 102] {
            cache.insert(block(h));
            let highest = cache.highest_inserted().unwrap();
            let cutoff = highest.saturating_sub(5 + 2);
            for kept in 0..=110 {
                if let Some(b) = cache.get(kept) {
                    assert!(
                        b.height >= cutoff,
                        "height {kept} retained below cutoff {cutoff}"
                    );
                }
            }
        }
    }

    #[test]
    fn put_below_cutoff_is_dropped() {
        let cache = BlockCache::new(3, 1);
        cache.insert(block(100));
        cache.insert(block(10));
        assert_eq!(cache.get(10), None);
        // The running highest is not lowered by the stale insert.
        assert_eq!(cache.highest_inserted(), Some(100));
        assert_eq!(cache.get(100), Some(block(100)));
    }

    #[test]
    fn lower_insert_does_not_shrink_retention() {
        let cache = BlockCache::new(10, 0);
        cache.insert(block(20));
        cache.insert(block(15));
        cache.insert(block(12));
        // cutoff stays 20 - 10 = 10; all three retained.
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(12), Some(block(12)));
    }

    #[test]
    fn overwrite_same_height_keeps_single_entry() {
        let cache = BlockCache::new(10, 2);
        cache.insert(block(7));
        cache.insert(Block::new(7, 999, 42));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(7), Some(Block::new(7, 999, 42)));
    }
}
