//! Minimal block representation used by the aggregators.

use chainpulse_rpc_client::BlockJson;

/// The slice of a block the aggregation cares about.
///
/// A given height maps to exactly one `Block` for the lifetime of the
/// process (ledger finality assumption), so values are freely copied and
/// cached without invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Block height
    pub height: u64,
    /// Unix timestamp in seconds
    pub timestamp: u64,
    /// Number of transactions in the block
    pub tx_count: u64,
}

impl Block {
    /// Creates a new block
    pub fn new(height: u64, timestamp: u64, tx_count: u64) -> Self {
        Self {
            height,
            timestamp,
            tx_count,
        }
    }
}

impl From<&BlockJson> for Block {
    fn from(json: &BlockJson) -> Self {
        Self {
            height: json.header.height,
            timestamp: json.header.timestamp,
            tx_count: json.tx_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_from_wire_block() {
        let wire: BlockJson = serde_json::from_value(json!({
            "Header": { "Height": 42, "Timestamp": 1_700_000_000u64 },
            "Transactions": [{}, {}]
        }))
        .unwrap();
        let block = Block::from(&wire);
        assert_eq!(block, Block::new(42, 1_700_000_000, 2));
    }
}
