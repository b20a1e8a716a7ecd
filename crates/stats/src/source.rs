//! The seam between the aggregation engine and the network.

use crate::block::Block;
use async_trait::async_trait;
use chainpulse_rpc_client::{RpcClient, RpcError};
use thiserror::Error;

/// Failure classes a source can report.
///
/// The retry layer treats them differently: an unindexed height is waited
/// out indefinitely, a network failure is retried a bounded number of times.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The node has not produced or indexed this height yet.
    #[error("height {0} not indexed by the node yet")]
    Unindexed(u64),

    /// Transport, protocol, or node-internal failure.
    #[error("network failure: {0}")]
    Network(String),
}

/// Result type for source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Where the aggregators get chain data from.
///
/// Implemented for the real RPC client below; tests drive the engine with
/// scripted implementations instead.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Current chain height as reported by the node.
    async fn chain_height(&self) -> SourceResult<u64>;

    /// Block at the given height.
    async fn block_at(&self, height: u64) -> SourceResult<Block>;
}

#[async_trait]
impl BlockSource for RpcClient {
    async fn chain_height(&self) -> SourceResult<u64> {
        self.get_block_height()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))
    }

    async fn block_at(&self, height: u64) -> SourceResult<Block> {
        match self.get_block_json(height).await {
            Ok(json) => Ok(Block::from(&json)),
            Err(RpcError::UnknownBlock) => Err(SourceError::Unindexed(height)),
            Err(e) => Err(SourceError::Network(e.to_string())),
        }
    }
}
