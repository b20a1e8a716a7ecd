//! Wire models for the Ontology JSON-RPC dialect.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `desc` value a node returns for a height it has not indexed yet.
pub const UNKNOWN_BLOCK_DESC: &str = "UNKNOWN BLOCK";

/// JSON-RPC request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Request ID
    pub id: u64,

    /// JSON-RPC version
    #[serde(rename = "jsonrpc")]
    pub json_rpc: String,

    /// Method name
    pub method: String,

    /// Method parameters
    pub params: Vec<Value>,
}

impl RpcRequest {
    /// Creates a new RPC request
    pub fn new(id: u64, method: &str, params: Vec<Value>) -> Self {
        Self {
            id,
            json_rpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC response envelope, Ontology dialect.
///
/// `error` is a numeric code (0 on success) and `desc` a human-readable
/// status string, alongside the standard `result` member.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    /// Request ID echoed back (nodes send numbers or strings)
    #[serde(default)]
    pub id: Option<Value>,

    /// JSON-RPC version
    #[serde(rename = "jsonrpc", default)]
    pub json_rpc: Option<String>,

    /// Numeric error code, 0 on success
    #[serde(default)]
    pub error: i64,

    /// Status description, e.g. "SUCCESS" or "UNKNOWN BLOCK"
    #[serde(default)]
    pub desc: Option<String>,

    /// Method result
    #[serde(default)]
    pub result: Option<Value>,
}

impl RpcResponse {
    /// True when the envelope carries the unindexed-block sentinel.
    pub fn is_unknown_block(&self) -> bool {
        self.desc.as_deref() == Some(UNKNOWN_BLOCK_DESC)
    }
}

/// Block payload as returned by `getblockjson`.
///
/// Only the members the aggregation reads are modeled; the transactions are
/// kept as raw values because only their count matters downstream.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockJson {
    /// Block hash
    #[serde(rename = "Hash", default)]
    pub hash: Option<String>,

    /// Block header
    #[serde(rename = "Header")]
    pub header: BlockHeaderJson,

    /// Transactions included in the block
    #[serde(rename = "Transactions", default)]
    pub transactions: Vec<Value>,
}

impl BlockJson {
    /// Number of transactions in the block.
    pub fn tx_count(&self) -> u64 {
        self.transactions.len() as u64
    }
}

/// Block header payload
#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeaderJson {
    /// Header version
    #[serde(rename = "Version", default)]
    pub version: u32,

    /// Block height
    #[serde(rename = "Height")]
    pub height: u64,

    /// Unix timestamp in seconds
    #[serde(rename = "Timestamp")]
    pub timestamp: u64,

    /// Hash of the previous block
    #[serde(rename = "PrevBlockHash", default)]
    pub prev_block_hash: Option<String>,

    /// Header hash
    #[serde(rename = "Hash", default)]
    pub hash: Option<String>,
}
