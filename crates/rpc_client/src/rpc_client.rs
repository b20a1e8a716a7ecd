//! JSON-RPC client for Ontology-dialect nodes.

use crate::error::{Result, RpcError};
use crate::models::{BlockJson, RpcRequest, RpcResponse};
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

/// The RPC client used to poll a ledger node.
///
/// Cheap to share behind an `Arc`; the inner `reqwest::Client` pools
/// connections, so one instance serves all concurrent block fetches.
pub struct RpcClient {
    endpoint: Url,
    http_client: Client,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Creates a new RPC client with a per-request timeout.
    pub fn new(endpoint: Url, request_timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(http_client, endpoint))
    }

    /// Creates a new RPC client with an existing HTTP client.
    pub fn with_client(http_client: Client, endpoint: Url) -> Self {
        Self {
            endpoint,
            http_client,
            next_id: AtomicU64::new(1),
        }
    }

    /// Endpoint this client talks to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Sends one RPC call and extracts the `result` member.
    async fn rpc_call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        trace!(target: "chainpulse", id, method, "rpc call");

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let content = response.text().await?;
        let envelope: RpcResponse = serde_json::from_str(&content)
            .map_err(|e| RpcError::malformed(method, format!("invalid envelope: {}", e)))?;

        Self::take_result(envelope, method)
    }

    /// Maps an envelope to a result, surfacing the unindexed sentinel and
    /// node-reported errors as their own variants.
    fn take_result(envelope: RpcResponse, method: &str) -> Result<Value> {
        if envelope.is_unknown_block() {
            return Err(RpcError::UnknownBlock);
        }
        if envelope.error != 0 {
            return Err(RpcError::Node {
                code: envelope.error,
                message: envelope.desc.unwrap_or_else(|| "no description".to_string()),
            });
        }
        envelope
            .result
            .ok_or_else(|| RpcError::malformed(method, "missing result"))
    }

    /// Returns the height of the latest block the node has indexed.
    pub async fn get_block_height(&self) -> Result<u64> {
        let result = self.rpc_call("getblockheight", vec![]).await?;
        result
            .as_u64()
            .ok_or_else(|| RpcError::malformed("getblockheight", "result is not an unsigned integer"))
    }

    /// Returns the block at `height` in JSON form.
    pub async fn get_block_json(&self, height: u64) -> Result<BlockJson> {
        let result = self.rpc_call("getblockjson", vec![json!(height)]).await?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::malformed("getblockjson", e.to_string()))
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}
