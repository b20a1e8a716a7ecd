//! ChainPulse RPC Client Library
//!
//! This crate provides the JSON-RPC client used to poll Ontology-dialect
//! ledger nodes. The dialect differs from plain JSON-RPC 2.0 in one way that
//! matters here: the response envelope carries a `desc` field, and a node
//! that has not indexed a requested block yet answers with
//! `desc = "UNKNOWN BLOCK"` rather than a transport-level failure.

mod error;
pub mod models;
mod rpc_client;

pub use error::{Result, RpcError};
pub use rpc_client::RpcClient;

// Re-export commonly used types
pub use models::{BlockHeaderJson, BlockJson, RpcRequest, RpcResponse, UNKNOWN_BLOCK_DESC};
