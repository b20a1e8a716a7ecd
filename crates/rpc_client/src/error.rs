//! Error types for the RPC client.

use thiserror::Error;

/// Result type for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;

/// Errors returned by [`crate::RpcClient`].
///
/// `UnknownBlock` is deliberately separate from the catch-all variants:
/// callers retry it indefinitely while everything else is bounded.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The node answered but has not indexed the requested block yet.
    #[error("block not indexed by the node yet")]
    UnknownBlock,

    /// HTTP-level failure: connect, timeout, non-success status, body read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node reported a non-zero error code.
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    /// The envelope arrived but its contents were not what the method
    /// promised.
    #[error("malformed {method} response: {reason}")]
    Malformed { method: String, reason: String },
}

impl RpcError {
    pub(crate) fn malformed(method: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the failure is the unindexed-block sentinel.
    pub fn is_unknown_block(&self) -> bool {
        matches!(self, Self::UnknownBlock)
    }
}
