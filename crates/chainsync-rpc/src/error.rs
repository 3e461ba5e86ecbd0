//! Transport-level error types.

use thiserror::Error;

use chainsync_core::error::IndexerError;

use crate::request::JsonRpcError;

/// Errors that can occur while talking to the node.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, reset, non-2xx status).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The node never answered within the startup readiness window.
    #[error("Node not ready after {waited_ms}ms: {reason}")]
    NotReady { waited_ms: u64, reason: String },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if the error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::WebSocket(_) | Self::Timeout { .. }
        )
    }
}

impl From<TransportError> for IndexerError {
    fn from(e: TransportError) -> Self {
        IndexerError::Rpc(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(TransportError::Http("reset".into()).is_retryable());
        assert!(TransportError::Timeout { ms: 10 }.is_retryable());
        assert!(!TransportError::Rpc(JsonRpcError {
            code: -32601,
            message: "method not found".into(),
            data: None,
        })
        .is_retryable());
        assert!(!TransportError::Other("x".into()).is_retryable());
    }

    #[test]
    fn converts_into_indexer_error() {
        let err: IndexerError = TransportError::Timeout { ms: 500 }.into();
        assert!(matches!(err, IndexerError::Rpc(ref m) if m.contains("500ms")));
    }
}
