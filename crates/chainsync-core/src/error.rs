//! Error types for the chainsync pipeline.

use thiserror::Error;

/// Errors that can stop the sync engine.
///
/// Everything that reaches the engine as an `IndexerError` is terminal for the
/// process: transient transport failures are retried inside the chain client
/// and per-message decode failures never leave the decode step.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(
        "Conflicting block at height {height}: stored hash {stored_hash}, incoming hash {incoming_hash}"
    )]
    Conflict {
        height: u64,
        stored_hash: String,
        incoming_hash: String,
    },

    #[error("Reorg detected at block {height}: expected parent {expected}, got {actual}")]
    ReorgDetected {
        height: u64,
        expected: String,
        actual: String,
    },

    #[error("Out-of-order commit: expected height {expected}, got {actual}")]
    OutOfOrder { expected: u64, actual: u64 },

    #[error("Writer lock '{lock_id}' is already held by another indexer")]
    LockHeld { lock_id: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Indexer aborted: {reason}")]
    Aborted { reason: String },

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if the error means stored history disagrees with the node.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::ReorgDetected { .. })
    }

    /// Returns `true` if another process holds the writer lock.
    pub fn is_lock_held(&self) -> bool {
        matches!(self, Self::LockHeld { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_classification() {
        let err = IndexerError::Conflict {
            height: 10,
            stored_hash: "aa".into(),
            incoming_hash: "bb".into(),
        };
        assert!(err.is_conflict());
        assert!(!err.is_lock_held());
        assert!(err.to_string().contains("height 10"));

        let reorg = IndexerError::ReorgDetected {
            height: 11,
            expected: "aa".into(),
            actual: "cc".into(),
        };
        assert!(reorg.is_conflict());
    }

    #[test]
    fn lock_held_message_names_lock() {
        let err = IndexerError::LockHeld {
            lock_id: "chainsync-writer".into(),
        };
        assert!(err.is_lock_held());
        assert!(err.to_string().contains("chainsync-writer"));
    }
}
