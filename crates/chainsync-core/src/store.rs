//! The persistence seam: atomic per-block commits plus the read helpers used
//! by the operator CLI and the enrichment pass.
//!
//! Implementations live in `chainsync-storage` (`MemoryStorage`,
//! `SqliteStorage`, `PostgresStorage`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cursor::SyncCursor;
use crate::error::IndexerError;
use crate::record::{IndexedBlock, TransactionRecord};

/// Result of a successful [`BlockStore::commit_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The block was written and the cursor advanced.
    Committed,
    /// An identical block was already stored; nothing was written.
    AlreadyCommitted,
}

/// Status column of the message ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Decoded,
    Unrecognized,
    Unparsed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decoded => "decoded",
            Self::Unrecognized => "unrecognized",
            Self::Unparsed => "unparsed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decoded" => Some(Self::Decoded),
            "unrecognized" => Some(Self::Unrecognized),
            "unparsed" => Some(Self::Unparsed),
            _ => None,
        }
    }
}

/// A row of the message ledger. Raw bytes are present for every message that
/// did not produce a typed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub tx_hash: String,
    pub block_height: u64,
    pub msg_index: u32,
    pub type_url: String,
    pub module: Option<String>,
    pub status: MessageStatus,
    pub raw: Option<Vec<u8>>,
    pub error: Option<String>,
}

/// A stored program submission, as needed by read-time enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProgram {
    pub tx_hash: String,
    pub msg_index: u32,
    pub block_height: u64,
    pub sender: String,
    pub bytecode: Vec<u8>,
}

/// A stored contract execution, as needed by the classification pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredExecution {
    pub tx_hash: String,
    pub msg_index: u32,
    pub msg: serde_json::Value,
    pub program_type: Option<String>,
}

/// Row counts and cursor, for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub blocks: u64,
    pub transactions: u64,
    pub messages: u64,
    pub unrecognized: u64,
    pub unparsed: u64,
    pub cursor: Option<SyncCursor>,
}

/// Durable storage for indexed blocks and the sync cursor.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Load the sync cursor (`None` on a fresh store).
    async fn load_cursor(&self) -> Result<Option<SyncCursor>, IndexerError>;

    /// Write one block (rows, messages, domain records, cursor) atomically.
    ///
    /// Re-committing identical content is a no-op success; different content
    /// at a stored height is [`IndexerError::Conflict`].
    async fn commit_block(&self, block: &IndexedBlock) -> Result<CommitOutcome, IndexerError>;

    /// Hash of a stored block.
    async fn block_hash(&self, height: u64) -> Result<Option<String>, IndexerError>;

    async fn stats(&self) -> Result<StoreStats, IndexerError>;

    /// Transactions of one block, in block order.
    async fn transactions_at(&self, height: u64) -> Result<Vec<TransactionRecord>, IndexerError>;

    /// Ledger rows for one transaction, in message order.
    async fn messages_for_tx(&self, tx_hash: &str) -> Result<Vec<StoredMessage>, IndexerError>;

    /// Most recent program submissions first.
    async fn program_submissions(&self, limit: usize) -> Result<Vec<StoredProgram>, IndexerError>;

    /// Contract executions in chain order, optionally only those without a
    /// derived program type.
    async fn contract_executions(
        &self,
        unclassified_only: bool,
        limit: usize,
    ) -> Result<Vec<StoredExecution>, IndexerError>;

    /// Write the derived program type of one contract execution.
    async fn set_program_type(
        &self,
        tx_hash: &str,
        msg_index: u32,
        program_type: &str,
    ) -> Result<(), IndexerError>;
}

/// Decide what to do with `block` given what is already stored.
///
/// `existing` is the `(hash, content_digest)` stored at the block's height.
/// Returns `Ok(Some(AlreadyCommitted))` for an identical re-commit,
/// `Ok(None)` when the block should be written, and an error for divergent
/// content or a height that does not follow the cursor.
pub fn precheck_commit(
    block: &IndexedBlock,
    existing: Option<(String, String)>,
    cursor: Option<&SyncCursor>,
) -> Result<Option<CommitOutcome>, IndexerError> {
    let height = block.height();
    if let Some((stored_hash, stored_digest)) = existing {
        if stored_digest == block.block.content_digest {
            return Ok(Some(CommitOutcome::AlreadyCommitted));
        }
        return Err(IndexerError::Conflict {
            height,
            stored_hash,
            incoming_hash: block.block.hash.clone(),
        });
    }
    if let Some(cursor) = cursor {
        if height != cursor.next_height() {
            return Err(IndexerError::OutOfOrder {
                expected: cursor.next_height(),
                actual: height,
            });
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::BlockRecord;
    use chrono::Utc;

    fn block(height: u64, hash: &str, digest: &str) -> IndexedBlock {
        IndexedBlock {
            block: BlockRecord {
                height,
                hash: hash.into(),
                parent_hash: "p".into(),
                timestamp: Utc::now(),
                proposer: "v".into(),
                tx_count: 0,
                gas_used: 0,
                gas_wanted: 0,
                content_digest: digest.into(),
            },
            transactions: vec![],
            messages: vec![],
        }
    }

    #[test]
    fn fresh_store_accepts_any_first_height() {
        let b = block(10, "a", "d1");
        assert_eq!(precheck_commit(&b, None, None).unwrap(), None);
    }

    #[test]
    fn identical_recommit_is_noop() {
        let b = block(10, "a", "d1");
        let existing = Some(("a".to_string(), "d1".to_string()));
        let cursor = SyncCursor::new(12, "c");
        assert_eq!(
            precheck_commit(&b, existing, Some(&cursor)).unwrap(),
            Some(CommitOutcome::AlreadyCommitted)
        );
    }

    #[test]
    fn divergent_recommit_conflicts() {
        let b = block(10, "b", "d2");
        let existing = Some(("a".to_string(), "d1".to_string()));
        let err = precheck_commit(&b, existing, None).unwrap_err();
        assert!(matches!(err, IndexerError::Conflict { height: 10, .. }));
    }

    #[test]
    fn gap_is_out_of_order() {
        let b = block(12, "a", "d");
        let cursor = SyncCursor::new(10, "x");
        let err = precheck_commit(&b, None, Some(&cursor)).unwrap_err();
        assert!(matches!(err, IndexerError::OutOfOrder { expected: 11, actual: 12 }));
    }

    #[test]
    fn message_status_strings() {
        for s in [MessageStatus::Decoded, MessageStatus::Unrecognized, MessageStatus::Unparsed] {
            assert_eq!(MessageStatus::parse(s.as_str()), Some(s));
        }
    }
}
