//! Sync cursor: the durable position of the indexer in the chain.

use serde::{Deserialize, Serialize};

/// The last block that was fully committed.
///
/// Stored as a singleton row and written in the same storage transaction as
/// the block it points at, so the cursor never runs ahead of the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Last committed block height.
    pub last_height: u64,
    /// Hash of the last committed block (used for the parent-hash check).
    pub last_hash: String,
}

impl SyncCursor {
    pub fn new(last_height: u64, last_hash: impl Into<String>) -> Self {
        Self {
            last_height,
            last_hash: last_hash.into(),
        }
    }

    /// Advance the cursor to a newly committed block.
    pub fn advance(&mut self, height: u64, hash: impl Into<String>) {
        self.last_height = height;
        self.last_hash = hash.into();
    }

    /// Returns the next height to fetch (cursor + 1).
    pub fn next_height(&self) -> u64 {
        self.last_height + 1
    }

    /// Next height to fetch given an optional cursor and the configured start.
    pub fn resume_height(cursor: Option<&SyncCursor>, start_height: u64) -> u64 {
        cursor.map_or(start_height, SyncCursor::next_height)
    }
}
