//! Counters kept by the sync engine.

use serde::Serialize;

use chainsync_core::record::IndexedBlock;
use chainsync_core::store::CommitOutcome;

/// Metrics snapshot for the sync engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncMetrics {
    pub blocks_committed: u64,
    /// Re-commits of identical content (no rows written).
    pub blocks_already_committed: u64,
    pub transactions: u64,
    pub messages: u64,
    pub unrecognized_messages: u64,
    pub unparsed_messages: u64,
    pub notifications_dropped: u64,
    pub last_height: Option<u64>,
}

impl SyncMetrics {
    pub fn record(&mut self, block: &IndexedBlock, outcome: CommitOutcome) {
        self.last_height = Some(block.height());
        match outcome {
            CommitOutcome::AlreadyCommitted => self.blocks_already_committed += 1,
            CommitOutcome::Committed => {
                self.blocks_committed += 1;
                self.transactions += block.transactions.len() as u64;
                self.messages += block.messages.len() as u64;
                self.unrecognized_messages += block.unrecognized_count() as u64;
                self.unparsed_messages += block.unparsed_count() as u64;
            }
        }
    }
}
