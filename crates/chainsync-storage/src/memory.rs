//! In-memory storage backend.
//!
//! Keeps every table in RAM behind one mutex. A commit is applied to a
//! staged copy of the state and swapped in only once every row is in place,
//! which gives tests the same all-or-nothing behaviour as a SQL transaction.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chainsync_core::cursor::SyncCursor;
use chainsync_core::error::IndexerError;
use chainsync_core::lock::{MemoryWriterLock, WriterLock};
use chainsync_core::record::{
    BlockRecord, DomainRecord, IndexedBlock, MessageBody, MessageRecord, TransactionRecord,
};
use chainsync_core::store::{
    precheck_commit, BlockStore, CommitOutcome, MessageStatus, StoreStats, StoredExecution,
    StoredMessage, StoredProgram,
};

use crate::ledger::stored_message;

#[derive(Default, Clone)]
struct State {
    blocks: BTreeMap<u64, BlockRecord>,
    transactions: BTreeMap<u64, Vec<TransactionRecord>>,
    /// Keyed by `(tx_hash, msg_index)`.
    messages: BTreeMap<(String, u32), MessageRecord>,
    /// Derived program types written by the classification pass.
    program_types: HashMap<(String, u32), String>,
    cursor: Option<SyncCursor>,
}

/// In-memory block store.
///
/// All data is lost when the last handle is dropped.
#[derive(Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
    fail_next_commit: Arc<AtomicBool>,
    lock: MemoryWriterLock,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A second handle over the same data and lock table, behaving like a
    /// separate indexer process pointed at the same database.
    pub fn contender(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            fail_next_commit: Arc::clone(&self.fail_next_commit),
            lock: self.lock.handle(),
        }
    }

    /// Make the next commit fail after its rows are staged but before they
    /// become visible.
    pub fn inject_commit_fault(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if any handle holds the writer lock `lock_id`.
    pub fn lock_held(&self, lock_id: &str) -> bool {
        self.lock.is_held(lock_id)
    }

    /// Every decoded domain record, in `(height, tx_hash, msg_index)` order.
    pub fn domain_records(&self) -> Vec<DomainRecord> {
        let Ok(state) = self.state() else {
            return Vec::new();
        };
        let mut msgs: Vec<&MessageRecord> = state.messages.values().collect();
        msgs.sort_by(|a, b| {
            (a.block_height, &a.tx_hash, a.msg_index).cmp(&(b.block_height, &b.tx_hash, b.msg_index))
        });
        msgs.into_iter()
            .filter_map(|m| m.body.record().cloned())
            .collect()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, IndexerError> {
        self.state
            .lock()
            .map_err(|_| IndexerError::Storage("memory store poisoned".into()))
    }
}

#[async_trait]
impl BlockStore for MemoryStorage {
    async fn load_cursor(&self) -> Result<Option<SyncCursor>, IndexerError> {
        Ok(self.state()?.cursor.clone())
    }

    async fn commit_block(&self, block: &IndexedBlock) -> Result<CommitOutcome, IndexerError> {
        let mut state = self.state()?;
        let height = block.height();

        let existing = state
            .blocks
            .get(&height)
            .map(|b| (b.hash.clone(), b.content_digest.clone()));
        if let Some(outcome) = precheck_commit(block, existing, state.cursor.as_ref())? {
            return Ok(outcome);
        }
        if state.blocks.values().any(|b| b.hash == block.block.hash) {
            return Err(IndexerError::Storage(format!(
                "duplicate block hash {}",
                block.block.hash
            )));
        }

        let mut staged = state.clone();
        staged.blocks.insert(height, block.block.clone());
        staged
            .transactions
            .insert(height, block.transactions.clone());
        for msg in &block.messages {
            staged
                .messages
                .insert((msg.tx_hash.clone(), msg.msg_index), msg.clone());
        }

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(IndexerError::Storage(format!(
                "injected fault while committing block {height}"
            )));
        }

        staged.cursor = Some(SyncCursor::new(height, block.block.hash.clone()));
        *state = staged;
        tracing::debug!(height, txs = block.transactions.len(), "block committed");
        Ok(CommitOutcome::Committed)
    }

    async fn block_hash(&self, height: u64) -> Result<Option<String>, IndexerError> {
        Ok(self.state()?.blocks.get(&height).map(|b| b.hash.clone()))
    }

    async fn stats(&self) -> Result<StoreStats, IndexerError> {
        let state = self.state()?;
        let ledger: Vec<StoredMessage> = state.messages.values().map(stored_message).collect();
        let count = |status| ledger.iter().filter(|m| m.status == status).count() as u64;
        Ok(StoreStats {
            blocks: state.blocks.len() as u64,
            transactions: state.transactions.values().map(|t| t.len() as u64).sum(),
            messages: ledger.len() as u64,
            unrecognized: count(MessageStatus::Unrecognized),
            unparsed: count(MessageStatus::Unparsed),
            cursor: state.cursor.clone(),
        })
    }

    async fn transactions_at(&self, height: u64) -> Result<Vec<TransactionRecord>, IndexerError> {
        Ok(self
            .state()?
            .transactions
            .get(&height)
            .cloned()
            .unwrap_or_default())
    }

    async fn messages_for_tx(&self, tx_hash: &str) -> Result<Vec<StoredMessage>, IndexerError> {
        let state = self.state()?;
        Ok(state
            .messages
            .range((tx_hash.to_string(), 0)..=(tx_hash.to_string(), u32::MAX))
            .map(|(_, m)| stored_message(m))
            .collect())
    }

    async fn program_submissions(&self, limit: usize) -> Result<Vec<StoredProgram>, IndexerError> {
        let state = self.state()?;
        let mut programs: Vec<StoredProgram> = state
            .messages
            .values()
            .filter_map(|m| match &m.body {
                MessageBody::Decoded {
                    record: DomainRecord::ProgramSubmission(p),
                    ..
                } => Some(StoredProgram {
                    tx_hash: m.tx_hash.clone(),
                    msg_index: m.msg_index,
                    block_height: m.block_height,
                    sender: p.sender.clone(),
                    bytecode: p.bytecode.clone(),
                }),
                _ => None,
            })
            .collect();
        programs.sort_by(|a, b| {
            b.block_height
                .cmp(&a.block_height)
                .then_with(|| (&a.tx_hash, a.msg_index).cmp(&(&b.tx_hash, b.msg_index)))
        });
        programs.truncate(limit);
        Ok(programs)
    }

    async fn contract_executions(
        &self,
        unclassified_only: bool,
        limit: usize,
    ) -> Result<Vec<StoredExecution>, IndexerError> {
        let state = self.state()?;
        let mut rows: Vec<(u64, StoredExecution)> = state
            .messages
            .values()
            .filter_map(|m| match &m.body {
                MessageBody::Decoded {
                    record: DomainRecord::ContractExecution(c),
                    ..
                } => {
                    let key = (m.tx_hash.clone(), m.msg_index);
                    Some((
                        m.block_height,
                        StoredExecution {
                            tx_hash: m.tx_hash.clone(),
                            msg_index: m.msg_index,
                            msg: c.msg.clone(),
                            program_type: state.program_types.get(&key).cloned(),
                        },
                    ))
                }
                _ => None,
            })
            .filter(|(_, e)| !unclassified_only || e.program_type.is_none())
            .collect();
        rows.sort_by(|(ha, a), (hb, b)| {
            (ha, &a.tx_hash, a.msg_index).cmp(&(hb, &b.tx_hash, b.msg_index))
        });
        Ok(rows.into_iter().take(limit).map(|(_, e)| e).collect())
    }

    async fn set_program_type(
        &self,
        tx_hash: &str,
        msg_index: u32,
        program_type: &str,
    ) -> Result<(), IndexerError> {
        let mut state = self.state()?;
        let key = (tx_hash.to_string(), msg_index);
        if !state.messages.contains_key(&key) {
            return Err(IndexerError::Storage(format!(
                "no contract execution at {tx_hash}/{msg_index}"
            )));
        }
        state.program_types.insert(key, program_type.to_string());
        Ok(())
    }
}

#[async_trait]
impl WriterLock for MemoryStorage {
    async fn acquire(&self, lock_id: &str) -> Result<(), IndexerError> {
        self.lock.acquire(lock_id).await
    }

    async fn release(&self, lock_id: &str) -> Result<(), IndexerError> {
        self.lock.release(lock_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsync_core::record::{ContractExecution, TxStatus};
    use chrono::Utc;

    fn indexed(height: u64, hash: &str, digest: &str) -> IndexedBlock {
        let tx_hash = format!("0xtx{height}");
        IndexedBlock {
            block: BlockRecord {
                height,
                hash: hash.into(),
                parent_hash: format!("parent{height}"),
                timestamp: Utc::now(),
                proposer: "val".into(),
                tx_count: 1,
                gas_used: 10,
                gas_wanted: 20,
                content_digest: digest.into(),
            },
            transactions: vec![TransactionRecord {
                hash: tx_hash.clone(),
                block_height: height,
                tx_index: 0,
                primary_type: "/cosmwasm.wasm.v1.MsgExecuteContract".into(),
                message_types: vec!["/cosmwasm.wasm.v1.MsgExecuteContract".into()],
                status: TxStatus::Success,
                gas_used: 10,
                gas_wanted: 20,
                memo: String::new(),
                error_log: None,
                decode_note: None,
            }],
            messages: vec![MessageRecord {
                tx_hash,
                block_height: height,
                msg_index: 0,
                type_url: "/cosmwasm.wasm.v1.MsgExecuteContract".into(),
                body: MessageBody::Decoded {
                    module: "wasm".into(),
                    record: DomainRecord::ContractExecution(ContractExecution {
                        sender: "s".into(),
                        contract: "c".into(),
                        msg: serde_json::json!({"swap": {}}),
                        funds: String::new(),
                        program_type: None,
                    }),
                },
            }],
        }
    }

    #[tokio::test]
    async fn commit_advances_cursor() {
        let store = MemoryStorage::new();
        assert_eq!(store.load_cursor().await.unwrap(), None);
        let outcome = store.commit_block(&indexed(5, "h5", "d5")).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);
        assert_eq!(
            store.load_cursor().await.unwrap(),
            Some(SyncCursor::new(5, "h5"))
        );
        assert_eq!(store.transactions_at(5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn injected_fault_leaves_nothing_behind() {
        let store = MemoryStorage::new();
        store.commit_block(&indexed(1, "h1", "d1")).await.unwrap();
        store.inject_commit_fault();
        assert!(store.commit_block(&indexed(2, "h2", "d2")).await.is_err());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.blocks, 1);
        assert_eq!(stats.transactions, 1);
        assert_eq!(stats.cursor, Some(SyncCursor::new(1, "h1")));
        assert!(store.messages_for_tx("0xtx2").await.unwrap().is_empty());

        // The fault is one-shot.
        store.commit_block(&indexed(2, "h2", "d2")).await.unwrap();
    }

    #[tokio::test]
    async fn classification_round() {
        let store = MemoryStorage::new();
        store.commit_block(&indexed(1, "h1", "d1")).await.unwrap();
        let pending = store.contract_executions(true, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        store
            .set_program_type(&pending[0].tx_hash, pending[0].msg_index, "swap")
            .await
            .unwrap();
        assert!(store.contract_executions(true, 10).await.unwrap().is_empty());
        let all = store.contract_executions(false, 10).await.unwrap();
        assert_eq!(all[0].program_type.as_deref(), Some("swap"));
    }

    #[tokio::test]
    async fn contender_shares_lock_table() {
        let a = MemoryStorage::new();
        let b = a.contender();
        a.acquire("w").await.unwrap();
        assert!(b.acquire("w").await.unwrap_err().is_lock_held());
        a.release("w").await.unwrap();
        b.acquire("w").await.unwrap();
        assert!(a.lock_held("w"));
    }
}
