//! SQLite storage backend for ChainSync.
//!
//! Persists blocks, transactions, the message ledger, typed domain tables and
//! the sync cursor to a single SQLite file. Uses `sqlx` with WAL mode for
//! concurrent read performance.
//!
//! The writer lock is a lease row (`writer_leases`) with an expiry that the
//! engine refreshes on a heartbeat; a crashed writer's lease simply runs out.
//! Every commit made while holding a lease re-checks it inside the same
//! transaction, so a writer whose lease was taken over cannot write.
//!
//! # Usage
//! ```rust,no_run
//! use chainsync_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./chainsync.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use tracing::debug;

use chainsync_core::cursor::SyncCursor;
use chainsync_core::error::IndexerError;
use chainsync_core::lock::WriterLock;
use chainsync_core::record::{IndexedBlock, TransactionRecord, TxStatus};
use chainsync_core::store::{
    precheck_commit, BlockStore, CommitOutcome, MessageStatus, StoreStats, StoredExecution,
    StoredMessage, StoredProgram,
};

use crate::rows::{self, Dialect, SqlValue};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(30);

/// Extends a live lease owned by this handle; touches nothing once it expired.
const FENCE_LEASE: &str = "UPDATE writer_leases SET expires_at = ?
     WHERE lock_id = ? AND owner = ? AND expires_at >= ?";

/// SQLite-backed block store and lease-based writer lock.
pub struct SqliteStorage {
    pool: SqlitePool,
    /// Identifies this process in `writer_leases`.
    owner: String,
    lease_ttl: Duration,
    /// Lock ids this handle currently holds a lease on.
    leases: Mutex<Vec<String>>,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./chainsync.db"`) or a full
    /// SQLite URL (`"sqlite:./chainsync.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(storage_err)?
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await.map_err(storage_err)?;
        Self::with_pool(pool).await
    }

    /// Open an in-memory SQLite database.
    ///
    /// The pool is capped at one connection so every query sees the same
    /// database. All data is lost when the pool is dropped.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(storage_err)?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(storage_err)?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, IndexerError> {
        let storage = Self {
            pool,
            owner: uuid::Uuid::new_v4().to_string(),
            lease_ttl: DEFAULT_LEASE_TTL,
            leases: Mutex::new(Vec::new()),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Set how long a writer lease lives without a heartbeat.
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// A second handle on the same database with its own lease identity,
    /// behaving like a separate indexer process.
    pub fn contender(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            owner: uuid::Uuid::new_v4().to_string(),
            lease_ttl: self.lease_ttl,
            leases: Mutex::new(Vec::new()),
        }
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        // WAL mode: better concurrent read throughput
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        for stmt in rows::schema(Dialect::Sqlite) {
            sqlx::query(&stmt)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS writer_leases (
                lock_id    TEXT    NOT NULL PRIMARY KEY,
                owner      TEXT    NOT NULL,
                expires_at INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!("SqliteStorage schema initialized");
        Ok(())
    }

    fn lease_expiry(&self) -> i64 {
        now_ms() + self.lease_ttl.as_millis() as i64
    }

    fn held_leases(&self) -> Result<Vec<String>, IndexerError> {
        self.leases
            .lock()
            .map(|l| l.clone())
            .map_err(|_| IndexerError::Storage("lease table poisoned".into()))
    }

    fn track_lease(&self, lock_id: &str, held: bool) -> Result<(), IndexerError> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| IndexerError::Storage("lease table poisoned".into()))?;
        leases.retain(|l| l != lock_id);
        if held {
            leases.push(lock_id.to_string());
        }
        Ok(())
    }
}

fn storage_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn bind_value<'q>(q: SqliteQuery<'q>, value: &SqlValue) -> SqliteQuery<'q> {
    match value {
        SqlValue::Int(v) => q.bind(*v),
        SqlValue::Text(v) => q.bind(v.clone()),
        SqlValue::NullableText(v) => q.bind(v.clone()),
        SqlValue::Blob(v) => q.bind(v.clone()),
        SqlValue::NullableBlob(v) => q.bind(v.clone()),
        SqlValue::TextList(v) => q.bind(serde_json::Value::from(v.clone()).to_string()),
    }
}

fn tx_from_row(row: &SqliteRow) -> Result<TransactionRecord, IndexerError> {
    let types: String = row.get("message_types");
    let status: String = row.get("status");
    Ok(TransactionRecord {
        hash: row.get("hash"),
        block_height: row.get::<i64, _>("block_height") as u64,
        tx_index: row.get::<i64, _>("tx_index") as u32,
        primary_type: row.get("primary_type"),
        message_types: serde_json::from_str(&types)
            .map_err(|e| IndexerError::Storage(format!("message_types: {e}")))?,
        status: TxStatus::parse(&status)
            .ok_or_else(|| IndexerError::Storage(format!("unknown tx status {status:?}")))?,
        gas_used: row.get::<i64, _>("gas_used") as u64,
        gas_wanted: row.get::<i64, _>("gas_wanted") as u64,
        memo: row.get("memo"),
        error_log: row.get("error_log"),
        decode_note: row.get("decode_note"),
    })
}

fn message_from_row(row: &SqliteRow) -> Result<StoredMessage, IndexerError> {
    let status: String = row.get("status");
    Ok(StoredMessage {
        tx_hash: row.get("tx_hash"),
        block_height: row.get::<i64, _>("block_height") as u64,
        msg_index: row.get::<i64, _>("msg_index") as u32,
        type_url: row.get("type_url"),
        module: row.get("module"),
        status: MessageStatus::parse(&status)
            .ok_or_else(|| IndexerError::Storage(format!("unknown message status {status:?}")))?,
        raw: row.get("raw_bytes"),
        error: row.get("decode_error"),
    })
}

fn execution_from_row(row: &SqliteRow) -> Result<StoredExecution, IndexerError> {
    let msg: String = row.get("msg");
    Ok(StoredExecution {
        tx_hash: row.get("tx_hash"),
        msg_index: row.get::<i64, _>("msg_index") as u32,
        msg: serde_json::from_str(&msg)
            .map_err(|e| IndexerError::Storage(format!("contract msg: {e}")))?,
        program_type: row.get("program_type"),
    })
}

#[async_trait]
impl BlockStore for SqliteStorage {
    async fn load_cursor(&self) -> Result<Option<SyncCursor>, IndexerError> {
        let row = sqlx::query(rows::SELECT_CURSOR)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(|r| SyncCursor::new(r.get::<i64, _>("last_height") as u64, r.get::<String, _>("last_hash"))))
    }

    async fn commit_block(&self, block: &IndexedBlock) -> Result<CommitOutcome, IndexerError> {
        let height = block.height();
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let existing = sqlx::query(rows::SELECT_EXISTING)
            .bind(height as i64)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_err)?
            .map(|r| (r.get::<String, _>("hash"), r.get::<String, _>("content_digest")));
        let cursor = sqlx::query(rows::SELECT_CURSOR)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_err)?
            .map(|r| SyncCursor::new(r.get::<i64, _>("last_height") as u64, r.get::<String, _>("last_hash")));

        if let Some(outcome) = precheck_commit(block, existing, cursor.as_ref())? {
            tx.rollback().await.map_err(storage_err)?;
            return Ok(outcome);
        }

        for lock_id in self.held_leases()? {
            let fenced = sqlx::query(FENCE_LEASE)
                .bind(self.lease_expiry())
                .bind(&lock_id)
                .bind(&self.owner)
                .bind(now_ms())
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
            if fenced.rows_affected() == 0 {
                tx.rollback().await.map_err(storage_err)?;
                tracing::error!(lock_id = %lock_id, height, "lease lost, refusing to commit");
                return Err(IndexerError::LockHeld { lock_id });
            }
        }

        for row in rows::block_rows(block)? {
            let sql = row.table.insert_sql(Dialect::Sqlite);
            let query = row
                .values
                .iter()
                .fold(sqlx::query(&sql), bind_value);
            query.execute(&mut *tx).await.map_err(storage_err)?;
        }

        sqlx::query(rows::UPSERT_CURSOR)
            .bind(height as i64)
            .bind(&block.block.hash)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        debug!(height, txs = block.transactions.len(), "block committed");
        Ok(CommitOutcome::Committed)
    }

    async fn block_hash(&self, height: u64) -> Result<Option<String>, IndexerError> {
        let row = sqlx::query(rows::SELECT_BLOCK_HASH)
            .bind(height as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(|r| r.get("hash")))
    }

    async fn stats(&self) -> Result<StoreStats, IndexerError> {
        let row = sqlx::query(rows::SELECT_STATS)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(StoreStats {
            blocks: row.get::<i64, _>("blocks") as u64,
            transactions: row.get::<i64, _>("transactions") as u64,
            messages: row.get::<i64, _>("messages") as u64,
            unrecognized: row.get::<i64, _>("unrecognized") as u64,
            unparsed: row.get::<i64, _>("unparsed") as u64,
            cursor: self.load_cursor().await?,
        })
    }

    async fn transactions_at(&self, height: u64) -> Result<Vec<TransactionRecord>, IndexerError> {
        let rows = sqlx::query(rows::SELECT_TXS_AT)
            .bind(height as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(tx_from_row).collect()
    }

    async fn messages_for_tx(&self, tx_hash: &str) -> Result<Vec<StoredMessage>, IndexerError> {
        let rows = sqlx::query(rows::SELECT_MESSAGES_FOR_TX)
            .bind(tx_hash)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(message_from_row).collect()
    }

    async fn program_submissions(&self, limit: usize) -> Result<Vec<StoredProgram>, IndexerError> {
        let rows = sqlx::query(rows::SELECT_PROGRAMS)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows
            .iter()
            .map(|r| StoredProgram {
                tx_hash: r.get("tx_hash"),
                msg_index: r.get::<i64, _>("msg_index") as u32,
                block_height: r.get::<i64, _>("block_height") as u64,
                sender: r.get("sender"),
                bytecode: r.get("bytecode"),
            })
            .collect())
    }

    async fn contract_executions(
        &self,
        unclassified_only: bool,
        limit: usize,
    ) -> Result<Vec<StoredExecution>, IndexerError> {
        let sql = if unclassified_only {
            rows::SELECT_UNCLASSIFIED
        } else {
            rows::SELECT_EXECUTIONS
        };
        let rows = sqlx::query(sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(execution_from_row).collect()
    }

    async fn set_program_type(
        &self,
        tx_hash: &str,
        msg_index: u32,
        program_type: &str,
    ) -> Result<(), IndexerError> {
        let result = sqlx::query(rows::UPDATE_PROGRAM_TYPE)
            .bind(program_type)
            .bind(tx_hash)
            .bind(i64::from(msg_index))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(IndexerError::Storage(format!(
                "no contract execution at {tx_hash}/{msg_index}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl WriterLock for SqliteStorage {
    async fn acquire(&self, lock_id: &str) -> Result<(), IndexerError> {
        let result = sqlx::query(
            "INSERT INTO writer_leases (lock_id, owner, expires_at) VALUES (?, ?, ?)
             ON CONFLICT (lock_id) DO UPDATE
                SET owner = excluded.owner, expires_at = excluded.expires_at
              WHERE writer_leases.expires_at < ? OR writer_leases.owner = excluded.owner",
        )
        .bind(lock_id)
        .bind(&self.owner)
        .bind(self.lease_expiry())
        .bind(now_ms())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(IndexerError::LockHeld {
                lock_id: lock_id.to_string(),
            });
        }
        self.track_lease(lock_id, true)?;
        debug!(lock_id, owner = %self.owner, "writer lease acquired");
        Ok(())
    }

    async fn heartbeat(&self, lock_id: &str) -> Result<(), IndexerError> {
        let result = sqlx::query(
            "UPDATE writer_leases SET expires_at = ? WHERE lock_id = ? AND owner = ?",
        )
        .bind(self.lease_expiry())
        .bind(lock_id)
        .bind(&self.owner)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            // Another process took over after our lease ran out. The id stays
            // tracked so later commits from this handle keep failing.
            return Err(IndexerError::LockHeld {
                lock_id: lock_id.to_string(),
            });
        }
        Ok(())
    }

    async fn release(&self, lock_id: &str) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM writer_leases WHERE lock_id = ? AND owner = ?")
            .bind(lock_id)
            .bind(&self.owner)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        self.track_lease(lock_id, false)?;
        debug!(lock_id, owner = %self.owner, "writer lease released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsync_core::record::{
        BlockRecord, Deposit, DomainRecord, MessageBody, MessageRecord,
    };
    use chrono::Utc;

    fn indexed(height: u64, hash: &str, digest: &str) -> IndexedBlock {
        let tx_hash = format!("0xtx{height}");
        IndexedBlock {
            block: BlockRecord {
                height,
                hash: hash.into(),
                parent_hash: format!("h{}", height - 1),
                timestamp: Utc::now(),
                proposer: "val".into(),
                tx_count: 1,
                gas_used: 100,
                gas_wanted: 200,
                content_digest: digest.into(),
            },
            transactions: vec![TransactionRecord {
                hash: tx_hash.clone(),
                block_height: height,
                tx_index: 0,
                primary_type: "/bridge.v1.MsgDeposit".into(),
                message_types: vec!["/bridge.v1.MsgDeposit".into(), "/x.v1.MsgNew".into()],
                status: TxStatus::Success,
                gas_used: 100,
                gas_wanted: 200,
                memo: "hi".into(),
                error_log: None,
                decode_note: None,
            }],
            messages: vec![
                MessageRecord {
                    tx_hash: tx_hash.clone(),
                    block_height: height,
                    msg_index: 0,
                    type_url: "/bridge.v1.MsgDeposit".into(),
                    body: MessageBody::Decoded {
                        module: "bridge".into(),
                        record: DomainRecord::Deposit(Deposit {
                            sender: "s".into(),
                            receiver: "r".into(),
                            amount: "10".into(),
                            denom: "uatom".into(),
                            event_nonce: height,
                        }),
                    },
                },
                MessageRecord {
                    tx_hash,
                    block_height: height,
                    msg_index: 1,
                    type_url: "/x.v1.MsgNew".into(),
                    body: MessageBody::Unrecognized { raw: vec![7, 7] },
                },
            ],
        }
    }

    #[tokio::test]
    async fn commit_and_read_back() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let outcome = store.commit_block(&indexed(1, "h1", "d1")).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);

        let txs = store.transactions_at(1).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].message_types.len(), 2);
        assert_eq!(txs[0].status, TxStatus::Success);

        let msgs = store.messages_for_tx("0xtx1").await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].status, MessageStatus::Decoded);
        assert_eq!(msgs[1].status, MessageStatus::Unrecognized);
        assert_eq!(msgs[1].raw, Some(vec![7, 7]));

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.blocks, 1);
        assert_eq!(stats.unrecognized, 1);
        assert_eq!(stats.cursor, Some(SyncCursor::new(1, "h1")));
    }

    #[tokio::test]
    async fn identical_recommit_writes_nothing() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit_block(&indexed(10, "h10", "d10")).await.unwrap();
        let again = store.commit_block(&indexed(10, "h10", "d10")).await.unwrap();
        assert_eq!(again, CommitOutcome::AlreadyCommitted);
        assert_eq!(store.stats().await.unwrap().transactions, 1);
    }

    #[tokio::test]
    async fn divergent_recommit_conflicts() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit_block(&indexed(10, "h10", "d10")).await.unwrap();
        let err = store
            .commit_block(&indexed(10, "other", "d-other"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.block_hash(10).await.unwrap().as_deref(), Some("h10"));
    }

    #[tokio::test]
    async fn gap_is_rejected() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit_block(&indexed(1, "h1", "d1")).await.unwrap();
        let err = store.commit_block(&indexed(3, "h3", "d3")).await.unwrap_err();
        assert!(matches!(err, IndexerError::OutOfOrder { expected: 2, actual: 3 }));
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_whole_block() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit_block(&indexed(1, "h1", "d1")).await.unwrap();

        // Same tx hash as block 1 violates the transactions primary key
        // after the block row has already been inserted.
        let mut bad = indexed(2, "h2", "d2");
        bad.transactions[0].hash = "0xtx1".into();
        assert!(store.commit_block(&bad).await.is_err());

        assert_eq!(store.block_hash(2).await.unwrap(), None);
        assert!(store.messages_for_tx("0xtx2").await.unwrap().is_empty());
        assert_eq!(store.load_cursor().await.unwrap(), Some(SyncCursor::new(1, "h1")));
    }

    #[tokio::test]
    async fn lease_excludes_second_writer() {
        let a = SqliteStorage::in_memory().await.unwrap();
        let b = a.contender();
        a.acquire("writer").await.unwrap();
        assert!(b.acquire("writer").await.unwrap_err().is_lock_held());
        a.heartbeat("writer").await.unwrap();
        a.release("writer").await.unwrap();
        b.acquire("writer").await.unwrap();
        assert!(a.heartbeat("writer").await.is_err());
    }

    #[tokio::test]
    async fn expired_lease_can_be_taken_over() {
        let a = SqliteStorage::in_memory()
            .await
            .unwrap()
            .with_lease_ttl(Duration::ZERO);
        let b = a.contender();
        a.acquire("writer").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        b.acquire("writer").await.unwrap();
    }

    #[tokio::test]
    async fn commit_refreshes_a_live_lease() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.acquire("writer").await.unwrap();
        let outcome = store.commit_block(&indexed(1, "h1", "d1")).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);
        assert!(store.contender().acquire("writer").await.unwrap_err().is_lock_held());
    }

    #[tokio::test]
    async fn commit_refused_after_lease_taken_over() {
        let a = SqliteStorage::in_memory()
            .await
            .unwrap()
            .with_lease_ttl(Duration::ZERO);
        let b = a.contender().with_lease_ttl(Duration::from_secs(30));
        a.acquire("writer").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        b.acquire("writer").await.unwrap();

        let err = a.commit_block(&indexed(1, "h1", "d1")).await.unwrap_err();
        assert!(err.is_lock_held());
        assert!(a.heartbeat("writer").await.is_err());
        // Still fenced after the failed renewal.
        assert!(a.commit_block(&indexed(1, "h1", "d1")).await.unwrap_err().is_lock_held());
        assert_eq!(b.block_hash(1).await.unwrap(), None);
        assert!(b.load_cursor().await.unwrap().is_none());

        b.commit_block(&indexed(1, "h1", "d1")).await.unwrap();
    }

    #[tokio::test]
    async fn orphan_rows_are_rejected() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let orphan_tx = sqlx::query(
            "INSERT INTO transactions (hash, block_height, tx_index, primary_type, message_types,
                 status, gas_used, gas_wanted, memo)
             VALUES ('0xorphan', 99, 0, '', '[]', 'success', 0, 0, '')",
        )
        .execute(&store.pool)
        .await;
        assert!(orphan_tx.is_err());

        store.commit_block(&indexed(1, "h1", "d1")).await.unwrap();
        let orphan_msg = sqlx::query(
            "INSERT INTO messages (tx_hash, msg_index, block_height, type_url, status)
             VALUES ('0xmissing', 0, 1, '/x.v1.Msg', 'unrecognized')",
        )
        .execute(&store.pool)
        .await;
        assert!(orphan_msg.is_err());
    }

    #[tokio::test]
    async fn program_type_update() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit_block(&indexed(1, "h1", "d1")).await.unwrap();
        assert!(store.contract_executions(true, 10).await.unwrap().is_empty());
        assert!(store.set_program_type("0xtx1", 0, "swap").await.is_err());
    }
}
