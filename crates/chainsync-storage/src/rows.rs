//! Table layout and row projection shared by the SQL backends.
//!
//! SQL text is written once with `?` placeholders; [`Dialect::sql`] rewrites
//! it to `$1, $2, …` for Postgres.

use std::borrow::Cow;

use chainsync_core::error::IndexerError;
use chainsync_core::record::{DomainRecord, IndexedBlock, MessageRecord};

use crate::ledger::ledger_fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Rewrite `?` placeholders for this dialect.
    pub fn sql<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        match self {
            Self::Sqlite => Cow::Borrowed(sql),
            Self::Postgres => {
                let mut out = String::with_capacity(sql.len() + 16);
                let mut n = 0;
                for ch in sql.chars() {
                    if ch == '?' {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    } else {
                        out.push(ch);
                    }
                }
                Cow::Owned(out)
            }
        }
    }

    fn column_type(&self, ty: ColType) -> &'static str {
        match (self, ty) {
            (Self::Sqlite, ColType::Int) => "INTEGER",
            (Self::Postgres, ColType::Int) => "BIGINT",
            (_, ColType::Text) => "TEXT",
            (Self::Sqlite, ColType::Blob) => "BLOB",
            (Self::Postgres, ColType::Blob) => "BYTEA",
            // JSON array text on SQLite.
            (Self::Sqlite, ColType::TextList) => "TEXT",
            (Self::Postgres, ColType::TextList) => "TEXT[]",
        }
    }
}

// ─── Schema ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColType {
    Int,
    Text,
    Blob,
    TextList,
}

/// `(name, type, nullable)`
pub type Column = (&'static str, ColType, bool);

/// `(column, "table(column)")`
pub type ForeignKey = (&'static str, &'static str);

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub primary_key: &'static str,
    pub unique: Option<&'static str>,
    pub references: &'static [ForeignKey],
}

const IN_BLOCK: &[ForeignKey] = &[("block_height", "blocks(height)")];
const IN_TX: &[ForeignKey] = &[
    ("block_height", "blocks(height)"),
    ("tx_hash", "transactions(hash)"),
];

impl Table {
    pub fn create_sql(&self, dialect: Dialect) -> String {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty, nullable)| {
                let null = if *nullable { "" } else { " NOT NULL" };
                format!("{name} {}{null}", dialect.column_type(*ty))
            })
            .collect();
        defs.push(format!("PRIMARY KEY ({})", self.primary_key));
        if let Some(unique) = self.unique {
            defs.push(format!("UNIQUE ({unique})"));
        }
        for (column, target) in self.references {
            defs.push(format!("FOREIGN KEY ({column}) REFERENCES {target}"));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name,
            defs.join(",\n    ")
        )
    }

    pub fn insert_sql(&self, dialect: Dialect) -> String {
        let names: Vec<&str> = self.columns.iter().map(|c| c.0).collect();
        let marks = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({marks})",
            self.name,
            names.join(", ")
        );
        dialect.sql(&sql).into_owned()
    }
}

use ColType::{Blob, Int, Text, TextList};

pub const BLOCKS: Table = Table {
    name: "blocks",
    columns: &[
        ("height", Int, false),
        ("hash", Text, false),
        ("parent_hash", Text, false),
        ("timestamp", Text, false),
        ("proposer", Text, false),
        ("tx_count", Int, false),
        ("gas_used", Int, false),
        ("gas_wanted", Int, false),
        ("content_digest", Text, false),
    ],
    primary_key: "height",
    unique: Some("hash"),
    references: &[],
};

pub const TRANSACTIONS: Table = Table {
    name: "transactions",
    columns: &[
        ("hash", Text, false),
        ("block_height", Int, false),
        ("tx_index", Int, false),
        ("primary_type", Text, false),
        ("message_types", TextList, false),
        ("status", Text, false),
        ("gas_used", Int, false),
        ("gas_wanted", Int, false),
        ("memo", Text, false),
        ("error_log", Text, true),
        ("decode_note", Text, true),
    ],
    primary_key: "hash",
    unique: None,
    references: IN_BLOCK,
};

pub const MESSAGES: Table = Table {
    name: "messages",
    columns: &[
        ("tx_hash", Text, false),
        ("msg_index", Int, false),
        ("block_height", Int, false),
        ("type_url", Text, false),
        ("module", Text, true),
        ("status", Text, false),
        ("raw_bytes", Blob, true),
        ("decode_error", Text, true),
    ],
    primary_key: "tx_hash, msg_index",
    unique: None,
    references: IN_TX,
};

pub const DEPOSITS: Table = Table {
    name: "deposits",
    columns: &[
        ("tx_hash", Text, false),
        ("msg_index", Int, false),
        ("block_height", Int, false),
        ("sender", Text, false),
        ("receiver", Text, false),
        ("amount", Text, false),
        ("denom", Text, false),
        ("event_nonce", Int, false),
    ],
    primary_key: "tx_hash, msg_index",
    unique: None,
    references: IN_TX,
};

pub const WITHDRAWALS: Table = Table {
    name: "withdrawals",
    columns: &[
        ("tx_hash", Text, false),
        ("msg_index", Int, false),
        ("block_height", Int, false),
        ("sender", Text, false),
        ("destination", Text, false),
        ("amount", Text, false),
        ("denom", Text, false),
        ("fee_amount", Text, false),
    ],
    primary_key: "tx_hash, msg_index",
    unique: None,
    references: IN_TX,
};

pub const TRANSFERS: Table = Table {
    name: "transfers",
    columns: &[
        ("tx_hash", Text, false),
        ("msg_index", Int, false),
        ("block_height", Int, false),
        ("from_address", Text, false),
        ("to_address", Text, false),
        ("coins", Text, false),
    ],
    primary_key: "tx_hash, msg_index",
    unique: None,
    references: IN_TX,
};

pub const MINT_BURNS: Table = Table {
    name: "mint_burns",
    columns: &[
        ("tx_hash", Text, false),
        ("msg_index", Int, false),
        ("block_height", Int, false),
        ("action", Text, false),
        ("account", Text, false),
        ("amount", Text, false),
        ("denom", Text, false),
    ],
    primary_key: "tx_hash, msg_index",
    unique: None,
    references: IN_TX,
};

pub const FRAGMENT_SIGNATURES: Table = Table {
    name: "fragment_signatures",
    columns: &[
        ("tx_hash", Text, false),
        ("msg_index", Int, false),
        ("block_height", Int, false),
        ("validator", Text, false),
        ("fragment_id", Int, false),
        ("nonce", Int, false),
        ("signature", Text, false),
    ],
    primary_key: "tx_hash, msg_index",
    unique: None,
    references: IN_TX,
};

pub const DELEGATE_KEYS: Table = Table {
    name: "delegate_keys",
    columns: &[
        ("tx_hash", Text, false),
        ("msg_index", Int, false),
        ("block_height", Int, false),
        ("validator", Text, false),
        ("orchestrator", Text, false),
        ("external_address", Text, false),
    ],
    primary_key: "tx_hash, msg_index",
    unique: None,
    references: IN_TX,
};

pub const CONTRACT_EXECUTIONS: Table = Table {
    name: "contract_executions",
    columns: &[
        ("tx_hash", Text, false),
        ("msg_index", Int, false),
        ("block_height", Int, false),
        ("sender", Text, false),
        ("contract", Text, false),
        ("msg", Text, false),
        ("funds", Text, false),
        ("program_type", Text, true),
    ],
    primary_key: "tx_hash, msg_index",
    unique: None,
    references: IN_TX,
};

pub const PROGRAM_SUBMISSIONS: Table = Table {
    name: "program_submissions",
    columns: &[
        ("tx_hash", Text, false),
        ("msg_index", Int, false),
        ("block_height", Int, false),
        ("sender", Text, false),
        ("bytecode", Blob, false),
    ],
    primary_key: "tx_hash, msg_index",
    unique: None,
    references: IN_TX,
};

pub const SYNC_CURSOR: Table = Table {
    name: "sync_cursor",
    columns: &[
        ("singleton_id", Int, false),
        ("last_height", Int, false),
        ("last_hash", Text, false),
    ],
    primary_key: "singleton_id",
    unique: None,
    references: &[],
};

pub const ALL_TABLES: &[&Table] = &[
    &BLOCKS,
    &TRANSACTIONS,
    &MESSAGES,
    &DEPOSITS,
    &WITHDRAWALS,
    &TRANSFERS,
    &MINT_BURNS,
    &FRAGMENT_SIGNATURES,
    &DELEGATE_KEYS,
    &CONTRACT_EXECUTIONS,
    &PROGRAM_SUBMISSIONS,
    &SYNC_CURSOR,
];

pub const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_transactions_block ON transactions (block_height)",
    "CREATE INDEX IF NOT EXISTS idx_messages_block ON messages (block_height)",
    "CREATE INDEX IF NOT EXISTS idx_messages_status ON messages (status)",
    "CREATE INDEX IF NOT EXISTS idx_contract_executions_unclassified ON contract_executions (block_height) WHERE program_type IS NULL",
];

/// Every DDL statement, tables first.
pub fn schema(dialect: Dialect) -> Vec<String> {
    ALL_TABLES
        .iter()
        .map(|t| t.create_sql(dialect))
        .chain(INDEXES.iter().map(|s| s.to_string()))
        .collect()
}

// ─── Shared queries ───────────────────────────────────────────────────────────

pub const SELECT_EXISTING: &str = "SELECT hash, content_digest FROM blocks WHERE height = ?";
pub const SELECT_CURSOR: &str = "SELECT last_height, last_hash FROM sync_cursor WHERE singleton_id = 1";
pub const UPSERT_CURSOR: &str = "INSERT INTO sync_cursor (singleton_id, last_height, last_hash) VALUES (1, ?, ?)
     ON CONFLICT (singleton_id) DO UPDATE SET last_height = excluded.last_height, last_hash = excluded.last_hash";
pub const SELECT_BLOCK_HASH: &str = "SELECT hash FROM blocks WHERE height = ?";
pub const SELECT_STATS: &str = "SELECT
        (SELECT COUNT(*) FROM blocks) AS blocks,
        (SELECT COUNT(*) FROM transactions) AS transactions,
        (SELECT COUNT(*) FROM messages) AS messages,
        (SELECT COUNT(*) FROM messages WHERE status = 'unrecognized') AS unrecognized,
        (SELECT COUNT(*) FROM messages WHERE status = 'unparsed') AS unparsed";
pub const SELECT_TXS_AT: &str = "SELECT hash, block_height, tx_index, primary_type, message_types, status,
            gas_used, gas_wanted, memo, error_log, decode_note
     FROM transactions WHERE block_height = ? ORDER BY tx_index";
pub const SELECT_MESSAGES_FOR_TX: &str = "SELECT tx_hash, block_height, msg_index, type_url, module, status, raw_bytes, decode_error
     FROM messages WHERE tx_hash = ? ORDER BY msg_index";
pub const SELECT_PROGRAMS: &str = "SELECT tx_hash, msg_index, block_height, sender, bytecode
     FROM program_submissions ORDER BY block_height DESC, tx_hash, msg_index LIMIT ?";
pub const SELECT_EXECUTIONS: &str = "SELECT tx_hash, msg_index, msg, program_type
     FROM contract_executions ORDER BY block_height, tx_hash, msg_index LIMIT ?";
pub const SELECT_UNCLASSIFIED: &str = "SELECT tx_hash, msg_index, msg, program_type
     FROM contract_executions WHERE program_type IS NULL
     ORDER BY block_height, tx_hash, msg_index LIMIT ?";
pub const UPDATE_PROGRAM_TYPE: &str =
    "UPDATE contract_executions SET program_type = ? WHERE tx_hash = ? AND msg_index = ?";

// ─── Row projection ───────────────────────────────────────────────────────────

/// A bind value. Heights and counters are stored as signed 64-bit integers.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
    NullableText(Option<String>),
    Blob(Vec<u8>),
    NullableBlob(Option<Vec<u8>>),
    TextList(Vec<String>),
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        Self::NullableText(v)
    }
}

/// One insert: the target table and its values in column order.
pub struct Row {
    pub table: &'static Table,
    pub values: Vec<SqlValue>,
}

fn json_err(e: serde_json::Error) -> IndexerError {
    IndexerError::Storage(format!("encode row: {e}"))
}

/// Every row written for one block, in insert order.
pub fn block_rows(block: &IndexedBlock) -> Result<Vec<Row>, IndexerError> {
    let b = &block.block;
    let mut rows = Vec::with_capacity(1 + block.transactions.len() + 2 * block.messages.len());

    rows.push(Row {
        table: &BLOCKS,
        values: vec![
            b.height.into(),
            b.hash.as_str().into(),
            b.parent_hash.as_str().into(),
            b.timestamp.to_rfc3339().into(),
            b.proposer.as_str().into(),
            b.tx_count.into(),
            b.gas_used.into(),
            b.gas_wanted.into(),
            b.content_digest.as_str().into(),
        ],
    });

    for tx in &block.transactions {
        rows.push(Row {
            table: &TRANSACTIONS,
            values: vec![
                tx.hash.as_str().into(),
                tx.block_height.into(),
                tx.tx_index.into(),
                tx.primary_type.as_str().into(),
                SqlValue::TextList(tx.message_types.clone()),
                tx.status.as_str().into(),
                tx.gas_used.into(),
                tx.gas_wanted.into(),
                tx.memo.as_str().into(),
                tx.error_log.clone().into(),
                tx.decode_note.clone().into(),
            ],
        });
    }

    for msg in &block.messages {
        let (module, status, raw, error) = ledger_fields(&msg.body);
        rows.push(Row {
            table: &MESSAGES,
            values: vec![
                msg.tx_hash.as_str().into(),
                msg.msg_index.into(),
                msg.block_height.into(),
                msg.type_url.as_str().into(),
                module.into(),
                status.as_str().into(),
                SqlValue::NullableBlob(raw),
                error.into(),
            ],
        });
        if let Some(record) = msg.body.record() {
            rows.push(domain_row(msg, record)?);
        }
    }

    Ok(rows)
}

fn domain_row(msg: &MessageRecord, record: &DomainRecord) -> Result<Row, IndexerError> {
    let (table, tail): (&'static Table, Vec<SqlValue>) = match record {
        DomainRecord::Deposit(d) => (
            &DEPOSITS,
            vec![
                d.sender.as_str().into(),
                d.receiver.as_str().into(),
                d.amount.as_str().into(),
                d.denom.as_str().into(),
                d.event_nonce.into(),
            ],
        ),
        DomainRecord::Withdrawal(w) => (
            &WITHDRAWALS,
            vec![
                w.sender.as_str().into(),
                w.destination.as_str().into(),
                w.amount.as_str().into(),
                w.denom.as_str().into(),
                w.fee_amount.as_str().into(),
            ],
        ),
        DomainRecord::Transfer(t) => (
            &TRANSFERS,
            vec![
                t.from_address.as_str().into(),
                t.to_address.as_str().into(),
                t.coins.as_str().into(),
            ],
        ),
        DomainRecord::MintBurn(m) => (
            &MINT_BURNS,
            vec![
                m.action.as_str().into(),
                m.account.as_str().into(),
                m.amount.as_str().into(),
                m.denom.as_str().into(),
            ],
        ),
        DomainRecord::FragmentSignature(f) => (
            &FRAGMENT_SIGNATURES,
            vec![
                f.validator.as_str().into(),
                f.fragment_id.into(),
                f.nonce.into(),
                f.signature.as_str().into(),
            ],
        ),
        DomainRecord::DelegateKeys(k) => (
            &DELEGATE_KEYS,
            vec![
                k.validator.as_str().into(),
                k.orchestrator.as_str().into(),
                k.external_address.as_str().into(),
            ],
        ),
        DomainRecord::ContractExecution(c) => (
            &CONTRACT_EXECUTIONS,
            vec![
                c.sender.as_str().into(),
                c.contract.as_str().into(),
                serde_json::to_string(&c.msg).map_err(json_err)?.into(),
                c.funds.as_str().into(),
                c.program_type.clone().into(),
            ],
        ),
        DomainRecord::ProgramSubmission(p) => (
            &PROGRAM_SUBMISSIONS,
            vec![p.sender.as_str().into(), SqlValue::Blob(p.bytecode.clone())],
        ),
    };

    let mut values: Vec<SqlValue> = vec![
        msg.tx_hash.as_str().into(),
        msg.msg_index.into(),
        msg.block_height.into(),
    ];
    values.extend(tail);
    Ok(Row { table, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsync_core::record::{BlockRecord, Deposit, MessageBody};
    use chrono::Utc;

    #[test]
    fn postgres_placeholders_are_numbered() {
        assert_eq!(
            Dialect::Postgres.sql("UPDATE t SET a = ? WHERE b = ? AND c = ?"),
            "UPDATE t SET a = $1 WHERE b = $2 AND c = $3"
        );
        assert_eq!(Dialect::Sqlite.sql("x = ?"), "x = ?");
    }

    #[test]
    fn ddl_uses_dialect_types() {
        let pg = BLOCKS.create_sql(Dialect::Postgres);
        assert!(pg.contains("height BIGINT NOT NULL"));
        assert!(pg.contains("UNIQUE (hash)"));
        let lite = MESSAGES.create_sql(Dialect::Sqlite);
        assert!(lite.contains("raw_bytes BLOB,"));
        assert!(lite.contains("PRIMARY KEY (tx_hash, msg_index)"));
    }

    #[test]
    fn message_types_column_per_dialect() {
        assert!(TRANSACTIONS
            .create_sql(Dialect::Postgres)
            .contains("message_types TEXT[] NOT NULL"));
        assert!(TRANSACTIONS
            .create_sql(Dialect::Sqlite)
            .contains("message_types TEXT NOT NULL"));
    }

    #[test]
    fn child_tables_reference_blocks_and_transactions() {
        let txs = TRANSACTIONS.create_sql(Dialect::Sqlite);
        assert!(txs.contains("FOREIGN KEY (block_height) REFERENCES blocks(height)"));
        assert!(!txs.contains("REFERENCES transactions"));

        for table in ALL_TABLES {
            if matches!(table.name, "blocks" | "transactions" | "sync_cursor") {
                assert!(!table.create_sql(Dialect::Postgres).contains("REFERENCES transactions"));
                continue;
            }
            let ddl = table.create_sql(Dialect::Postgres);
            assert!(ddl.contains("FOREIGN KEY (block_height) REFERENCES blocks(height)"), "{}", table.name);
            assert!(ddl.contains("FOREIGN KEY (tx_hash) REFERENCES transactions(hash)"), "{}", table.name);
        }
    }

    #[test]
    fn every_row_matches_its_column_count() {
        let block = IndexedBlock {
            block: BlockRecord {
                height: 1,
                hash: "h".into(),
                parent_hash: "p".into(),
                timestamp: Utc::now(),
                proposer: "v".into(),
                tx_count: 0,
                gas_used: 0,
                gas_wanted: 0,
                content_digest: "d".into(),
            },
            transactions: vec![],
            messages: vec![
                MessageRecord {
                    tx_hash: "t".into(),
                    block_height: 1,
                    msg_index: 0,
                    type_url: "/bridge.v1.MsgDeposit".into(),
                    body: MessageBody::Decoded {
                        module: "bridge".into(),
                        record: DomainRecord::Deposit(Deposit {
                            sender: "s".into(),
                            receiver: "r".into(),
                            amount: "1".into(),
                            denom: "u".into(),
                            event_nonce: 9,
                        }),
                    },
                },
                MessageRecord {
                    tx_hash: "t".into(),
                    block_height: 1,
                    msg_index: 1,
                    type_url: "/x.v1.Unknown".into(),
                    body: MessageBody::Unrecognized { raw: vec![1] },
                },
            ],
        };
        let rows = block_rows(&block).unwrap();
        // block + 2 ledger rows + 1 deposit
        assert_eq!(rows.len(), 4);
        for row in &rows {
            assert_eq!(row.values.len(), row.table.columns.len(), "{}", row.table.name);
        }
    }
}
