//! Normalized records produced by the decode step and written by a
//! [`BlockStore`](crate::store::BlockStore) in one atomic unit per block.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Block / transaction rows ─────────────────────────────────────────────────

/// A row of the `blocks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub height: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: DateTime<Utc>,
    pub proposer: String,
    pub tx_count: u32,
    pub gas_used: u64,
    pub gas_wanted: u64,
    /// Digest of the raw block this row was derived from.
    pub content_digest: String,
}

/// Execution status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the `transactions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Lower-cased transaction hash.
    pub hash: String,
    pub block_height: u64,
    /// Position inside the block.
    pub tx_index: u32,
    /// Type id of the first message, empty when the tx carries none.
    pub primary_type: String,
    /// Every message type id, in message order.
    pub message_types: Vec<String>,
    pub status: TxStatus,
    pub gas_used: u64,
    pub gas_wanted: u64,
    pub memo: String,
    /// Node execution log, only kept for failed transactions.
    pub error_log: Option<String>,
    /// Set when one or more recognized messages could not be decoded.
    pub decode_note: Option<String>,
}

// ─── Messages ─────────────────────────────────────────────────────────────────

/// One message of a transaction, after the decode step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub tx_hash: String,
    pub block_height: u64,
    pub msg_index: u32,
    pub type_url: String,
    pub body: MessageBody,
}

/// Outcome of decoding one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MessageBody {
    /// A registered decoder produced a typed record.
    Decoded {
        module: String,
        record: DomainRecord,
    },
    /// No decoder is registered for the type id; raw bytes kept for backfill.
    Unrecognized { raw: Vec<u8> },
    /// A registered decoder rejected the payload.
    Unparsed {
        module: String,
        raw: Vec<u8>,
        error: String,
    },
}

impl MessageBody {
    /// The decoded record, if any.
    pub fn record(&self) -> Option<&DomainRecord> {
        match self {
            Self::Decoded { record, .. } => Some(record),
            _ => None,
        }
    }
}

// ─── Domain records ───────────────────────────────────────────────────────────

/// Module-specific typed fields extracted from a recognized message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainRecord {
    Deposit(Deposit),
    Withdrawal(Withdrawal),
    Transfer(Transfer),
    MintBurn(MintBurn),
    FragmentSignature(FragmentSignature),
    DelegateKeys(DelegateKeys),
    ContractExecution(ContractExecution),
    ProgramSubmission(ProgramSubmission),
}

impl DomainRecord {
    /// Short stable name of the record kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Deposit(_) => "deposit",
            Self::Withdrawal(_) => "withdrawal",
            Self::Transfer(_) => "transfer",
            Self::MintBurn(_) => "mint_burn",
            Self::FragmentSignature(_) => "fragment_signature",
            Self::DelegateKeys(_) => "delegate_keys",
            Self::ContractExecution(_) => "contract_execution",
            Self::ProgramSubmission(_) => "program_submission",
        }
    }
}

/// Inbound bridge deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub sender: String,
    pub receiver: String,
    /// Decimal integer string.
    pub amount: String,
    pub denom: String,
    pub event_nonce: u64,
}

/// Outbound bridge withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub sender: String,
    pub destination: String,
    pub amount: String,
    pub denom: String,
    pub fee_amount: String,
}

/// Bank transfer; `coins` is the canonical `"<amount><denom>,…"` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from_address: String,
    pub to_address: String,
    pub coins: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplyAction {
    Mint,
    Burn,
}

impl SupplyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mint => "mint",
            Self::Burn => "burn",
        }
    }
}

/// Token supply change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintBurn {
    pub action: SupplyAction,
    pub account: String,
    pub amount: String,
    pub denom: String,
}

/// A validator's signature over one fragment of an outbound batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentSignature {
    pub validator: String,
    pub fragment_id: u64,
    pub nonce: u64,
    pub signature: String,
}

/// Delegate-key registration for a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateKeys {
    pub validator: String,
    pub orchestrator: String,
    pub external_address: String,
}

/// Smart-contract execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractExecution {
    pub sender: String,
    pub contract: String,
    /// The execute message as JSON.
    pub msg: serde_json::Value,
    pub funds: String,
    /// Derived classification; filled by the enrichment pass, never at ingest.
    pub program_type: Option<String>,
}

/// Submission of an opaque program byte-code blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSubmission {
    pub sender: String,
    pub bytecode: Vec<u8>,
}

// ─── IndexedBlock ─────────────────────────────────────────────────────────────

/// Everything written for one block, in one atomic unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedBlock {
    pub block: BlockRecord,
    /// In block order.
    pub transactions: Vec<TransactionRecord>,
    /// In (tx order, message order).
    pub messages: Vec<MessageRecord>,
}

impl IndexedBlock {
    pub fn height(&self) -> u64 {
        self.block.height
    }

    /// Decoded domain records with their owning message.
    pub fn records(&self) -> impl Iterator<Item = (&MessageRecord, &DomainRecord)> {
        self.messages
            .iter()
            .filter_map(|m| m.body.record().map(|r| (m, r)))
    }

    /// Number of messages stored as pass-through records.
    pub fn unrecognized_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m.body, MessageBody::Unrecognized { .. }))
            .count()
    }

    /// Number of recognized messages that failed to decode.
    pub fn unparsed_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m.body, MessageBody::Unparsed { .. }))
            .count()
    }
}
