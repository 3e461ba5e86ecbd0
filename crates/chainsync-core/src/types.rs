//! Wire envelopes returned by the node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ─── Raw envelopes ────────────────────────────────────────────────────────────

/// One message inside a transaction: an opaque payload keyed by a type id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Wire type identifier (e.g. `"/bridge.v1.MsgDeposit"`).
    pub type_url: String,
    /// Encoded payload, hex on the wire.
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
}

/// A transaction as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: String,
    /// Result code; zero means success.
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub gas_used: u64,
    #[serde(default)]
    pub gas_wanted: u64,
    #[serde(default)]
    pub memo: String,
    /// Raw execution log. Kept as the error log when `code != 0`.
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

impl RawTransaction {
    /// Returns `true` if the node reported successful execution.
    pub fn succeeded(&self) -> bool {
        self.code == 0
    }
}

/// A block as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub height: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: DateTime<Utc>,
    pub proposer: String,
    #[serde(default)]
    pub txs: Vec<RawTransaction>,
}

impl RawBlock {
    /// SHA-256 over the canonical JSON encoding of the block, hex encoded.
    ///
    /// Two fetches of the same block produce the same digest, so the writer
    /// can tell an idempotent re-commit from divergent content.
    pub fn content_digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    /// Returns `true` if `parent_hash` names the block hash `hash`.
    pub fn extends(&self, hash: &str) -> bool {
        self.parent_hash.eq_ignore_ascii_case(hash)
    }
}

// ─── Hex serde helper ─────────────────────────────────────────────────────────

/// Serialize `Vec<u8>` as a `0x`-prefixed hex string; accepts input with or
/// without the prefix.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(&s);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
