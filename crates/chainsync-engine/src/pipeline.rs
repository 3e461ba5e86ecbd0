//! Raw block → [`IndexedBlock`].
//!
//! Pure transformation: no I/O, no clock. The same raw block always produces
//! the same rows, which is what makes re-commits comparable by digest.

use std::sync::Arc;

use chainsync_codec::{Decoded, DecoderRegistry};
use chainsync_core::record::{
    BlockRecord, IndexedBlock, MessageBody, MessageRecord, TransactionRecord, TxStatus,
};
use chainsync_core::types::{RawBlock, RawTransaction};

/// Applies the decoder registry to every message of a block.
#[derive(Clone)]
pub struct BlockDecoder {
    registry: Arc<DecoderRegistry>,
}

impl BlockDecoder {
    pub fn new(registry: Arc<DecoderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn decode(&self, raw: &RawBlock) -> IndexedBlock {
        let mut transactions = Vec::with_capacity(raw.txs.len());
        let mut messages = Vec::new();
        let mut gas_used = 0u64;
        let mut gas_wanted = 0u64;

        for (tx_index, tx) in raw.txs.iter().enumerate() {
            gas_used = gas_used.saturating_add(tx.gas_used);
            gas_wanted = gas_wanted.saturating_add(tx.gas_wanted);
            let (record, msgs) = self.decode_tx(raw.height, tx_index as u32, tx);
            transactions.push(record);
            messages.extend(msgs);
        }

        IndexedBlock {
            block: BlockRecord {
                height: raw.height,
                hash: raw.hash.clone(),
                parent_hash: raw.parent_hash.clone(),
                timestamp: raw.timestamp,
                proposer: raw.proposer.clone(),
                tx_count: raw.txs.len() as u32,
                gas_used,
                gas_wanted,
                content_digest: raw.content_digest(),
            },
            transactions,
            messages,
        }
    }

    fn decode_tx(
        &self,
        height: u64,
        tx_index: u32,
        tx: &RawTransaction,
    ) -> (TransactionRecord, Vec<MessageRecord>) {
        let hash = tx.hash.to_lowercase();
        let mut failures = Vec::new();

        let messages: Vec<MessageRecord> = tx
            .messages
            .iter()
            .enumerate()
            .map(|(msg_index, msg)| {
                let body = match self.registry.decode(&msg.type_url, &msg.value) {
                    Ok(Decoded::Recognized { module, record }) => MessageBody::Decoded {
                        module: module.to_string(),
                        record,
                    },
                    Ok(Decoded::Unrecognized) => {
                        tracing::debug!(tx = %hash, type_url = %msg.type_url, "unrecognized message type");
                        MessageBody::Unrecognized {
                            raw: msg.value.clone(),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            tx = %hash,
                            msg_index,
                            type_url = %msg.type_url,
                            error = %e,
                            "message failed to decode"
                        );
                        failures.push(format!("msg {msg_index} ({}): {e}", msg.type_url));
                        MessageBody::Unparsed {
                            module: self
                                .registry
                                .module_of(&msg.type_url)
                                .unwrap_or_default()
                                .to_string(),
                            raw: msg.value.clone(),
                            error: e.to_string(),
                        }
                    }
                };
                MessageRecord {
                    tx_hash: hash.clone(),
                    block_height: height,
                    msg_index: msg_index as u32,
                    type_url: msg.type_url.clone(),
                    body,
                }
            })
            .collect();

        let status = if tx.succeeded() {
            TxStatus::Success
        } else {
            TxStatus::Failed
        };
        let record = TransactionRecord {
            hash: hash.clone(),
            block_height: height,
            tx_index,
            primary_type: tx
                .messages
                .first()
                .map(|m| m.type_url.clone())
                .unwrap_or_default(),
            message_types: tx.messages.iter().map(|m| m.type_url.clone()).collect(),
            status,
            gas_used: tx.gas_used,
            gas_wanted: tx.gas_wanted,
            memo: tx.memo.clone(),
            error_log: (status == TxStatus::Failed).then(|| tx.log.clone()),
            decode_note: (!failures.is_empty()).then(|| failures.join("; ")),
        };
        (record, messages)
    }
}
