//! Post-ingest enrichment.
//!
//! [`classify_executions`] fills the derived `program_type` column of
//! contract executions from the stored message JSON. It only touches rows
//! that are still unclassified, so running it again changes nothing.
//!
//! [`describe_programs`] is the read side of program submissions: each
//! byte-code blob goes through an [`EnrichmentCache`] and comes back decoded
//! or as raw hex.

use serde::Serialize;

use chainsync_codec::{classify_program, EnrichmentCache, ProgramDecoder, ProgramView};
use chainsync_core::error::IndexerError;
use chainsync_core::store::{BlockStore, StoredProgram};

/// Stored for executions whose message shape has no recognizable program.
pub const UNKNOWN_PROGRAM_TYPE: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub classified: u64,
    /// Subset of `classified` that got [`UNKNOWN_PROGRAM_TYPE`].
    pub unknown: u64,
}

/// Classify every unclassified contract execution, `batch_size` rows at a time.
pub async fn classify_executions(
    store: &dyn BlockStore,
    batch_size: usize,
) -> Result<EnrichReport, IndexerError> {
    let mut report = EnrichReport::default();
    loop {
        let batch = store.contract_executions(true, batch_size.max(1)).await?;
        if batch.is_empty() {
            break;
        }
        for exec in batch {
            let program_type = match classify_program(&exec.msg) {
                Some(t) => t,
                None => {
                    report.unknown += 1;
                    UNKNOWN_PROGRAM_TYPE.to_string()
                }
            };
            tracing::debug!(tx = %exec.tx_hash, msg_index = exec.msg_index, program_type = %program_type, "classified");
            store
                .set_program_type(&exec.tx_hash, exec.msg_index, &program_type)
                .await?;
            report.classified += 1;
        }
    }
    tracing::info!(classified = report.classified, unknown = report.unknown, "classification pass done");
    Ok(report)
}

/// A program submission with its read-time view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescribedProgram {
    pub tx_hash: String,
    pub msg_index: u32,
    pub block_height: u64,
    pub sender: String,
    pub view: ProgramView,
}

/// The most recent `limit` program submissions, enriched through `cache`.
pub async fn describe_programs<D: ProgramDecoder>(
    store: &dyn BlockStore,
    cache: &EnrichmentCache<D>,
    limit: usize,
) -> Result<Vec<DescribedProgram>, IndexerError> {
    let programs = store.program_submissions(limit).await?;
    let mut out = Vec::with_capacity(programs.len());
    for StoredProgram {
        tx_hash,
        msg_index,
        block_height,
        sender,
        bytecode,
    } in programs
    {
        let view = cache.view(&bytecode).await;
        out.push(DescribedProgram {
            tx_hash,
            msg_index,
            block_height,
            sender,
            view,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chainsync_codec::{DecoderRegistry, ProgramDecodeError};
    use chainsync_core::types::{RawBlock, RawMessage, RawTransaction};
    use chainsync_storage::MemoryStorage;
    use chrono::Utc;
    use serde_json::{json, Value};

    use crate::pipeline::BlockDecoder;

    fn execute(contract_msg: Value) -> RawMessage {
        RawMessage {
            type_url: "/cosmwasm.wasm.v1.MsgExecuteContract".into(),
            value: json!({
                "sender": "alice",
                "contract": "wasm1pool",
                "msg": contract_msg,
                "funds": []
            })
            .to_string()
            .into_bytes(),
        }
    }

    fn submit(bytecode: &str) -> RawMessage {
        RawMessage {
            type_url: "/dex.v1.MsgSubmitProgram".into(),
            value: json!({"sender": "bob", "bytecode": bytecode})
                .to_string()
                .into_bytes(),
        }
    }

    async fn seeded(messages: Vec<RawMessage>) -> MemoryStorage {
        let raw = RawBlock {
            height: 1,
            hash: "0xb1".into(),
            parent_hash: "0xb0".into(),
            timestamp: Utc::now(),
            proposer: "v".into(),
            txs: vec![RawTransaction {
                hash: "0xT1".into(),
                code: 0,
                gas_used: 1,
                gas_wanted: 1,
                memo: String::new(),
                log: String::new(),
                messages,
            }],
        };
        let store = MemoryStorage::new();
        let indexed = BlockDecoder::new(Arc::new(DecoderRegistry::standard())).decode(&raw);
        store.commit_block(&indexed).await.unwrap();
        store
    }

    struct FlakyDecoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProgramDecoder for FlakyDecoder {
        async fn decode(&self, bytecode: &[u8]) -> Result<Value, ProgramDecodeError> {
            // First call fails, later calls succeed.
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ProgramDecodeError::Timeout { ms: 10 });
            }
            Ok(json!({"len": bytecode.len()}))
        }
    }

    #[tokio::test]
    async fn classifies_and_is_idempotent() {
        let store = seeded(vec![
            execute(json!({"swap": {"program_type": "amm"}})),
            execute(json!({"a": {}, "b": {}})),
            execute(json!([1, 2, 3])),
        ])
        .await;

        let report = classify_executions(&store, 2).await.unwrap();
        assert_eq!(report.classified, 3);
        assert_eq!(report.unknown, 1);

        let types: Vec<_> = store
            .contract_executions(false, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.program_type.unwrap())
            .collect();
        assert_eq!(types, vec!["swap:amm", "multi", UNKNOWN_PROGRAM_TYPE]);

        let again = classify_executions(&store, 2).await.unwrap();
        assert_eq!(again, EnrichReport::default());
    }

    #[tokio::test]
    async fn describe_falls_back_then_recovers() {
        let store = seeded(vec![submit("0xdeadbeef")]).await;
        let cache = EnrichmentCache::new(
            FlakyDecoder {
                calls: AtomicUsize::new(0),
            },
            8,
        );

        let first = describe_programs(&store, &cache, 10).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(
            first[0].view,
            ProgramView::Raw {
                bytecode_hex: "0xdeadbeef".into()
            }
        );

        let second = describe_programs(&store, &cache, 10).await.unwrap();
        assert_eq!(
            second[0].view,
            ProgramView::Decoded {
                summary: json!({"len": 4})
            }
        );
        assert_eq!(second[0].sender, "bob");
    }
}
