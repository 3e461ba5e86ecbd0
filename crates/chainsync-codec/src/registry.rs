//! The type-id → decoder table.

use std::collections::HashMap;

use chainsync_core::record::DomainRecord;

use crate::decoders;
use crate::error::DecodeError;

/// A pure decode function for one message type.
pub type DecodeFn = fn(&[u8]) -> Result<DomainRecord, DecodeError>;

/// One registry row.
#[derive(Clone, Copy)]
pub struct DecoderEntry {
    pub type_url: &'static str,
    pub module: &'static str,
    pub decode: DecodeFn,
}

impl std::fmt::Debug for DecoderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderEntry")
            .field("type_url", &self.type_url)
            .field("module", &self.module)
            .finish()
    }
}

/// Message types the indexer understands out of the box.
pub const STANDARD_DECODERS: &[DecoderEntry] = &[
    DecoderEntry {
        type_url: "/bridge.v1.MsgDeposit",
        module: "bridge",
        decode: decoders::decode_deposit,
    },
    DecoderEntry {
        type_url: "/bridge.v1.MsgWithdraw",
        module: "bridge",
        decode: decoders::decode_withdrawal,
    },
    DecoderEntry {
        type_url: "/cosmos.bank.v1beta1.MsgSend",
        module: "bank",
        decode: decoders::decode_transfer,
    },
    DecoderEntry {
        type_url: "/token.v1.MsgMint",
        module: "token",
        decode: decoders::decode_mint,
    },
    DecoderEntry {
        type_url: "/token.v1.MsgBurn",
        module: "token",
        decode: decoders::decode_burn,
    },
    DecoderEntry {
        type_url: "/bridge.v1.MsgFragmentSignature",
        module: "bridge",
        decode: decoders::decode_fragment_signature,
    },
    DecoderEntry {
        type_url: "/bridge.v1.MsgSetDelegateKeys",
        module: "bridge",
        decode: decoders::decode_delegate_keys,
    },
    DecoderEntry {
        type_url: "/cosmwasm.wasm.v1.MsgExecuteContract",
        module: "wasm",
        decode: decoders::decode_contract_execution,
    },
    DecoderEntry {
        type_url: "/dex.v1.MsgSubmitProgram",
        module: "dex",
        decode: decoders::decode_program_submission,
    },
];

/// Result of a registry lookup + decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Recognized {
        module: &'static str,
        record: DomainRecord,
    },
    /// No decoder registered for this type id.
    Unrecognized,
}

/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct DecoderRegistry {
    by_type: HashMap<&'static str, DecoderEntry>,
}

impl DecoderRegistry {
    /// An empty registry. Every message is unrecognized.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated from [`STANDARD_DECODERS`].
    pub fn standard() -> Self {
        Self::from_entries(STANDARD_DECODERS)
    }

    pub fn from_entries(entries: &[DecoderEntry]) -> Self {
        let mut registry = Self::new();
        for entry in entries {
            registry.register(*entry);
        }
        registry
    }

    /// Add or replace the decoder for `entry.type_url`.
    pub fn register(&mut self, entry: DecoderEntry) {
        self.by_type.insert(entry.type_url, entry);
    }

    pub fn decode(&self, type_url: &str, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        let Some(entry) = self.by_type.get(type_url) else {
            return Ok(Decoded::Unrecognized);
        };
        let record = (entry.decode)(bytes)?;
        Ok(Decoded::Recognized {
            module: entry.module,
            record,
        })
    }

    /// Module owning `type_url`, if registered.
    pub fn module_of(&self, type_url: &str) -> Option<&'static str> {
        self.by_type.get(type_url).map(|e| e.module)
    }

    pub fn is_registered(&self, type_url: &str) -> bool {
        self.by_type.contains_key(type_url)
    }

    /// Registered type ids, sorted.
    pub fn type_urls(&self) -> Vec<&'static str> {
        let mut urls: Vec<_> = self.by_type.keys().copied().collect();
        urls.sort_unstable();
        urls
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_every_entry() {
        let reg = DecoderRegistry::standard();
        assert_eq!(reg.len(), STANDARD_DECODERS.len());
        assert_eq!(reg.module_of("/cosmos.bank.v1beta1.MsgSend"), Some("bank"));
        assert_eq!(reg.module_of("/dex.v1.MsgSubmitProgram"), Some("dex"));
    }

    #[test]
    fn unknown_type_passes_through() {
        let reg = DecoderRegistry::standard();
        let out = reg.decode("/foo.v1.MsgBar", b"anything at all").unwrap();
        assert_eq!(out, Decoded::Unrecognized);
    }

    #[test]
    fn recognized_type_decodes_with_module() {
        let reg = DecoderRegistry::standard();
        let bytes = br#"{"account":"acc1","amount":{"denom":"utok","amount":"10"}}"#;
        match reg.decode("/token.v1.MsgBurn", bytes).unwrap() {
            Decoded::Recognized { module, record } => {
                assert_eq!(module, "token");
                assert_eq!(record.kind(), "mint_burn");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_recognized_type_is_error() {
        let reg = DecoderRegistry::standard();
        assert!(reg.decode("/bridge.v1.MsgDeposit", b"{").is_err());
    }

    #[test]
    fn register_extends_table() {
        fn always_keys(_: &[u8]) -> Result<DomainRecord, DecodeError> {
            Ok(DomainRecord::DelegateKeys(chainsync_core::record::DelegateKeys {
                validator: "v".into(),
                orchestrator: "o".into(),
                external_address: "e".into(),
            }))
        }
        let mut reg = DecoderRegistry::new();
        assert!(reg.is_empty());
        reg.register(DecoderEntry {
            type_url: "/custom.v1.MsgKeys",
            module: "custom",
            decode: always_keys,
        });
        assert!(reg.is_registered("/custom.v1.MsgKeys"));
        assert_eq!(reg.type_urls(), vec!["/custom.v1.MsgKeys"]);
    }
}
