//! # chainsync-codec
//!
//! Turns opaque chain messages into typed [`DomainRecord`]s.
//!
//! ## Registry
//! [`DecoderRegistry`] maps a wire type id (e.g. `"/bridge.v1.MsgDeposit"`)
//! to a module name and a pure decode function. It is built once at startup
//! from [`STANDARD_DECODERS`]; adding a message type is one table entry.
//! Unknown type ids are not errors: they come back as [`Decoded::Unrecognized`]
//! so the caller can store the raw bytes for later backfill.
//!
//! ## Payload format
//! Payloads are amino-style JSON documents. `u64` fields accept either a JSON
//! number or a decimal string; token amounts must be decimal digit strings.
//!
//! ## Enrichment
//! - [`classify_program`] derives a program type from a stored
//!   contract-execution message. Pure, re-runnable.
//! - [`EnrichmentCache`] fronts a [`ProgramDecoder`] at read time only.
//!
//! [`DomainRecord`]: chainsync_core::record::DomainRecord

pub mod classify;
pub mod decoders;
pub mod error;
pub mod program;
pub mod registry;

pub use classify::classify_program;
pub use error::{DecodeError, ProgramDecodeError};
pub use program::{EnrichmentCache, ProgramDecoder, ProgramView};
pub use registry::{DecodeFn, Decoded, DecoderEntry, DecoderRegistry, STANDARD_DECODERS};

#[cfg(feature = "remote")]
pub use program::HttpProgramDecoder;
