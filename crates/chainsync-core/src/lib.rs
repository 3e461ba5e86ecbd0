//! chainsync-core: shared foundation for the single-writer chain indexer.
//!
//! # Architecture
//!
//! ```text
//! SyncEngine (chainsync-engine)
//!     ├── ChainClient        (chainsync-rpc)     latest height / block / tx
//!     ├── DecoderRegistry    (chainsync-codec)   type id → DomainRecord
//!     ├── BlockStore         (this crate, trait) atomic per-block commit + cursor
//!     ├── WriterLock         (this crate, trait) process-lifetime exclusion
//!     └── EventPublisher     (chainsync-engine)  fire-and-forget notifications
//! ```
//!
//! This crate owns the types every other crate agrees on: the raw wire
//! envelopes returned by the node, the normalized records written to storage,
//! the [`SyncCursor`], the [`BlockStore`] and [`WriterLock`] seams, and
//! [`SyncConfig`].

pub mod cursor;
pub mod error;
pub mod indexer;
pub mod lock;
pub mod record;
pub mod store;
pub mod types;

pub use cursor::SyncCursor;
pub use error::IndexerError;
pub use indexer::{BackoffConfig, PublisherConfig, SyncConfig, SyncState};
pub use lock::{MemoryWriterLock, WriterLock};
pub use record::{
    BlockRecord, DomainRecord, IndexedBlock, MessageBody, MessageRecord, TransactionRecord,
    TxStatus,
};
pub use store::{
    BlockStore, CommitOutcome, MessageStatus, StoreStats, StoredExecution, StoredMessage,
    StoredProgram,
};
pub use types::{RawBlock, RawMessage, RawTransaction};
