//! chainsync-storage: pluggable [`BlockStore`] backends for ChainSync.
//!
//! Backends:
//! - [`memory`]: in-memory (tests; staged-then-swapped commits)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, WAL, lease-row writer lock)
//! - [`postgres`]: PostgreSQL via `sqlx` (pooled, session advisory lock)
//!
//! Every backend commits one block per storage transaction: block row,
//! transactions, message ledger, typed domain rows and the sync cursor land
//! together or not at all.
//!
//! [`BlockStore`]: chainsync_core::store::BlockStore

pub mod ledger;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod rows;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "memory")]
pub use memory::MemoryStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresOptions, PostgresStorage};
