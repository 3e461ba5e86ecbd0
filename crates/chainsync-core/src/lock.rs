//! Single-writer lock: keeps two indexer processes from writing at once.
//!
//! The lock is taken once at startup and held for the lifetime of the
//! process. Backends pick a mechanism that is released if the process dies:
//! Postgres session advisory locks, SQLite lease rows with a TTL, or an
//! in-process table for tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::IndexerError;

/// Process-lifetime mutual exclusion between indexer instances.
#[async_trait]
pub trait WriterLock: Send + Sync {
    /// Take the lock, or fail with [`IndexerError::LockHeld`].
    async fn acquire(&self, lock_id: &str) -> Result<(), IndexerError>;

    /// Keep a lease-based lock alive. No-op for session locks.
    async fn heartbeat(&self, _lock_id: &str) -> Result<(), IndexerError> {
        Ok(())
    }

    /// Give the lock up. Releasing a lock this instance does not hold is a no-op.
    async fn release(&self, lock_id: &str) -> Result<(), IndexerError>;
}

/// In-process lock table. Handles created with [`MemoryWriterLock::handle`]
/// share the table but own their locks separately, so two handles behave
/// like two indexer processes.
#[derive(Default)]
pub struct MemoryWriterLock {
    held: Arc<Mutex<HashSet<String>>>,
    owned: Mutex<HashSet<String>>,
}

impl MemoryWriterLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A second contender over the same lock table.
    pub fn handle(&self) -> Self {
        Self {
            held: Arc::clone(&self.held),
            owned: Mutex::new(HashSet::new()),
        }
    }

    /// Returns `true` if any handle holds `lock_id`.
    pub fn is_held(&self, lock_id: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(lock_id))
            .unwrap_or(false)
    }
}

fn guard(table: &Mutex<HashSet<String>>) -> Result<MutexGuard<'_, HashSet<String>>, IndexerError> {
    table
        .lock()
        .map_err(|_| IndexerError::Storage("writer lock table poisoned".into()))
}

#[async_trait]
impl WriterLock for MemoryWriterLock {
    async fn acquire(&self, lock_id: &str) -> Result<(), IndexerError> {
        let mut owned = guard(&self.owned)?;
        if owned.contains(lock_id) {
            return Ok(());
        }
        let mut held = guard(&self.held)?;
        if !held.insert(lock_id.to_string()) {
            return Err(IndexerError::LockHeld {
                lock_id: lock_id.to_string(),
            });
        }
        owned.insert(lock_id.to_string());
        tracing::debug!(lock_id, "writer lock acquired");
        Ok(())
    }

    async fn release(&self, lock_id: &str) -> Result<(), IndexerError> {
        if guard(&self.owned)?.remove(lock_id) {
            guard(&self.held)?.remove(lock_id);
            tracing::debug!(lock_id, "writer lock released");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_handle_is_excluded() {
        let first = MemoryWriterLock::new();
        let second = first.handle();

        first.acquire("writer").await.unwrap();
        let err = second.acquire("writer").await.unwrap_err();
        assert!(err.is_lock_held());

        // Re-acquiring from the owner is fine
        first.acquire("writer").await.unwrap();
    }

    #[tokio::test]
    async fn release_lets_next_contender_in() {
        let first = MemoryWriterLock::new();
        let second = first.handle();

        first.acquire("writer").await.unwrap();
        // A non-owner release must not free the lock
        second.release("writer").await.unwrap();
        assert!(first.is_held("writer"));

        first.release("writer").await.unwrap();
        second.acquire("writer").await.unwrap();
        assert!(second.is_held("writer"));
    }

    #[tokio::test]
    async fn poisoned_table_is_an_error() {
        let first = MemoryWriterLock::new();
        let second = first.handle();
        let shared = Arc::clone(&first.held);
        let _ = std::thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("poison the lock table");
        })
        .join();

        assert!(matches!(
            second.acquire("writer").await,
            Err(IndexerError::Storage(_))
        ));
        assert!(!first.is_held("writer"));
    }

    #[tokio::test]
    async fn independent_lock_ids() {
        let first = MemoryWriterLock::new();
        let second = first.handle();
        first.acquire("mainnet").await.unwrap();
        second.acquire("testnet").await.unwrap();
    }
}
