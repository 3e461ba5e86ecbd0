//! Fluent builder for [`SyncEngine`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainsync_core::SyncConfig;
//! use chainsync_engine::{BroadcastSink, SyncEngineBuilder};
//! # fn example(client: Arc<dyn chainsync_rpc::ChainClient>) -> Result<(), chainsync_core::IndexerError> {
//! let (sink, _events) = BroadcastSink::new(256);
//! let engine = SyncEngineBuilder::new(SyncConfig::default())
//!     .client(client)
//!     .storage(Arc::new(chainsync_storage::MemoryStorage::new()))
//!     .sink(Arc::new(sink))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::watch;

use chainsync_codec::DecoderRegistry;
use chainsync_core::error::IndexerError;
use chainsync_core::indexer::{SyncConfig, SyncState};
use chainsync_core::lock::WriterLock;
use chainsync_core::store::BlockStore;
use chainsync_rpc::ChainClient;

use crate::metrics::SyncMetrics;
use crate::pipeline::BlockDecoder;
use crate::publisher::EventSink;
use crate::sync::SyncEngine;

/// Fluent builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    config: SyncConfig,
    client: Option<Arc<dyn ChainClient>>,
    store: Option<Arc<dyn BlockStore>>,
    lock: Option<Arc<dyn WriterLock>>,
    registry: Option<DecoderRegistry>,
    sink: Option<Arc<dyn EventSink>>,
    heads: Option<watch::Receiver<u64>>,
}

impl SyncEngineBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            client: None,
            store: None,
            lock: None,
            registry: None,
            sink: None,
            heads: None,
        }
    }

    /// Set the chain client.
    pub fn client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the block store.
    pub fn store(mut self, store: Arc<dyn BlockStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the writer lock.
    pub fn lock(mut self, lock: Arc<dyn WriterLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Use one backend as both block store and writer lock.
    pub fn storage<S>(mut self, storage: Arc<S>) -> Self
    where
        S: BlockStore + WriterLock + 'static,
    {
        let store: Arc<dyn BlockStore> = storage.clone();
        let lock: Arc<dyn WriterLock> = storage;
        self.store = Some(store);
        self.lock = Some(lock);
        self
    }

    /// Replace the standard decoder table.
    pub fn registry(mut self, registry: DecoderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Deliver post-commit notifications to `sink`.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Wake early in live mode when this channel reports a new head.
    pub fn heads(mut self, heads: watch::Receiver<u64>) -> Self {
        self.heads = Some(heads);
        self
    }

    pub fn build(self) -> Result<SyncEngine, IndexerError> {
        self.config.validate()?;
        let client = self
            .client
            .ok_or_else(|| IndexerError::Config("chain client not set".into()))?;
        let store = self
            .store
            .ok_or_else(|| IndexerError::Config("block store not set".into()))?;
        let lock = self
            .lock
            .ok_or_else(|| IndexerError::Config("writer lock not set".into()))?;
        let registry = self.registry.unwrap_or_else(DecoderRegistry::standard);

        Ok(SyncEngine {
            config: self.config,
            client,
            store,
            lock,
            decoder: BlockDecoder::new(Arc::new(registry)),
            sink: self.sink,
            heads: self.heads,
            state: watch::channel(SyncState::Initializing).0,
            metrics: SyncMetrics::default(),
        })
    }
}
