//! The sync engine: one writer walking the chain one block at a time.
//!
//! # Initializing
//! Take the writer lock (fail fast if another process holds it), load the
//! cursor, wait for the node to answer.
//!
//! # CatchingUp
//! Fetch `cursor + 1`, check it against the cursor, decode, commit, publish.
//! Repeat until the node reports the height as not yet available.
//!
//! # LiveTailing
//! Same per-block procedure. Between blocks, sleep for the poll interval or
//! until the head watcher reports a new height.
//!
//! Shutdown is checked between blocks and races every wait except the commit
//! itself. The lock is released on every exit path after it was taken.
//!
//! While the lock is held a separate task renews it every `lock_ttl / 3`, so a
//! slow node call cannot outlive the lease. If renewal fails the lock is gone
//! and the run ends with that error, abandoning any commit in flight.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use chainsync_core::cursor::SyncCursor;
use chainsync_core::error::IndexerError;
use chainsync_core::indexer::{SyncConfig, SyncState};
use chainsync_core::lock::WriterLock;
use chainsync_core::store::{BlockStore, CommitOutcome};
use chainsync_core::types::RawBlock;
use chainsync_rpc::{BlockFetch, ChainClient};

use crate::metrics::SyncMetrics;
use crate::pipeline::BlockDecoder;
use crate::publisher::{EventPublisher, EventSink, Notification};

/// How long queued notifications get to drain on shutdown.
const PUBLISH_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Summary returned by a clean [`SyncEngine::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub final_state: SyncState,
    /// Last committed block, if any.
    pub cursor: Option<SyncCursor>,
    pub metrics: SyncMetrics,
}

/// Single-writer sync loop. Build with [`SyncEngineBuilder`](crate::SyncEngineBuilder).
pub struct SyncEngine {
    pub(crate) config: SyncConfig,
    pub(crate) client: Arc<dyn ChainClient>,
    pub(crate) store: Arc<dyn BlockStore>,
    pub(crate) lock: Arc<dyn WriterLock>,
    pub(crate) decoder: BlockDecoder,
    pub(crate) sink: Option<Arc<dyn EventSink>>,
    pub(crate) heads: Option<watch::Receiver<u64>>,
    pub(crate) state: watch::Sender<SyncState>,
    pub(crate) metrics: SyncMetrics,
}

impl SyncEngine {
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Watch state transitions.
    pub fn state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    /// Run until `cancel` fires, the stop height is committed, or a fatal
    /// error occurs.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<SyncReport, IndexerError> {
        self.set_state(SyncState::Initializing);
        let lock_id = self.config.lock_id.clone();

        if let Err(e) = self.lock.acquire(&lock_id).await {
            tracing::error!(lock_id = %lock_id, error = %e, "could not take writer lock");
            self.set_state(SyncState::Error);
            return Err(e);
        }
        tracing::info!(lock_id = %lock_id, chain = %self.config.chain, "writer lock acquired");

        let publisher = self
            .sink
            .clone()
            .map(|sink| EventPublisher::spawn(sink, self.config.publisher.channel_capacity));

        let mut lease = tokio::spawn(keep_lease(
            Arc::clone(&self.lock),
            lock_id.clone(),
            self.config.heartbeat_interval(),
        ));
        let result = tokio::select! {
            r = self.sync(&cancel, publisher.as_ref()) => r,
            lost = &mut lease => Err(match lost {
                Ok(e) => e,
                Err(e) => IndexerError::Aborted {
                    reason: format!("lease heartbeat task ended: {e}"),
                },
            }),
        };
        lease.abort();

        if let Some(publisher) = publisher {
            self.metrics.notifications_dropped = publisher.shutdown(PUBLISH_DRAIN_GRACE).await;
        }
        if let Err(e) = self.lock.release(&lock_id).await {
            tracing::warn!(lock_id = %lock_id, error = %e, "failed to release writer lock");
        }

        match result {
            Ok(cursor) => {
                self.set_state(SyncState::Stopped);
                tracing::info!(
                    last_height = cursor.as_ref().map(|c| c.last_height),
                    committed = self.metrics.blocks_committed,
                    "sync engine stopped"
                );
                Ok(SyncReport {
                    final_state: SyncState::Stopped,
                    cursor,
                    metrics: self.metrics.clone(),
                })
            }
            Err(e) => {
                self.set_state(SyncState::Error);
                tracing::error!(error = %e, "sync engine failed");
                Err(e)
            }
        }
    }

    async fn sync(
        &mut self,
        cancel: &CancellationToken,
        publisher: Option<&EventPublisher>,
    ) -> Result<Option<SyncCursor>, IndexerError> {
        let mut cursor = self.store.load_cursor().await?;
        let resume = SyncCursor::resume_height(cursor.as_ref(), self.config.start_height);
        tracing::info!(
            resume,
            cursor = cursor.as_ref().map(|c| c.last_height),
            "cursor loaded"
        );

        let tip = tokio::select! {
            _ = cancel.cancelled() => return Ok(cursor),
            r = self.client.wait_ready(self.config.ready_timeout()) => r?,
        };
        tracing::info!(tip, lag = tip.saturating_sub(resume.saturating_sub(1)), "node ready");
        self.set_state(SyncState::CatchingUp);

        let idle_wait = self.config.poll_interval();
        let mut heads = self.heads.clone();

        loop {
            if cancel.is_cancelled() {
                return Ok(cursor);
            }
            let next = SyncCursor::resume_height(cursor.as_ref(), self.config.start_height);
            if let Some(stop) = self.config.stop_height {
                if next > stop {
                    tracing::info!(stop_height = stop, "stop height reached");
                    return Ok(cursor);
                }
            }
            let fetched = tokio::select! {
                _ = cancel.cancelled() => return Ok(cursor),
                r = self.client.block(next) => r?,
            };

            match fetched {
                BlockFetch::Available(raw) => {
                    self.ingest(&raw, next, cursor.as_ref(), publisher).await?;
                    match cursor.as_mut() {
                        Some(c) => c.advance(raw.height, raw.hash.clone()),
                        None => cursor = Some(SyncCursor::new(raw.height, raw.hash.clone())),
                    }
                }
                BlockFetch::NotYetAvailable => {
                    if self.current_state() != SyncState::LiveTailing {
                        tracing::info!(next, "caught up with the node");
                        self.set_state(SyncState::LiveTailing);
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(cursor),
                        _ = tokio::time::sleep(idle_wait) => {}
                        _ = next_head(&mut heads) => {
                            tracing::debug!(next, "woken by head notification");
                        }
                    }
                }
            }
        }
    }

    /// Verify, decode, commit and announce one block.
    async fn ingest(
        &mut self,
        raw: &RawBlock,
        expected: u64,
        cursor: Option<&SyncCursor>,
        publisher: Option<&EventPublisher>,
    ) -> Result<(), IndexerError> {
        if raw.height != expected {
            return Err(IndexerError::OutOfOrder {
                expected,
                actual: raw.height,
            });
        }
        if let Some(cursor) = cursor {
            if !raw.extends(&cursor.last_hash) {
                tracing::error!(
                    height = raw.height,
                    expected = %cursor.last_hash,
                    actual = %raw.parent_hash,
                    "parent hash does not match last committed block"
                );
                return Err(IndexerError::ReorgDetected {
                    height: raw.height,
                    expected: cursor.last_hash.clone(),
                    actual: raw.parent_hash.clone(),
                });
            }
        }

        let indexed = self.decoder.decode(raw);
        let outcome = self.store.commit_block(&indexed).await?;
        self.metrics.record(&indexed, outcome);

        match outcome {
            CommitOutcome::Committed => {
                if let Some(publisher) = publisher {
                    for notification in Notification::for_block(&indexed) {
                        publisher.publish(notification);
                    }
                }
                let fields = (
                    indexed.transactions.len(),
                    indexed.messages.len(),
                    indexed.unrecognized_count(),
                    indexed.unparsed_count(),
                );
                if self.current_state() == SyncState::LiveTailing {
                    tracing::info!(
                        height = raw.height,
                        txs = fields.0,
                        messages = fields.1,
                        unrecognized = fields.2,
                        unparsed = fields.3,
                        "block committed"
                    );
                } else {
                    tracing::debug!(
                        height = raw.height,
                        txs = fields.0,
                        messages = fields.1,
                        unrecognized = fields.2,
                        unparsed = fields.3,
                        "block committed"
                    );
                }
            }
            CommitOutcome::AlreadyCommitted => {
                tracing::debug!(height = raw.height, "block already stored with identical content");
            }
        }
        Ok(())
    }

    fn set_state(&self, next: SyncState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::info!(from = %prev, to = %next, "sync state changed");
        }
    }
}

/// Renews the writer lock until renewal fails, then returns why.
async fn keep_lease(lock: Arc<dyn WriterLock>, lock_id: String, every: Duration) -> IndexerError {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the lock was just taken.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = lock.heartbeat(&lock_id).await {
            tracing::error!(lock_id = %lock_id, error = %e, "writer lock lost");
            return e;
        }
        tracing::trace!(lock_id = %lock_id, "writer lock renewed");
    }
}

/// Resolves when the head watcher reports a change. Never resolves without a
/// watcher or after it has gone away.
async fn next_head(heads: &mut Option<watch::Receiver<u64>>) {
    if let Some(rx) = heads.as_mut() {
        if rx.changed().await.is_ok() {
            return;
        }
        *heads = None;
    }
    std::future::pending::<()>().await
}
