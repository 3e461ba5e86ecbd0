//! chainsync-engine: the single-writer sync loop and everything it drives.
//!
//! - [`SyncEngine`]: `Initializing → CatchingUp → LiveTailing` state machine
//!   with a durable cursor, a process-lifetime writer lock, and cooperative
//!   shutdown via [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - [`BlockDecoder`]: raw block → [`IndexedBlock`](chainsync_core::IndexedBlock)
//! - [`EventPublisher`]: fire-and-forget notifications after each commit
//! - [`enrich`]: re-runnable program-type classification pass
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainsync_core::SyncConfig;
//! use chainsync_engine::SyncEngineBuilder;
//! use chainsync_rpc::{HttpTransport, RetryConfig, RpcChainClient};
//! use chainsync_storage::SqliteStorage;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::default();
//! let transport = HttpTransport::new(&config.rpc_url, std::time::Duration::from_secs(10))?;
//! let client = RpcChainClient::new(transport, RetryConfig::from(&config.backoff));
//! let store = Arc::new(SqliteStorage::open("./chainsync.db").await?);
//!
//! let mut engine = SyncEngineBuilder::new(config)
//!     .client(Arc::new(client))
//!     .storage(store)
//!     .build()?;
//! let report = engine.run(CancellationToken::new()).await?;
//! println!("stopped at {:?}", report.cursor);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod enrich;
pub mod metrics;
pub mod pipeline;
pub mod publisher;
pub mod sync;

pub use builder::SyncEngineBuilder;
pub use enrich::{
    classify_executions, describe_programs, DescribedProgram, EnrichReport, UNKNOWN_PROGRAM_TYPE,
};
pub use metrics::SyncMetrics;
pub use pipeline::BlockDecoder;
pub use publisher::{
    BroadcastSink, EventPublisher, EventSink, Notification, PublishError, WebhookSink,
};
pub use sync::{SyncEngine, SyncReport};
