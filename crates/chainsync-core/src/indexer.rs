//! Indexer configuration and state types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::IndexerError;

/// Reconnect / retry backoff bounds for the chain client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Retries after the first attempt before an error is surfaced.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 10_000,
        }
    }
}

impl BackoffConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Where and how post-commit notifications are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// POST each notification to `<webhook_url>/<topic>`. `None` keeps
    /// notifications in-process only.
    pub webhook_url: Option<String>,
    /// Bounded queue between the engine and the publish task.
    pub channel_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            channel_capacity: 1024,
        }
    }
}

/// Configuration for one indexer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Chain label, used in logs.
    pub chain: String,
    /// Node JSON-RPC endpoint.
    pub rpc_url: String,
    /// Optional WebSocket endpoint for new-head push notifications.
    pub ws_url: Option<String>,
    /// Storage URL (`sqlite:…`, `postgres://…`, or `memory`).
    pub database_url: String,
    /// First height to index on a fresh store.
    pub start_height: u64,
    /// Stop after committing this height. `None` = run forever.
    pub stop_height: Option<u64>,
    /// Live-tail polling interval (milliseconds).
    pub poll_interval_ms: u64,
    /// How long to wait for the node at startup (milliseconds).
    pub ready_timeout_ms: u64,
    pub backoff: BackoffConfig,
    /// Identifier of the single-writer lock.
    pub lock_id: String,
    /// Lease TTL for lease-based locks (seconds).
    pub lock_ttl_secs: u64,
    /// External byte-code decode service, used at read time only.
    pub program_decoder_url: Option<String>,
    pub program_decoder_timeout_ms: u64,
    pub publisher: PublisherConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chain: "cosmos".into(),
            rpc_url: "http://127.0.0.1:26657".into(),
            ws_url: None,
            database_url: "sqlite:./chainsync.db?mode=rwc".into(),
            start_height: 1,
            stop_height: None,
            poll_interval_ms: 1000,
            ready_timeout_ms: 30_000,
            backoff: BackoffConfig::default(),
            lock_id: "chainsync-writer".into(),
            lock_ttl_secs: 30,
            program_decoder_url: None,
            program_decoder_timeout_ms: 2000,
            publisher: PublisherConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    /// How often a lease-based lock is renewed.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs((self.lock_ttl_secs / 3).max(1))
    }

    pub fn program_decoder_timeout(&self) -> Duration {
        Duration::from_millis(self.program_decoder_timeout_ms)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.rpc_url.trim().is_empty() {
            return Err(IndexerError::Config("rpc_url must not be empty".into()));
        }
        if self.database_url.trim().is_empty() {
            return Err(IndexerError::Config("database_url must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(IndexerError::Config("poll_interval_ms must be > 0".into()));
        }
        if let Some(stop) = self.stop_height {
            if stop < self.start_height {
                return Err(IndexerError::Config(format!(
                    "stop_height {stop} is below start_height {}",
                    self.start_height
                )));
            }
        }
        if self.backoff.initial_backoff_ms > self.backoff.max_backoff_ms {
            return Err(IndexerError::Config(
                "backoff.initial_backoff_ms exceeds backoff.max_backoff_ms".into(),
            ));
        }
        if self.lock_id.trim().is_empty() {
            return Err(IndexerError::Config("lock_id must not be empty".into()));
        }
        if self.lock_ttl_secs < 3 {
            return Err(IndexerError::Config("lock_ttl_secs must be at least 3".into()));
        }
        if self.publisher.channel_capacity == 0 {
            return Err(IndexerError::Config(
                "publisher.channel_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Runtime state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Taking the lock, loading the cursor, waiting for the node.
    Initializing,
    /// Sequentially ingesting blocks until the node reports the tip.
    CatchingUp,
    /// At the tip; waiting for each new block.
    LiveTailing,
    /// Stopped cleanly (shutdown signal or stop height reached).
    Stopped,
    /// Unrecoverable error; the process is expected to exit.
    Error,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::CatchingUp => write!(f, "catching-up"),
            Self::LiveTailing => write!(f, "live-tailing"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        SyncConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_stop_below_start() {
        let cfg = SyncConfig {
            start_height: 100,
            stop_height: Some(99),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(IndexerError::Config(_))));
    }

    #[test]
    fn rejects_inverted_backoff() {
        let cfg = SyncConfig {
            backoff: BackoffConfig {
                max_retries: 3,
                initial_backoff_ms: 5000,
                max_backoff_ms: 100,
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_yaml_like_input_fills_defaults() {
        let cfg: SyncConfig =
            serde_json::from_str(r#"{"rpc_url":"http://node:26657","start_height":42}"#).unwrap();
        assert_eq!(cfg.start_height, 42);
        assert_eq!(cfg.poll_interval_ms, 1000);
        assert_eq!(cfg.lock_id, "chainsync-writer");
        assert_eq!(cfg.backoff.max_retries, 5);
    }

    #[test]
    fn heartbeat_is_a_third_of_ttl() {
        let cfg = SyncConfig {
            lock_ttl_secs: 30,
            ..Default::default()
        };
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(10));
    }

    #[test]
    fn state_display() {
        assert_eq!(SyncState::CatchingUp.to_string(), "catching-up");
        assert_eq!(SyncState::LiveTailing.to_string(), "live-tailing");
    }
}
