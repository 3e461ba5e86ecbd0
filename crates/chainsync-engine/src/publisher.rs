//! Post-commit notifications.
//!
//! The engine enqueues with [`EventPublisher::publish`], which never blocks:
//! a full queue drops the notification and logs it. A background task hands
//! queued notifications to an [`EventSink`]; delivery failures are logged and
//! forgotten. Nothing here can fail or slow down a commit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use chainsync_core::record::{DomainRecord, IndexedBlock};

// ─── Notifications ────────────────────────────────────────────────────────────

fn u64_as_string<S: Serializer>(v: &u64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&v.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockNotice {
    #[serde(serialize_with = "u64_as_string")]
    pub height: u64,
    pub hash: String,
    pub tx_count: u32,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionNotice {
    pub hash: String,
    #[serde(serialize_with = "u64_as_string")]
    pub height: u64,
    pub primary_type: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositNotice {
    pub tx_hash: String,
    #[serde(serialize_with = "u64_as_string")]
    pub height: u64,
    pub sender: String,
    pub receiver: String,
    pub amount: String,
    pub denom: String,
    #[serde(serialize_with = "u64_as_string")]
    pub event_nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalNotice {
    pub tx_hash: String,
    #[serde(serialize_with = "u64_as_string")]
    pub height: u64,
    pub sender: String,
    pub destination: String,
    pub amount: String,
    pub denom: String,
    pub fee_amount: String,
}

/// A notification; serializes to its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Notification {
    NewBlock(BlockNotice),
    NewTransaction(TransactionNotice),
    NewDeposit(DepositNotice),
    NewWithdrawal(WithdrawalNotice),
}

impl Notification {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::NewBlock(_) => "new-block",
            Self::NewTransaction(_) => "new-transaction",
            Self::NewDeposit(_) => "new-deposit",
            Self::NewWithdrawal(_) => "new-withdrawal",
        }
    }

    /// Everything announced for one committed block: the block, then each
    /// transaction, then deposits and withdrawals in message order.
    pub fn for_block(block: &IndexedBlock) -> Vec<Notification> {
        let height = block.height();
        let mut out = Vec::with_capacity(1 + block.transactions.len());
        out.push(Self::NewBlock(BlockNotice {
            height,
            hash: block.block.hash.clone(),
            tx_count: block.block.tx_count,
            timestamp: block.block.timestamp.to_rfc3339(),
        }));
        out.extend(block.transactions.iter().map(|tx| {
            Self::NewTransaction(TransactionNotice {
                hash: tx.hash.clone(),
                height,
                primary_type: tx.primary_type.clone(),
                status: tx.status.to_string(),
            })
        }));
        for (msg, record) in block.records() {
            match record {
                DomainRecord::Deposit(d) => out.push(Self::NewDeposit(DepositNotice {
                    tx_hash: msg.tx_hash.clone(),
                    height,
                    sender: d.sender.clone(),
                    receiver: d.receiver.clone(),
                    amount: d.amount.clone(),
                    denom: d.denom.clone(),
                    event_nonce: d.event_nonce,
                })),
                DomainRecord::Withdrawal(w) => out.push(Self::NewWithdrawal(WithdrawalNotice {
                    tx_hash: msg.tx_hash.clone(),
                    height,
                    sender: w.sender.clone(),
                    destination: w.destination.clone(),
                    amount: w.amount.clone(),
                    denom: w.denom.clone(),
                    fee_amount: w.fee_amount.clone(),
                })),
                _ => {}
            }
        }
        out
    }
}

// ─── Sinks ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Where notifications end up.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), PublishError>;
}

/// In-process fan-out over a `tokio::sync::broadcast` channel.
pub struct BroadcastSink {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Notification>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Subscribe to the notification stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventSink for BroadcastSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), PublishError> {
        // No subscribers is not a failure.
        let _ = self.tx.send(notification.clone());
        Ok(())
    }
}

/// POSTs each notification's JSON payload to `{base_url}/{topic}`.
pub struct WebhookSink {
    base_url: String,
    http: reqwest::Client,
}

impl WebhookSink {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn endpoint(&self, topic: &str) -> String {
        format!("{}/{topic}", self.base_url)
    }
}

#[async_trait]
impl EventSink for WebhookSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), PublishError> {
        let resp = self
            .http
            .post(self.endpoint(notification.topic()))
            .json(notification)
            .send()
            .await
            .map_err(|e| PublishError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PublishError::Http(format!("HTTP {}", resp.status().as_u16())));
        }
        Ok(())
    }
}

// ─── Publisher ────────────────────────────────────────────────────────────────

/// Bounded queue in front of an [`EventSink`].
pub struct EventPublisher {
    tx: mpsc::Sender<Notification>,
    handle: JoinHandle<()>,
    dropped: Arc<AtomicU64>,
}

impl EventPublisher {
    /// Spawn the delivery task. Must be called inside a Tokio runtime.
    pub fn spawn(sink: Arc<dyn EventSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Notification>(capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = sink.deliver(&notification).await {
                    tracing::warn!(topic = notification.topic(), error = %e, "notification delivery failed");
                }
            }
        });
        Self {
            tx,
            handle,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue without waiting. Returns `false` if the notification was dropped.
    pub fn publish(&self, notification: Notification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(topic = n.topic(), "notification queue full, dropping");
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(topic = n.topic(), "notification task gone, dropping");
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting notifications and give the task up to `grace` to drain.
    pub async fn shutdown(self, grace: Duration) -> u64 {
        let Self {
            tx,
            mut handle,
            dropped,
        } = self;
        drop(tx);
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            tracing::warn!("notification task did not drain in time");
            handle.abort();
        }
        dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsync_core::record::{
        BlockRecord, Deposit, MessageBody, MessageRecord, TransactionRecord, TxStatus,
    };
    use chrono::Utc;

    fn block() -> IndexedBlock {
        IndexedBlock {
            block: BlockRecord {
                height: 9,
                hash: "0xb9".into(),
                parent_hash: "0xb8".into(),
                timestamp: Utc::now(),
                proposer: "v".into(),
                tx_count: 1,
                gas_used: 0,
                gas_wanted: 0,
                content_digest: "d".into(),
            },
            transactions: vec![TransactionRecord {
                hash: "0xt".into(),
                block_height: 9,
                tx_index: 0,
                primary_type: "/bridge.v1.MsgDeposit".into(),
                message_types: vec!["/bridge.v1.MsgDeposit".into()],
                status: TxStatus::Success,
                gas_used: 0,
                gas_wanted: 0,
                memo: String::new(),
                error_log: None,
                decode_note: None,
            }],
            messages: vec![MessageRecord {
                tx_hash: "0xt".into(),
                block_height: 9,
                msg_index: 0,
                type_url: "/bridge.v1.MsgDeposit".into(),
                body: MessageBody::Decoded {
                    module: "bridge".into(),
                    record: DomainRecord::Deposit(Deposit {
                        sender: "s".into(),
                        receiver: "r".into(),
                        amount: "18446744073709551615000".into(),
                        denom: "uatom".into(),
                        event_nonce: u64::MAX,
                    }),
                },
            }],
        }
    }

    /// Never finishes a delivery.
    struct StuckSink;

    #[async_trait]
    impl EventSink for StuckSink {
        async fn deliver(&self, _: &Notification) -> Result<(), PublishError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[test]
    fn topics_in_order() {
        let topics: Vec<_> = Notification::for_block(&block())
            .iter()
            .map(Notification::topic)
            .collect();
        assert_eq!(topics, vec!["new-block", "new-transaction", "new-deposit"]);
    }

    #[test]
    fn u64_fields_serialize_as_strings() {
        let notes = Notification::for_block(&block());
        let json = serde_json::to_value(&notes[2]).unwrap();
        assert_eq!(json["event_nonce"], "18446744073709551615");
        assert_eq!(json["height"], "9");
    }

    #[tokio::test]
    async fn broadcast_delivery() {
        let (sink, mut rx) = BroadcastSink::new(16);
        let publisher = EventPublisher::spawn(Arc::new(sink), 16);
        for n in Notification::for_block(&block()) {
            assert!(publisher.publish(n));
        }
        assert_eq!(rx.recv().await.unwrap().topic(), "new-block");
        assert_eq!(rx.recv().await.unwrap().topic(), "new-transaction");
        assert_eq!(rx.recv().await.unwrap().topic(), "new-deposit");
        assert_eq!(publisher.shutdown(Duration::from_secs(1)).await, 0);
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let publisher = EventPublisher::spawn(Arc::new(StuckSink), 1);
        let notes = Notification::for_block(&block());
        for _ in 0..10 {
            publisher.publish(notes[0].clone());
        }
        assert!(publisher.dropped() >= 8);
        publisher.shutdown(Duration::from_millis(10)).await;
    }

    #[test]
    fn webhook_endpoint_per_topic() {
        let sink = WebhookSink::new("http://hooks.local/chain/", Duration::from_secs(1)).unwrap();
        assert_eq!(sink.endpoint("new-deposit"), "http://hooks.local/chain/new-deposit");
    }
}
