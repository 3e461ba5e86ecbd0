//! The typed chain client the sync engine talks to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use chainsync_core::types::{RawBlock, RawTransaction};

use crate::error::TransportError;
use crate::request::{JsonRpcError, JsonRpcRequest};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::transport::RpcTransport;

/// Error code nodes use when asked for a height past their tip.
pub const HEIGHT_NOT_AVAILABLE: i64 = -32001;

const READY_PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// Result of asking the node for a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockFetch {
    Available(RawBlock),
    /// The height is beyond the node's tip. Not an error.
    NotYetAvailable,
}

/// Read-only view of the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The node's current tip height.
    async fn latest_height(&self) -> Result<u64, TransportError>;

    /// Fetch the block at `height` with its transactions and messages.
    async fn block(&self, height: u64) -> Result<BlockFetch, TransportError>;

    /// Fetch one transaction by hash.
    async fn transaction(&self, hash: &str) -> Result<Option<RawTransaction>, TransportError>;

    /// Poll `latest_height` until the node answers or `timeout` elapses.
    /// A probe still in flight at the deadline is abandoned.
    async fn wait_ready(&self, timeout: Duration) -> Result<u64, TransportError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let not_ready = |reason: String| TransportError::NotReady {
            waited_ms: timeout.as_millis() as u64,
            reason,
        };
        loop {
            let err = match tokio::time::timeout_at(deadline, self.latest_height()).await {
                Ok(Ok(height)) => return Ok(height),
                Ok(Err(e)) => e,
                Err(_) => return Err(not_ready("no answer before the deadline".into())),
            };
            if tokio::time::Instant::now() + READY_PROBE_INTERVAL > deadline {
                return Err(not_ready(err.to_string()));
            }
            tracing::debug!(error = %err, "node not ready yet");
            tokio::time::sleep(READY_PROBE_INTERVAL).await;
        }
    }
}

/// [`ChainClient`] over any JSON-RPC transport.
///
/// Transient transport failures are retried with bounded exponential backoff;
/// the last error surfaces once the policy is exhausted.
pub struct RpcChainClient<T: RpcTransport> {
    transport: T,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl<T: RpcTransport> RpcChainClient<T> {
    pub fn new(transport: T, retry: RetryConfig) -> Self {
        Self {
            transport,
            retry: RetryPolicy::new(retry),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let req = JsonRpcRequest::new(id, method, params.clone());
            let err = match self.transport.send(req).await {
                Ok(resp) => return resp.into_result().map_err(TransportError::Rpc),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };
            match self.retry.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        attempt,
                        method,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        url = %self.transport.url(),
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(
                        attempt,
                        method,
                        error = %err,
                        url = %self.transport.url(),
                        "max retries exceeded"
                    );
                    return Err(err);
                }
            }
        }
    }
}

#[async_trait]
impl<T: RpcTransport> ChainClient for RpcChainClient<T> {
    async fn latest_height(&self) -> Result<u64, TransportError> {
        let value = self.call("chain_latestHeight", vec![]).await?;
        parse_height(&value)
            .ok_or_else(|| TransportError::Other(format!("invalid height in response: {value}")))
    }

    async fn block(&self, height: u64) -> Result<BlockFetch, TransportError> {
        let value = match self
            .call("chain_getBlockByHeight", vec![Value::from(height)])
            .await
        {
            Ok(v) => v,
            Err(TransportError::Rpc(ref e)) if is_beyond_tip(e) => {
                return Ok(BlockFetch::NotYetAvailable)
            }
            Err(e) => return Err(e),
        };
        if value.is_null() {
            return Ok(BlockFetch::NotYetAvailable);
        }
        // Height continuity is checked by the engine, not here.
        let block: RawBlock = serde_json::from_value(value)?;
        Ok(BlockFetch::Available(block))
    }

    async fn transaction(&self, hash: &str) -> Result<Option<RawTransaction>, TransportError> {
        let value = self
            .call("chain_getTransaction", vec![Value::from(hash)])
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }
}

fn is_beyond_tip(err: &JsonRpcError) -> bool {
    err.code == HEIGHT_NOT_AVAILABLE
        || err
            .message
            .contains("must be less than or equal to the current blockchain height")
}

/// Accepts a JSON number, a decimal string, or a `0x` hex string.
pub fn parse_height(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        Value::Object(map) => map.get("height").and_then(parse_height),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{JsonRpcResponse, RpcId};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results and records the methods it was called with.
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Value, TransportError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<Value, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            self.calls.lock().unwrap().push(req.method.clone());
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())));
            match next {
                Ok(result) => Ok(JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id: req.id,
                    result: Some(result),
                    error: None,
                }),
                Err(TransportError::Rpc(e)) => Ok(JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id: RpcId::Null,
                    result: None,
                    error: Some(e),
                }),
                Err(e) => Err(e),
            }
        }

        fn url(&self) -> &str {
            "mock://node"
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    fn block_json(height: u64) -> Value {
        serde_json::json!({
            "height": height,
            "hash": format!("0xhash{height}"),
            "parent_hash": format!("0xhash{}", height - 1),
            "timestamp": "2024-01-01T00:00:00Z",
            "proposer": "val1",
            "txs": []
        })
    }

    #[tokio::test]
    async fn latest_height_accepts_string() {
        let client = RpcChainClient::new(
            ScriptedTransport::new(vec![Ok(Value::from("42"))]),
            fast_retry(0),
        );
        assert_eq!(client.latest_height().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn null_block_is_not_yet_available() {
        let client = RpcChainClient::new(
            ScriptedTransport::new(vec![Ok(Value::Null)]),
            fast_retry(0),
        );
        assert_eq!(client.block(9).await.unwrap(), BlockFetch::NotYetAvailable);
    }

    #[tokio::test]
    async fn beyond_tip_error_is_not_yet_available() {
        let client = RpcChainClient::new(
            ScriptedTransport::new(vec![Err(TransportError::Rpc(JsonRpcError {
                code: -32603,
                message: "height 9 must be less than or equal to the current blockchain height 8"
                    .into(),
                data: None,
            }))]),
            fast_retry(0),
        );
        assert_eq!(client.block(9).await.unwrap(), BlockFetch::NotYetAvailable);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Http("connection reset".into())),
            Err(TransportError::Timeout { ms: 5 }),
            Ok(block_json(3)),
        ]);
        let client = RpcChainClient::new(transport, fast_retry(3));
        match client.block(3).await.unwrap() {
            BlockFetch::Available(b) => assert_eq!(b.height, 3),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(client.transport().calls().len(), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Http("down".into())),
            Err(TransportError::Http("down".into())),
            Err(TransportError::Http("down".into())),
        ]);
        let client = RpcChainClient::new(transport, fast_retry(2));
        let err = client.latest_height().await.unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
        assert_eq!(client.transport().calls().len(), 3);
    }

    #[tokio::test]
    async fn rpc_errors_are_not_retried() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::Rpc(JsonRpcError {
            code: -32601,
            message: "method not found".into(),
            data: None,
        }))]);
        let client = RpcChainClient::new(transport, fast_retry(5));
        assert!(matches!(
            client.latest_height().await,
            Err(TransportError::Rpc(_))
        ));
        assert_eq!(client.transport().calls(), vec!["chain_latestHeight"]);
    }

    #[tokio::test]
    async fn missing_transaction_is_none() {
        let client = RpcChainClient::new(
            ScriptedTransport::new(vec![Ok(Value::Null)]),
            fast_retry(0),
        );
        assert!(client.transaction("0xabc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wait_ready_gives_up_after_timeout() {
        let client = RpcChainClient::new(ScriptedTransport::new(vec![]), fast_retry(0));
        let err = client
            .wait_ready(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotReady { .. }));
    }

    /// Never answers.
    struct SilentNode;

    #[async_trait]
    impl ChainClient for SilentNode {
        async fn latest_height(&self) -> Result<u64, TransportError> {
            std::future::pending().await
        }

        async fn block(&self, _height: u64) -> Result<BlockFetch, TransportError> {
            std::future::pending().await
        }

        async fn transaction(&self, _hash: &str) -> Result<Option<RawTransaction>, TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn wait_ready_abandons_a_hung_probe() {
        let started = tokio::time::Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            SilentNode.wait_ready(Duration::from_millis(100)),
        )
        .await
        .expect("wait_ready must honour its own timeout");
        assert!(matches!(outcome, Err(TransportError::NotReady { waited_ms: 100, .. })));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn parse_height_forms() {
        assert_eq!(parse_height(&Value::from(7u64)), Some(7));
        assert_eq!(parse_height(&Value::from("0x10")), Some(16));
        assert_eq!(parse_height(&serde_json::json!({"height": "12"})), Some(12));
        assert_eq!(parse_height(&Value::Bool(true)), None);
    }
}
