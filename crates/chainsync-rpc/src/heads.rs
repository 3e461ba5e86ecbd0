//! New-head subscription over WebSocket.
//!
//! The watcher owns a background task that keeps a `chain_subscribeNewHeads`
//! subscription open, reconnecting with backoff, and publishes the highest
//! tip seen on a `watch` channel. The engine uses it only as a wake-up
//! signal while live-tailing; polling stays the source of truth.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

use crate::client::parse_height;

/// Reconnect settings for [`WsHeadWatcher`].
#[derive(Debug, Clone)]
pub struct WsWatcherConfig {
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl Default for WsWatcherConfig {
    fn default() -> Self {
        Self {
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(60),
        }
    }
}

/// Background new-head subscriber. Dropping it stops the task.
pub struct WsHeadWatcher {
    rx: watch::Receiver<u64>,
    handle: JoinHandle<()>,
}

impl WsHeadWatcher {
    pub fn spawn(url: impl Into<String>, config: WsWatcherConfig) -> Self {
        let (tx, rx) = watch::channel(0u64);
        let handle = tokio::spawn(watch_loop(url.into(), tx, config));
        Self { rx, handle }
    }

    /// A receiver that changes whenever a higher tip is announced.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rx.clone()
    }
}

impl Drop for WsHeadWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn watch_loop(url: String, tx: watch::Sender<u64>, config: WsWatcherConfig) {
    let mut backoff = config.reconnect_initial;

    loop {
        if tx.is_closed() {
            return;
        }
        tracing::info!(url = %url, "subscribing to new heads");

        let (ws_stream, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "WS connect failed, retrying in {backoff:?}");
                time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.reconnect_max);
                continue;
            }
        };
        backoff = config.reconnect_initial;
        let (mut sink, mut stream) = ws_stream.split();

        let subscribe = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "chain_subscribeNewHeads",
            "params": [],
            "id": 1
        });
        if sink
            .send(Message::Text(subscribe.to_string().into()))
            .await
            .is_err()
        {
            tracing::warn!(url = %url, "WS subscribe failed, retrying in {backoff:?}");
            time::sleep(backoff).await;
            continue;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => return,
                msg = stream.next() => match msg {
                    None => break,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WS receive error");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Some(height) = head_height(text.as_str()) {
                            tx.send_if_modified(|tip| {
                                if height > *tip {
                                    *tip = height;
                                    true
                                } else {
                                    false
                                }
                            });
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    _ => {}
                },
            }
        }

        tracing::warn!(url = %url, "WS disconnected, reconnecting in {backoff:?}");
        time::sleep(backoff).await;
        backoff = (backoff * 2).min(config.reconnect_max);
    }
}

/// Extracts the announced height from a `chain_subscription` notification.
fn head_height(text: &str) -> Option<u64> {
    let val: Value = serde_json::from_str(text).ok()?;
    if val.get("method").and_then(Value::as_str) != Some("chain_subscription") {
        return None;
    }
    parse_height(val.get("params")?.get("result")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_height_from_notification() {
        let text = r#"{"jsonrpc":"2.0","method":"chain_subscription","params":{"subscription":"s1","result":{"height":"120","hash":"0xab"}}}"#;
        assert_eq!(head_height(text), Some(120));
    }

    #[test]
    fn ignores_subscription_ack() {
        assert_eq!(head_height(r#"{"jsonrpc":"2.0","id":1,"result":"s1"}"#), None);
        assert_eq!(head_height("not json"), None);
    }
}
