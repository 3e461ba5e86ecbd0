//! The `RpcTransport` trait: one request in, one response out.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// A single-shot JSON-RPC transport.
///
/// Transports do not retry; [`RpcChainClient`](crate::client::RpcChainClient)
/// applies the retry policy on top so every transport gets the same
/// reconnect behaviour.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// The transport's identifier (URL or name), for logs.
    fn url(&self) -> &str;
}
