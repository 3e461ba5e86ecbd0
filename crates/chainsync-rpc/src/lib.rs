//! chainsync-rpc: the chain client side of the indexer.
//!
//! - [`RpcTransport`]: async JSON-RPC transport trait, [`HttpTransport`] over `reqwest`
//! - [`RetryPolicy`]: bounded exponential backoff for transient failures
//! - [`ChainClient`]: typed `latest_height` / `block` / `transaction` surface,
//!   implemented by [`RpcChainClient`]
//! - [`WsHeadWatcher`]: optional WebSocket new-head subscription that wakes
//!   the engine when the tip advances

pub mod client;
pub mod error;
pub mod heads;
pub mod http;
pub mod request;
pub mod retry;
pub mod transport;

pub use client::{BlockFetch, ChainClient, RpcChainClient};
pub use error::TransportError;
pub use heads::{WsHeadWatcher, WsWatcherConfig};
pub use http::HttpTransport;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry::{RetryConfig, RetryPolicy};
pub use transport::RpcTransport;
