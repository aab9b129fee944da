//! ballotindex-sui: Sui JSON-RPC event source and config builder.

pub mod builder;
pub mod client;
pub mod retry;
pub mod rpc;

pub use builder::IndexerBuilder;
pub use client::{SuiClientConfig, SuiRpcClient};
pub use retry::{RetryConfig, RetryPolicy};
pub use rpc::TransportError;
