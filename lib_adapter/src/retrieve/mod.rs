//! # Upstream Retrieval
//!
//! HTTP clients for the pull-style data sources.

/// Ethereum JSON-RPC client used by the balance refresh paths.
pub mod rpc;

pub use rpc::RpcClient;
