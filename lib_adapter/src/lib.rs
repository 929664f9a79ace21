//! # WEI Adapter Core
//!
//! Subscription-lifecycle machinery that keeps cached responses fresh against
//! two upstream data sources: a pull-style blockchain balance provider
//! (queried over JSON-RPC) and a push-style price feed (streamed over
//! WebSocket).
//!
//! The HTTP surface and input validation live outside this crate; callers are
//! expected to hand the ingestors already-validated, canonical request
//! parameters. What this crate owns is everything underneath:
//!
//! - deciding which requests are "live" and deserve continued background
//!   refresh (a bounded, insertion-ordered registry of request fingerprints),
//! - running refresh passes that never overlap and never die from a single
//!   failed fetch,
//! - correlating provider push frames back to the request parameters that
//!   caused the subscription, without any request id on the wire,
//! - writing every fresh value through a pluggable response cache.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Runtime settings, sourced from CLI arguments and environment variables.
pub mod config;
/// Registry, response cache, wire shapes, unit formatting and tick sources.
pub mod core;
/// Collection of application specific errors.
pub mod error;
/// Pull (balance JSON-RPC) and push (price WebSocket) refresh machinery.
pub mod ingestors;
/// Structured logging setup for the binaries.
pub mod logger;
/// Upstream retrieval clients.
pub mod retrieve;

// --- Public API Re-exports ---
pub use crate::core::cache::{cache_key, fingerprint, CacheEntry, MemoryCache, ResponseCache};
pub use crate::core::registry::Registry;
pub use crate::core::response::{AdapterResponse, ResponseData, Timestamps};
pub use crate::core::ticker::TickSource;
pub use crate::error::AdapterError;
pub use crate::ingestors::balance_rpc::{AddressParams, BalanceRpcIngestor};
pub use crate::ingestors::gemini_wss::{GeminiWssIngestor, PairCommand, PairParams};
pub use crate::retrieve::rpc::RpcClient;
