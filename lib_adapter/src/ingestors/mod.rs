//! # Ingestors
//!
//! The two refresh regimes. `balance_rpc` pulls: a coalescing background loop
//! re-queries every active balance request each pass. `gemini_wss` pushes:
//! a single socket task translates provider frames into cache writes,
//! correlating them back to request parameters through a reverse channel
//! mapping. The two regimes share no mutable state.

/// Pull-style balance refresh over JSON-RPC.
pub mod balance_rpc;
/// Push-style price updates over the provider WebSocket.
pub mod gemini_wss;

pub use balance_rpc::BalanceRpcIngestor;
pub use gemini_wss::GeminiWssIngestor;
