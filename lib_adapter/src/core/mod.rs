//! # Core Bookkeeping
//!
//! The data structures shared by both refresh regimes: the bounded FIFO
//! registry of active request fingerprints, the response cache contract, the
//! wire-shape response types, base-unit formatting, and the tick source that
//! drives background passes.

/// Response cache contract, fingerprinting and the in-memory default store.
pub mod cache;
/// Bounded, insertion-ordered set of active request fingerprints.
pub mod registry;
/// Wire-shape response and timestamp types.
pub mod response;
/// Tick sources driving the coalescing background refresh loop.
pub mod ticker;
/// Base-unit (wei) to decimal-string conversion.
pub mod units;

pub use cache::{CacheEntry, MemoryCache, ResponseCache};
pub use registry::Registry;
pub use response::{AdapterResponse, ResponseData, Timestamps};
pub use ticker::TickSource;
