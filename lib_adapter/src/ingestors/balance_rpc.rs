//! # Balance Refresh Ingestor
//!
//! Keeps cached balance responses fresh for every active request. A request's
//! parameters are an ordered list of `(address, optional block height)`
//! pairs; its fingerprint doubles as the registry entry and, parsed back, as
//! the work item of the background pass.
//!
//! Failure isolation: one fingerprint failing to refresh is logged and
//! skipped; the pass continues and the previously cached value stays
//! authoritative until the next successful refresh. Only the foreground
//! cache-miss path surfaces upstream errors to the caller, because there is
//! no prior value to fall back to there.

use std::sync::Arc;

use futures_util::future::{join_all, try_join_all};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::core::cache::{cache_key, fingerprint, CacheEntry, ResponseCache};
use crate::core::registry::Registry;
use crate::core::response::{AdapterResponse, Timestamps};
use crate::core::ticker::TickSource;
use crate::core::units::format_amount;
use crate::error::AdapterError;
use crate::retrieve::rpc::RpcClient;

/// One address of a balance request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressParams {
    /// Account address to query.
    pub address: String,
    /// Historical block height; absent means latest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
}

/// Pull-side refresh machinery for balance requests.
pub struct BalanceRpcIngestor {
    rpc: RpcClient,
    registry: Arc<Registry>,
    cache: Arc<dyn ResponseCache>,
    source: String,
}

impl BalanceRpcIngestor {
    /// Wires the ingestor to its upstream client, registry and cache.
    /// `source` names this ingestor's partition of the cache keyspace.
    pub fn new(
        rpc: RpcClient,
        registry: Arc<Registry>,
        cache: Arc<dyn ResponseCache>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            rpc,
            registry,
            cache,
            source: source.into(),
        }
    }

    /// Records a request as live. Called on every incoming request; repeated
    /// registration keeps the entry alive without reordering it.
    pub fn register_request(&self, addresses: &[AddressParams]) {
        self.registry.register(&fingerprint(&addresses));
    }

    /// Background loop: one refresh pass per tick, passes never overlap,
    /// ticks fired mid-pass are coalesced.
    pub async fn run(&self, mut ticks: TickSource, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    log::info!("balance ingestor shutting down");
                    break;
                }
                alive = ticks.tick() => {
                    if !alive {
                        log::warn!("balance tick source closed, stopping refresh loop");
                        break;
                    }
                    self.refresh_pass().await;
                    ticks.coalesce();
                }
            }
        }
    }

    /// One whole refresh pass over a snapshot of the active set. Every
    /// fingerprint refreshes concurrently; a failure affects only its own
    /// fingerprint.
    pub async fn refresh_pass(&self) {
        let active = self.registry.snapshot();
        if active.is_empty() {
            return;
        }
        log::debug!("refreshing {} active balance request(s)", active.len());
        join_all(active.iter().map(|fp| self.refresh_fingerprint(fp))).await;
    }

    async fn refresh_fingerprint(&self, fp: &str) {
        let addresses: Vec<AddressParams> = match serde_json::from_str(fp) {
            Ok(addresses) => addresses,
            Err(e) => {
                log::error!("registry held an undecodable fingerprint {}: {}", fp, e);
                return;
            }
        };
        match self.fetch_response(&addresses).await {
            Ok(response) => self.write_through(&addresses, response),
            Err(e) => {
                // Stale cache entry stays authoritative until the next pass.
                log::error!("error updating balances for request {}: {}", fp, e);
            }
        }
    }

    /// Foreground path: cache first, synchronous fetch only on a miss. An
    /// upstream failure here propagates, there is no stale value to serve.
    pub async fn foreground_execute(
        &self,
        addresses: &[AddressParams],
    ) -> Result<AdapterResponse, AdapterError> {
        let key = cache_key(&self.source, &fingerprint(&addresses));
        if let Some(cached) = self.cache.read(&key) {
            return Ok(cached);
        }

        let response = self
            .fetch_response(addresses)
            .await
            .map_err(|e| AdapterError::Upstream(format!("error fetching balances: {}", e)))?;
        self.write_through(addresses, response.clone());
        Ok(response)
    }

    /// Fetches every address of one request concurrently and assembles the
    /// aggregate response. Any single failed address fails the request as a
    /// unit.
    async fn fetch_response(
        &self,
        addresses: &[AddressParams],
    ) -> Result<AdapterResponse, AdapterError> {
        let balances = try_join_all(
            addresses
                .iter()
                .map(|a| self.rpc.get_balance(&a.address, a.block_height)),
        )
        .await?;
        Ok(build_response(addresses, &balances))
    }

    fn write_through(&self, addresses: &[AddressParams], response: AdapterResponse) {
        self.cache.write(
            &self.source,
            vec![CacheEntry {
                params: serde_json::to_value(addresses).expect("address params serialize"),
                response,
            }],
        );
    }
}

/// Assembles the response for one request: per-address results in input
/// order, plus the formatted arbitrary-precision sum as the aggregate result.
pub fn build_response(addresses: &[AddressParams], balances: &[BigUint]) -> AdapterResponse {
    let results: Vec<Value> = addresses
        .iter()
        .zip(balances)
        .map(|(params, balance)| {
            json!({
                "address": params.address,
                "balance": format_amount(balance),
            })
        })
        .collect();
    let total: BigUint = balances.iter().sum();

    AdapterResponse::success(
        json!(format_amount(&total)),
        Value::Array(results),
        Timestamps::requested_and_received_now(),
    )
}
