//! # Ethereum JSON-RPC Client
//!
//! A thin `eth_getBalance` client on top of `reqwest`, wrapped with
//! exponential-backoff retry middleware. One call per address; the optional
//! block height selects a historical state, otherwise `latest` applies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use num_bigint::BigUint;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::AdapterError;

/// Per-request timeout; a hung fetch must stall only its own fingerprint for
/// the current pass, never the whole pass.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct RpcReply {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC client for the balance data provider.
pub struct RpcClient {
    inner: ClientWithMiddleware,
    endpoint: Url,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Builds a client for `endpoint` with a retry policy of three attempts
    /// and a 10 second per-request timeout.
    pub fn new(endpoint: &str) -> Result<Self, AdapterError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AdapterError::Config(format!("invalid RPC endpoint: {}", e)))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AdapterError::Config(format!("failed to build HTTP client: {}", e)))?;
        let inner = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner,
            endpoint,
            next_id: AtomicU64::new(1),
        })
    }

    /// Fetches the base-unit balance of `address`, at `block_height` when
    /// given, at the chain head otherwise.
    pub async fn get_balance(
        &self,
        address: &str,
        block_height: Option<u64>,
    ) -> Result<BigUint, AdapterError> {
        let block_tag = match block_height {
            Some(height) => format!("{:#x}", height),
            None => "latest".to_string(),
        };
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "eth_getBalance",
            "params": [address.to_lowercase(), block_tag],
        });

        let response = self
            .inner
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Upstream(format!("RPC request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Upstream(format!(
                "RPC endpoint returned HTTP {}",
                status
            )));
        }

        let reply: RpcReply = response
            .json()
            .await
            .map_err(|e| AdapterError::Upstream(format!("unparsable RPC reply: {}", e)))?;

        if let Some(err) = reply.error {
            return Err(AdapterError::Upstream(format!(
                "RPC error {}: {}",
                err.code, err.message
            )));
        }
        let quantity = reply.result.ok_or_else(|| {
            AdapterError::Upstream("RPC reply carried neither result nor error".into())
        })?;
        parse_hex_quantity(&quantity)
    }
}

/// Parses an `0x`-prefixed hex quantity into a `BigUint`. An empty quantity
/// (`0x`) counts as zero.
pub fn parse_hex_quantity(quantity: &str) -> Result<BigUint, AdapterError> {
    let digits = quantity
        .strip_prefix("0x")
        .or_else(|| quantity.strip_prefix("0X"))
        .unwrap_or(quantity);
    if digits.is_empty() {
        return Ok(BigUint::default());
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| AdapterError::Upstream(format!("invalid hex quantity {:?}", quantity)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixture_quantities() {
        assert_eq!(
            parse_hex_quantity("0xcad022c33a96152a").unwrap(),
            BigUint::from(14_614_219_012_714_140_970u128)
        );
        assert_eq!(
            parse_hex_quantity("0x0ad8655682813b7b").unwrap(),
            BigUint::from(781_485_957_579_881_339u128)
        );
    }

    #[test]
    fn empty_and_zero_quantities_are_zero() {
        assert_eq!(parse_hex_quantity("0x").unwrap(), BigUint::default());
        assert_eq!(parse_hex_quantity("0x0").unwrap(), BigUint::default());
    }

    #[test]
    fn garbage_quantities_are_upstream_errors() {
        assert!(parse_hex_quantity("0xzz").is_err());
        assert!(parse_hex_quantity("").is_ok()); // no digits at all is zero
    }

    #[test]
    fn rejects_bad_endpoints_at_construction() {
        assert!(RpcClient::new("not a url").is_err());
        assert!(RpcClient::new("https://rpc.example.com").is_ok());
    }
}
