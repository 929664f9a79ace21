//! # Balance Pull-Path Integration Test
//!
//! Drives the balance ingestor end-to-end against a local mock JSON-RPC
//! server: foreground fetch on a cache miss, cache-hit short-circuit, and a
//! background refresh pass where one request fails while another succeeds
//! (failure isolation).

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use lib_adapter::{
    cache_key, fingerprint, AddressParams, BalanceRpcIngestor, MemoryCache, Registry,
    ResponseCache, RpcClient,
};
use serde_json::json;

const GOOD_ADDRESS_1: &str = "0x103b66487784f6e3b4c5b2aca92758198554c3e1";
const GOOD_ADDRESS_2: &str = "0x742d35cc6634c0532925a3b844bc454e4438f44e";
const BAD_ADDRESS: &str = "0xbad0000000000000000000000000000000000bad";

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Reads one HTTP request off the stream and returns its body.
fn read_request_body(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        let n = stream.read(&mut tmp).unwrap_or(0);
        if n == 0 {
            return String::new();
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let body_start = pos + 4;
            while buf.len() < body_start + content_length {
                let n = stream.read(&mut tmp).unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&tmp[..n]);
            }
            return String::from_utf8_lossy(&buf[body_start..]).to_string();
        }
    }
}

/// Starts a mock JSON-RPC server on a random local port. Balances come from
/// the provider fixtures; the "bad" address yields an RPC error body.
fn spawn_mock_rpc() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock RPC server");
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            thread::spawn(move || {
                let body = read_request_body(&mut stream);
                let payload = if body.contains(GOOD_ADDRESS_1) {
                    json!({"jsonrpc": "2.0", "id": 1, "result": "0xcad022c33a96152a"})
                } else if body.contains(GOOD_ADDRESS_2) {
                    json!({"jsonrpc": "2.0", "id": 1, "result": "0x0ad8655682813b7b"})
                } else {
                    json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "header not found"}})
                }
                .to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    payload.len(),
                    payload
                );
                let _ = stream.write_all(response.as_bytes());
            });
        }
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rpc_url = spawn_mock_rpc();
    println!("--- Balance Flow Tests (mock RPC at {}) ---", rpc_url);

    let registry = Arc::new(Registry::new(16)?);
    let cache = Arc::new(MemoryCache::new());
    let ingestor = BalanceRpcIngestor::new(
        RpcClient::new(&rpc_url)?,
        registry.clone(),
        cache.clone(),
        "balance_rpc",
    );

    let addresses = vec![
        AddressParams {
            address: GOOD_ADDRESS_1.to_string(),
            block_height: None,
        },
        AddressParams {
            address: GOOD_ADDRESS_2.to_string(),
            block_height: Some(20_540_144),
        },
    ];

    // --- TEST 1: foreground fetch on a cache miss ---
    ingestor.register_request(&addresses);
    let response = ingestor.foreground_execute(&addresses).await?;
    assert_eq!(response.status_code, 200);
    assert_eq!(response.result, Some(json!("15.40")));
    let items = response.data.clone().unwrap().result;
    assert_eq!(items[0]["balance"], json!("14.61"));
    assert_eq!(items[1]["balance"], json!("0.78"));
    println!("✅ Foreground fetch aggregates 14.61 + 0.78 = 15.40");

    // --- TEST 2: the second request is served from the cache ---
    let cached = ingestor.foreground_execute(&addresses).await?;
    assert_eq!(cached, response, "cache hit must return the stored response");
    println!("✅ Cache hit short-circuits the upstream fetch");

    // --- TEST 3: pass isolation ---
    // A second registered request fails upstream; the good one must still
    // refresh in the same pass.
    let failing = vec![AddressParams {
        address: BAD_ADDRESS.to_string(),
        block_height: None,
    }];
    ingestor.register_request(&failing);
    assert_eq!(registry.len(), 2);

    ingestor.refresh_pass().await;

    let good_key = cache_key("balance_rpc", &fingerprint(&addresses));
    let bad_key = cache_key("balance_rpc", &fingerprint(&failing));
    let refreshed = cache.read(&good_key).expect("good request stays cached");
    assert_eq!(refreshed.result, Some(json!("15.40")));
    assert!(
        cache.read(&bad_key).is_none(),
        "failed request must not produce a cache entry"
    );
    println!("✅ One failing request does not stall or poison the pass");

    // --- TEST 4: foreground failure surfaces as an upstream error ---
    let err = ingestor
        .foreground_execute(&failing)
        .await
        .expect_err("no stale value to fall back to");
    assert_eq!(err.status_code(), 502);
    println!("✅ Foreground miss + upstream failure maps to 502: {}", err);

    println!("--- All balance flow tests passed ---");
    Ok(())
}
