//! # Price Push-Path Integration Test
//!
//! Drives the price ingestor end-to-end against a local mock WebSocket
//! server speaking the provider protocol: subscribe routing, price frame
//! write-through, error-frame attribution, and shutdown.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lib_adapter::{
    cache_key, fingerprint, GeminiWssIngestor, MemoryCache, PairCommand, PairParams, Registry,
    ResponseCache,
};
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::protocol::Message;

/// Starts a mock provider WebSocket server. Subscribes to a known-good pair
/// get one trade frame back; the deliberately bogus `BTC1USD` symbol gets the
/// provider error shape; unsubscribes get nothing.
async fn spawn_mock_feed() -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else { continue };
                    let Ok(request) = serde_json::from_str::<serde_json::Value>(&text) else {
                        continue;
                    };
                    if request["type"] != json!("subscribe") {
                        continue;
                    }
                    let symbol = request["subscriptions"][0]["symbols"][0]
                        .as_str()
                        .unwrap_or_default()
                        .to_string();
                    let reply = if symbol == "BTC1USD" {
                        json!({"result": "error", "reason": "NoValidTradingPairs"})
                    } else {
                        json!({
                            "changes": [["sell", "1272.12", "100"]],
                            "type": "l2_updates",
                            "symbol": symbol,
                        })
                    };
                    if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    Ok(format!("ws://{}", addr))
}

/// Polls the cache until `key` appears or the deadline passes.
async fn wait_for_entry(cache: &MemoryCache, key: &str) -> bool {
    for _ in 0..150 {
        if cache.read(key).is_some() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let feed_url = spawn_mock_feed().await?;
    println!("--- Price Flow Tests (mock feed at {}) ---", feed_url);

    let registry = Arc::new(Registry::new(16)?);
    let cache = Arc::new(MemoryCache::new());
    let ingestor = Arc::new(GeminiWssIngestor::new(
        feed_url,
        registry.clone(),
        cache.clone(),
        "gemini_wss",
    ));

    let (shutdown_tx, _) = broadcast::channel(1);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let socket_task = {
        let ingestor = ingestor.clone();
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move { ingestor.run(command_rx, shutdown).await })
    };

    // --- TEST 1: subscribe, receive a trade frame, find it in the cache ---
    let eth_usd = PairParams {
        base: "ETH".into(),
        quote: "USD".into(),
    };
    command_tx.send(PairCommand::Subscribe(eth_usd.clone()))?;

    let eth_key = cache_key("gemini_wss", &fingerprint(&eth_usd));
    assert!(
        wait_for_entry(&cache, &eth_key).await,
        "price frame never reached the cache"
    );
    let stored = cache.read(&eth_key).unwrap();
    assert_eq!(stored.status_code, 200);
    assert_eq!(stored.result, Some(json!(1272.12)));
    assert!(stored.timestamps.provider_data_received_unix_ms.is_some());
    assert!(registry.contains(&fingerprint(&eth_usd)));
    println!("✅ ETHUSD trade frame routed back to {{ETH, USD}} and cached");

    // --- TEST 2: provider error frame attributed to the latest subscription ---
    let bogus = PairParams {
        base: "BTC1".into(),
        quote: "USD".into(),
    };
    command_tx.send(PairCommand::Subscribe(bogus.clone()))?;

    let bogus_key = cache_key("gemini_wss", &fingerprint(&bogus));
    assert!(
        wait_for_entry(&cache, &bogus_key).await,
        "error frame never reached the cache"
    );
    let stored = cache.read(&bogus_key).unwrap();
    assert_eq!(stored.status_code, 502);
    assert_eq!(stored.error_message.as_deref(), Some("NoValidTradingPairs"));
    println!("✅ Channel-less error frame attributed to the last-subscribed pair");

    // --- TEST 3: unsubscribe is sent without killing the stream ---
    command_tx.send(PairCommand::Unsubscribe(eth_usd.clone()))?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        !socket_task.is_finished(),
        "socket task must survive an unsubscribe"
    );
    println!("✅ Unsubscribe built and sent, socket task still running");

    // --- TEST 4: shutdown stops the socket task ---
    let _ = shutdown_tx.send(());
    tokio::time::timeout(Duration::from_secs(5), socket_task).await??;
    println!("✅ Socket task stopped on shutdown");

    println!("--- All price flow tests passed ---");
    Ok(())
}
