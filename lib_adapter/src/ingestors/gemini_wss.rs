//! # Price Feed Ingestor
//!
//! Push-side router for the provider's market-data WebSocket. One logical
//! channel exists per distinct base/quote pair; the wire protocol carries no
//! request id, so correlation works through two pieces of owned state:
//!
//! - a reverse mapping from channel key (uppercased `BASEQUOTE` symbol) back
//!   to the last parameters subscribed under that key, recorded *before* the
//!   subscribe message ever reaches the socket, and
//! - a single last-subscribed slot used to attribute provider error frames,
//!   which carry no channel identifier at all. Under concurrent distinct
//!   subscriptions this attribution is best effort and can name the wrong
//!   pair; that is an inherent protocol limitation, kept visible here rather
//!   than papered over.
//!
//! Reverse-mapping entries are never removed on unsubscribe; their lifetime
//! is bounded by the external subscription TTL that drives renewal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::core::cache::{fingerprint, CacheEntry, ResponseCache};
use crate::core::registry::Registry;
use crate::core::response::{AdapterResponse, Timestamps};

/// Change-list tag marking an executed trade; every other tag carries no
/// actionable price update.
const TRADE_CHANGE_TYPE: &str = "sell";

/// Delay before retrying a failed provider connection.
const RECONNECT_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// A price request: base and quote symbols, already validated upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairParams {
    /// Symbol of the currency to query.
    pub base: String,
    /// Symbol of the currency to convert to.
    pub quote: String,
}

impl PairParams {
    /// Provider channel key: uppercase concatenation of base and quote.
    pub fn channel_key(&self) -> String {
        format!("{}{}", self.base, self.quote).to_uppercase()
    }
}

/// Control messages for the socket task.
#[derive(Debug, Clone)]
pub enum PairCommand {
    /// Open (or re-open) the provider channel for a pair.
    Subscribe(PairParams),
    /// Close the provider channel for a pair.
    Unsubscribe(PairParams),
}

/// Inbound provider frame. Error frames reuse the same shape with only
/// `result`/`reason` populated, so every field defaults.
#[derive(Debug, Deserialize)]
pub struct ProviderFrame {
    /// Change list; each entry is `[changeType, price, quantity]`.
    #[serde(default)]
    pub changes: Vec<(String, String, String)>,
    /// Frame type tag (`l2_updates`, ...).
    #[serde(default, rename = "type")]
    pub frame_type: String,
    /// Channel symbol the frame belongs to.
    #[serde(default)]
    pub symbol: String,
    /// `"error"` when the provider rejected something.
    #[serde(default)]
    pub result: String,
    /// Provider-supplied error reason.
    #[serde(default)]
    pub reason: String,
}

/// Push-side subscription router and socket task.
pub struct GeminiWssIngestor {
    url: String,
    registry: Arc<Registry>,
    cache: Arc<dyn ResponseCache>,
    source: String,
    reverse_map: Mutex<HashMap<String, PairParams>>,
    latest_params: Mutex<PairParams>,
}

impl GeminiWssIngestor {
    /// Wires the router to the provider endpoint, its registry and the cache.
    pub fn new(
        url: impl Into<String>,
        registry: Arc<Registry>,
        cache: Arc<dyn ResponseCache>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            registry,
            cache,
            source: source.into(),
            reverse_map: Mutex::new(HashMap::new()),
            latest_params: Mutex::new(PairParams::default()),
        }
    }

    /// Builds the outbound subscribe payload for `params`.
    ///
    /// Recording the reverse mapping and the last-subscribed slot happens
    /// here, before the message is handed to the socket: the mapping must
    /// exist before any push for the channel can possibly arrive. A new
    /// subscribe for the same channel key overwrites the prior entry.
    pub fn subscribe_message(&self, params: &PairParams) -> String {
        let symbol = params.channel_key();
        self.reverse_map
            .lock()
            .expect("reverse map lock poisoned")
            .insert(symbol.clone(), params.clone());
        *self
            .latest_params
            .lock()
            .expect("latest params lock poisoned") = params.clone();
        self.registry.register(&fingerprint(params));

        json!({
            "type": "subscribe",
            "subscriptions": [{"name": "l2", "symbols": [symbol]}],
        })
        .to_string()
    }

    /// Builds the symmetric unsubscribe payload. The reverse mapping keeps
    /// its entry; see the module docs.
    pub fn unsubscribe_message(&self, params: &PairParams) -> String {
        json!({
            "type": "unsubscribe",
            "subscriptions": [{"name": "l2", "symbols": [params.channel_key()]}],
        })
        .to_string()
    }

    /// Translates one inbound frame into at most one `(params, response)`
    /// emission. Must stay fast and non-blocking: it gates every later frame.
    ///
    /// - provider error frames become a 502 attributed to the last-subscribed
    ///   parameters (the error shape has no channel identifier),
    /// - frames whose first change is not an executed trade are dropped
    ///   silently,
    /// - frames whose symbol resolves to no known channel are logged and
    ///   dropped,
    /// - everything else becomes a 200 carrying the parsed price, stamped
    ///   with the receipt time (the feed has no provider-side timestamp).
    pub fn handle_frame(&self, raw: &str) -> Option<(PairParams, AdapterResponse)> {
        let frame: ProviderFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("unparsable provider frame: {}", e);
                return None;
            }
        };

        if frame.result == "error" {
            log::error!("data provider error: {}", frame.reason);
            let params = self
                .latest_params
                .lock()
                .expect("latest params lock poisoned")
                .clone();
            return Some((params, AdapterResponse::upstream_error(frame.reason)));
        }

        let (change_type, price, _quantity) = frame.changes.first()?;
        if change_type != TRADE_CHANGE_TYPE {
            return None;
        }

        let params = {
            let map = self.reverse_map.lock().expect("reverse map lock poisoned");
            match map.get(&frame.symbol) {
                Some(params) => params.clone(),
                None => {
                    log::error!(
                        "provider returned a pair symbol with no subscription: {:?}",
                        frame.symbol
                    );
                    return None;
                }
            }
        };

        let price: f64 = match price.parse() {
            Ok(price) => price,
            Err(_) => {
                log::warn!("unparsable price {:?} for {}", price, frame.symbol);
                return None;
            }
        };

        Some((
            params,
            AdapterResponse::success(json!(price), json!(price), Timestamps::received_now()),
        ))
    }

    fn apply_frame(&self, raw: &str) {
        if let Some((params, response)) = self.handle_frame(raw) {
            self.cache.write(
                &self.source,
                vec![CacheEntry {
                    params: serde_json::to_value(&params).expect("pair params serialize"),
                    response,
                }],
            );
        }
    }

    /// Socket task: connects to the provider, then multiplexes shutdown,
    /// subscription commands and inbound frames. Frames are handled one at a
    /// time. Connection failures log and retry after a fixed delay.
    pub async fn run(
        &self,
        mut commands: mpsc::UnboundedReceiver<PairCommand>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            if shutdown.try_recv().is_ok() {
                break;
            }

            log::info!("connecting to price feed: {}", self.url);
            match connect_async(self.url.as_str()).await {
                Ok((ws_stream, _)) => {
                    log::info!("connected to price feed");
                    let (mut write, mut read) = ws_stream.split();

                    loop {
                        tokio::select! {
                            _ = shutdown.recv() => {
                                log::info!("price ingestor shutting down");
                                let _ = write.close().await;
                                return;
                            }
                            cmd = commands.recv() => {
                                let Some(cmd) = cmd else {
                                    log::warn!("price command channel closed, stopping socket task");
                                    let _ = write.close().await;
                                    return;
                                };
                                let payload = match cmd {
                                    PairCommand::Subscribe(params) => self.subscribe_message(&params),
                                    PairCommand::Unsubscribe(params) => self.unsubscribe_message(&params),
                                };
                                log::debug!("sending control message: {}", payload);
                                if let Err(e) = write.send(Message::Text(payload.into())).await {
                                    log::error!("failed to send control message: {}", e);
                                    break; // Reconnect
                                }
                            }
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => self.apply_frame(&text),
                                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                                    Some(Ok(_)) => {}
                                    Some(Err(e)) => {
                                        log::error!("price feed read error: {}", e);
                                        break;
                                    }
                                    None => {
                                        log::warn!("price feed closed by remote host");
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    log::error!("failed to connect to price feed: {}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::{cache_key, MemoryCache};

    fn ingestor() -> (GeminiWssIngestor, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let ingestor = GeminiWssIngestor::new(
            "wss://feed.example.com/v2/marketdata",
            Arc::new(Registry::new(16).unwrap()),
            cache.clone(),
            "gemini_wss",
        );
        (ingestor, cache)
    }

    fn eth_usd() -> PairParams {
        PairParams {
            base: "ETH".into(),
            quote: "USD".into(),
        }
    }

    #[test]
    fn subscribe_builds_the_l2_payload_and_records_the_mapping() {
        let (ingestor, _) = ingestor();
        let payload = ingestor.subscribe_message(&eth_usd());
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(
            parsed,
            json!({
                "type": "subscribe",
                "subscriptions": [{"name": "l2", "symbols": ["ETHUSD"]}]
            })
        );

        // Round-trip: a frame for the derived symbol resolves back to the
        // original parameters.
        let frame = r#"{"changes":[["sell","1272.12","100"]],"type":"l2_updates","symbol":"ETHUSD"}"#;
        let (params, response) = ingestor.handle_frame(frame).expect("routable frame");
        assert_eq!(params, eth_usd());
        assert_eq!(response.status_code, 200);
        assert_eq!(response.result, Some(json!(1272.12)));
        assert!(response.timestamps.provider_data_received_unix_ms.is_some());
        assert!(response.timestamps.provider_indicated_time_unix_ms.is_none());
    }

    #[test]
    fn unsubscribe_builds_the_symmetric_payload_and_keeps_the_mapping() {
        let (ingestor, _) = ingestor();
        ingestor.subscribe_message(&eth_usd());
        let payload = ingestor.unsubscribe_message(&eth_usd());
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["type"], json!("unsubscribe"));
        assert_eq!(parsed["subscriptions"][0]["symbols"][0], json!("ETHUSD"));

        // The channel still routes after the unsubscribe was built.
        let frame = r#"{"changes":[["sell","1.00","5"]],"type":"l2_updates","symbol":"ETHUSD"}"#;
        assert!(ingestor.handle_frame(frame).is_some());
    }

    #[test]
    fn non_trade_changes_are_dropped_silently() {
        let (ingestor, _) = ingestor();
        ingestor.subscribe_message(&eth_usd());
        let frame = r#"{"changes":[["buy","1272.12","100"]],"type":"l2_updates","symbol":"ETHUSD"}"#;
        assert!(ingestor.handle_frame(frame).is_none());
        let empty = r#"{"changes":[],"type":"l2_updates","symbol":"ETHUSD"}"#;
        assert!(ingestor.handle_frame(empty).is_none());
    }

    #[test]
    fn error_frames_attribute_to_the_last_subscribed_pair() {
        let (ingestor, _) = ingestor();
        ingestor.subscribe_message(&PairParams {
            base: "BTC".into(),
            quote: "USD".into(),
        });
        ingestor.subscribe_message(&eth_usd());

        let frame = r#"{"result":"error","reason":"NoValidTradingPairs"}"#;
        let (params, response) = ingestor.handle_frame(frame).expect("one error emission");
        assert_eq!(params, eth_usd());
        assert_eq!(response.status_code, 502);
        assert_eq!(
            response.error_message.as_deref(),
            Some("NoValidTradingPairs")
        );
    }

    #[test]
    fn unknown_symbols_are_logged_and_dropped() {
        let (ingestor, _) = ingestor();
        ingestor.subscribe_message(&eth_usd());
        let frame = r#"{"changes":[["sell","9.99","1"]],"type":"l2_updates","symbol":"DOGEUSD"}"#;
        assert!(ingestor.handle_frame(frame).is_none());
    }

    #[test]
    fn resubscribing_overwrites_the_channel_entry() {
        let (ingestor, _) = ingestor();
        ingestor.subscribe_message(&PairParams {
            base: "eth".into(),
            quote: "usd".into(),
        });
        // Same channel key, different casing in the recorded parameters.
        ingestor.subscribe_message(&eth_usd());
        let frame = r#"{"changes":[["sell","2.00","1"]],"type":"l2_updates","symbol":"ETHUSD"}"#;
        let (params, _) = ingestor.handle_frame(frame).unwrap();
        assert_eq!(params, eth_usd());
    }

    #[test]
    fn actionable_frames_write_through_to_the_cache() {
        let (ingestor, cache) = ingestor();
        ingestor.subscribe_message(&eth_usd());
        ingestor.apply_frame(
            r#"{"changes":[["sell","1272.12","100"]],"type":"l2_updates","symbol":"ETHUSD"}"#,
        );

        let key = cache_key("gemini_wss", &fingerprint(&eth_usd()));
        let stored = cache.read(&key).expect("price cached");
        assert_eq!(stored.result, Some(json!(1272.12)));
        assert_eq!(stored.data.unwrap().result, json!(1272.12));

        // A non-trade frame changes nothing.
        ingestor.apply_frame(
            r#"{"changes":[["buy","1.00","100"]],"type":"l2_updates","symbol":"ETHUSD"}"#,
        );
        assert_eq!(cache.len(), 1);
    }
}
