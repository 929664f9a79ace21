//! # WEI Adapter Server
//!
//! Wires the adapter core together and runs it: the pull-side balance refresh
//! loop, the push-side price feed socket task, and a shared in-memory
//! response cache. The HTTP request layer that would normally register
//! incoming requests is an external collaborator; for standalone operation
//! the binary accepts seed subscriptions on the command line
//! (`--addresses`, `--pairs`).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};

use lib_adapter::config::Settings;
use lib_adapter::logger;
use lib_adapter::{
    AddressParams, BalanceRpcIngestor, GeminiWssIngestor, MemoryCache, PairCommand, PairParams,
    Registry, ResponseCache, RpcClient, TickSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::parse();
    logger::setup_logging(&settings.log_dir, &settings.log_level)?;

    log::info!(
        "starting WEI adapter (chain id {}, refresh every {} ms, capacity {})",
        settings.chain_id,
        settings.background_execute_ms,
        settings.max_active_requests
    );

    let (shutdown_tx, _) = broadcast::channel(1);
    let cache: Arc<dyn ResponseCache> = Arc::new(MemoryCache::new());

    // Pull side: balance refresh loop.
    let balance_registry = Arc::new(Registry::new(settings.max_active_requests)?);
    let rpc = RpcClient::new(&settings.ethereum_rpc_url)?;
    let balance = Arc::new(BalanceRpcIngestor::new(
        rpc,
        balance_registry,
        cache.clone(),
        "balance_rpc",
    ));
    for address in &settings.addresses {
        balance.register_request(&[AddressParams {
            address: address.clone(),
            block_height: None,
        }]);
    }
    let ticks = TickSource::interval(Duration::from_millis(settings.background_execute_ms));
    let balance_handle = {
        let ingestor = balance.clone();
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move { ingestor.run(ticks, shutdown).await })
    };

    // Push side: price feed socket task.
    let price_registry = Arc::new(Registry::new(settings.max_active_requests)?);
    let price = Arc::new(GeminiWssIngestor::new(
        settings.ws_api_endpoint.clone(),
        price_registry,
        cache.clone(),
        "gemini_wss",
    ));
    let (price_tx, price_rx) = mpsc::unbounded_channel();
    let price_handle = {
        let ingestor = price.clone();
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move { ingestor.run(price_rx, shutdown).await })
    };
    for pair in &settings.pairs {
        match pair.split_once('/') {
            Some((base, quote)) => {
                let _ = price_tx.send(PairCommand::Subscribe(PairParams {
                    base: base.to_string(),
                    quote: quote.to_string(),
                }));
            }
            None => log::warn!("ignoring malformed pair {:?}, expected BASE/QUOTE", pair),
        }
    }

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler");
                term_signal.recv().await;
                log::info!("SIGTERM received, initiating shutdown.");
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());
    // price_tx stays alive until here so the socket task only stops on shutdown
    drop(price_tx);

    // Wait for components to shut down
    let _ = tokio::try_join!(balance_handle, price_handle);

    log::info!("Shutdown complete.");
    Ok(())
}
