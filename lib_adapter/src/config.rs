use clap::Parser;
use std::path::PathBuf;

/// Runtime settings for the adapter, parsed from command-line arguments and
/// environment variables.
///
/// Environment variables take the same names the deployment has always used
/// (`ETHEREUM_RPC_URL`, `WS_API_ENDPOINT`, ...); a `.env` file is honored when
/// the binary loads one via `dotenvy` before parsing.
#[derive(Parser, Debug, Clone)]
#[clap(about = "WEI adapter: cached blockchain balances and streamed prices", version)]
pub struct Settings {
    /// JSON-RPC endpoint of the balance data provider.
    #[clap(long, env = "ETHEREUM_RPC_URL", help = "An RPC endpoint for the balance data provider")]
    pub ethereum_rpc_url: String,

    /// Chain id the RPC endpoint serves. Logged at startup.
    #[clap(long, env = "CHAIN_ID", default_value_t = 1, help = "Chain id of the configured RPC endpoint")]
    pub chain_id: u64,

    /// WebSocket endpoint of the price data provider.
    #[clap(long, env = "WS_API_ENDPOINT", help = "WS endpoint for the price data provider")]
    pub ws_api_endpoint: String,

    /// Sleep between background refresh passes, in milliseconds.
    #[clap(
        long,
        env = "BACKGROUND_EXECUTE_MS",
        default_value_t = 1000,
        help = "The amount of time the background refresh should sleep before performing the next pass"
    )]
    pub background_execute_ms: u64,

    /// Capacity of each active request set; the oldest entry is evicted first.
    #[clap(
        long,
        env = "MAX_ACTIVE_REQUESTS",
        default_value_t = 10_000,
        help = "Upper bound on tracked request fingerprints per data source"
    )]
    pub max_active_requests: usize,

    /// Directory for log files.
    #[clap(long, env = "LOG_DIR", default_value = "./logs", help = "Directory for log files")]
    pub log_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    #[clap(long, env = "LOG_LEVEL", default_value = "info", help = "Logging level")]
    pub log_level: String,

    /// Addresses to seed the balance registry with on startup. The HTTP
    /// request layer that normally drives registration is an external
    /// collaborator, so the server binary accepts seeds directly.
    #[clap(long, value_delimiter = ',', help = "Comma-separated addresses to watch from startup")]
    pub addresses: Vec<String>,

    /// BASE/QUOTE pairs to subscribe to on startup, e.g. `ETH/USD,BTC/USD`.
    #[clap(long, value_delimiter = ',', help = "Comma-separated BASE/QUOTE pairs to subscribe from startup")]
    pub pairs: Vec<String>,
}
