//! Ruster Trace - one-shot connection analysis
//!
//! Crawls the USDT transfer graph around two TRON addresses, searches for
//! connecting paths and prints the scored report as JSON on stdout.
//!
//! Usage:
//!   ruster_trace <SOURCE> <TARGET> [--depth N] [--exchange-list FILE]
//!                [--fixture FILE] [--compact]
//!
//! Environment:
//!   TRONGRID_API_KEY / TRONSCAN_API_KEY - optional API keys
//!   RUST_LOG                            - log filter (default: info)

use clap::Parser;
use eyre::Result;
use ruster_trace::{
    Address, AnalysisEngine, AnalyzerConfig, ExchangeRegistry, InMemoryLedger, LedgerClient,
    TronGridClient,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Trace USDT transfer paths between two TRON addresses and score their AML risk
#[derive(Parser, Debug)]
#[command(name = "ruster_trace", version, about)]
struct Cli {
    /// Source address
    source: String,

    /// Target address
    target: String,

    /// Crawl depth (1-5)
    #[arg(short, long, default_value_t = ruster_trace::utils::constants::DEFAULT_MAX_DEPTH)]
    depth: usize,

    /// Exchange list file, one `address[,name]` per line
    #[arg(long, env = "RUSTER_EXCHANGE_LIST")]
    exchange_list: Option<String>,

    /// Replay against a JSON ledger fixture instead of TronGrid
    #[arg(long)]
    fixture: Option<String>,

    /// Print compact JSON
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays pure JSON
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let source = Address::parse(cli.source.trim())?;
    let target = Address::parse(cli.target.trim())?;

    let mut config = AnalyzerConfig::from_env().with_max_depth(cli.depth);
    if cli.exchange_list.is_some() {
        config.exchange_list_path = cli.exchange_list.clone();
    }

    let ledger: Arc<dyn LedgerClient> = match &cli.fixture {
        Some(path) => {
            info!("📼 Replaying ledger fixture {}", path);
            config = config.without_delays();
            Arc::new(InMemoryLedger::load(path)?)
        }
        None => Arc::new(TronGridClient::new(&config)?),
    };
    config.validate()?;

    let exchanges = Arc::new(config.exchange_registry()?);
    info!("🏦 {} known exchange addresses", exchanges.len());

    let engine = AnalysisEngine::new(ledger, exchanges, config);
    let report = engine.analyze(&source, &target, cli.depth).await?;

    let json = if cli.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{}", json);

    Ok(())
}
