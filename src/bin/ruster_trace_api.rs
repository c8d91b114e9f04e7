//! Ruster Trace API Server
//!
//! REST API for source/target connection analysis
//!
//! Usage:
//!   cargo run --bin ruster_trace_api
//!
//! Environment:
//!   PORT / RUSTER_PORT            - Server port (default: 5001)
//!   RUSTER_HOST                   - Server host (default: 0.0.0.0)
//!   RUSTER_ANALYSIS_TIMEOUT_SECS  - Per-analysis timeout (default: 3600)
//!   TRONGRID_API_KEY              - TronGrid key (optional)
//!   RUST_LOG                      - Log filter (default: info)

use ruster_trace::api::{create_router, start_cleanup_task, AppState};
use ruster_trace::utils::constants::{
    APP_NAME, APP_VERSION, DEFAULT_ANALYSIS_TIMEOUT_SECS, DEFAULT_API_PORT,
};
use ruster_trace::{AnalyzerConfig, TronGridClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    info!("🚀 {} API v{}", APP_NAME, APP_VERSION);

    let config = AnalyzerConfig::from_env();
    config.validate()?;
    let exchanges = Arc::new(config.exchange_registry()?);
    let ledger = Arc::new(TronGridClient::new(&config)?);

    let timeout_secs = std::env::var("RUSTER_ANALYSIS_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_ANALYSIS_TIMEOUT_SECS);

    let state = Arc::new(
        AppState::new(config, exchanges, ledger)
            .with_analysis_timeout(Duration::from_secs(timeout_secs)),
    );

    let cleanup = start_cleanup_task(state.clone(), Duration::from_secs(60));
    info!("🧹 Background cache cleanup started");

    let app = create_router(state);

    // Hosting platforms set PORT; RUSTER_PORT for local runs
    let host = std::env::var("RUSTER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("RUSTER_PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_API_PORT);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("🌐 Listening on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /v1/analyze          - Source/target connection analysis");
    info!("  POST /v1/blacklist/check  - Address risk status");
    info!("  POST /v1/address/info     - Account info + risk status");
    info!("  GET  /v1/health           - Health check");
    info!("⏱️ Analysis timeout: {}s", timeout_secs);

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    cleanup.abort();
    info!("👋 Shutdown complete");

    Ok(())
}
