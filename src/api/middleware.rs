//! API Middleware (Logging, Background Maintenance)

use axum::{extract::Request, middleware::Next, response::Response};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::info;

use super::handlers::AppState;

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = %latency.as_millis(),
        "Request completed"
    );

    response
}

/// Periodically drop expired lookup-cache entries
pub fn start_cleanup_task(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = state.risk_cache.cleanup_expired() + state.info_cache.cleanup_expired();
            if removed > 0 {
                info!("🧹 Cache cleanup: {} expired entries removed", removed);
            }
        }
    })
}
