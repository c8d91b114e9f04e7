//! API Request Handlers

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::types::*;
use crate::core::{AnalysisEngine, AnalysisReport};
use crate::models::{AnalyzerConfig, AppError, ExchangeRegistry};
use crate::providers::{AddressRiskStatus, LedgerClient};
use crate::utils::cache::AddressLookupCache;
use crate::utils::constants::DEFAULT_ANALYSIS_TIMEOUT_SECS;

/// Concurrent analyses admitted at once
const MAX_CONCURRENT_ANALYSES: usize = 8;

/// Shared application state
///
/// Holds only immutable configuration, the ledger client and the lookup
/// caches; every analysis request builds its own run state.
pub struct AppState {
    pub config: AnalyzerConfig,
    pub exchanges: Arc<ExchangeRegistry>,
    pub ledger: Arc<dyn LedgerClient>,
    pub risk_cache: AddressLookupCache<AddressRiskStatus>,
    pub info_cache: AddressLookupCache<serde_json::Value>,
    pub analysis_semaphore: Arc<Semaphore>,
    pub analysis_timeout: Duration,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: AnalyzerConfig,
        exchanges: Arc<ExchangeRegistry>,
        ledger: Arc<dyn LedgerClient>,
    ) -> Self {
        Self {
            config,
            exchanges,
            ledger,
            risk_cache: AddressLookupCache::new(),
            info_cache: AddressLookupCache::new(),
            analysis_semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_ANALYSES)),
            analysis_timeout: Duration::from_secs(DEFAULT_ANALYSIS_TIMEOUT_SECS),
            start_time: Instant::now(),
        }
    }

    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn engine(&self) -> AnalysisEngine {
        AnalysisEngine::new(
            self.ledger.clone(),
            self.exchanges.clone(),
            self.config.clone(),
        )
    }

    async fn risk_status(
        &self,
        address: &crate::models::Address,
    ) -> Result<(AddressRiskStatus, bool), AppError> {
        if let Some(status) = self.risk_cache.get(address) {
            return Ok((status, true));
        }
        let status = self.ledger.address_risk_status(address).await?;
        self.risk_cache.set(address, status.clone());
        Ok((status, false))
    }
}

type ApiFailure = (StatusCode, Json<ApiResponse<()>>);

fn latency_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn failure(err: &AppError, start: Instant) -> ApiFailure {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("❌ {}", err);
    } else {
        warn!("⚠️ Rejected request: {}", err);
    }
    (
        status,
        Json(ApiResponse::error(ApiError::from(err), latency_ms(start))),
    )
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        exchanges_loaded: state.exchanges.len(),
        cache: state.risk_cache.stats(),
    };

    Json(ApiResponse::success(data, latency_ms(start)))
}

// ============================================
// Connection Analysis
// ============================================

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<ApiResponse<AnalysisReport>>, ApiFailure> {
    let start = Instant::now();

    let (source, target, max_depth) = req.validate().map_err(|e| failure(&e, start))?;

    let _permit = state
        .analysis_semaphore
        .acquire()
        .await
        .map_err(|_| failure(&AppError::internal("Analysis queue closed"), start))?;

    info!(
        "📥 Analysis request {} -> {} (depth {})",
        source.short(),
        target.short(),
        max_depth
    );

    let engine = state.engine();
    let report = match tokio::time::timeout(
        state.analysis_timeout,
        engine.analyze(&source, &target, max_depth),
    )
    .await
    {
        Ok(result) => result.map_err(|e| failure(&e, start))?,
        Err(_) => {
            return Err(failure(
                &AppError::internal(format!(
                    "Analysis exceeded {}s",
                    state.analysis_timeout.as_secs()
                )),
                start,
            ))
        }
    };

    Ok(Json(ApiResponse::success(report, latency_ms(start))))
}

// ============================================
// Pass-through Lookups
// ============================================

pub async fn check_blacklist(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddressRequest>,
) -> Result<Json<ApiResponse<BlacklistCheckData>>, ApiFailure> {
    let start = Instant::now();
    let address = req.validate().map_err(|e| failure(&e, start))?;

    let (status, cached) = state
        .risk_status(&address)
        .await
        .map_err(|e| failure(&e, start))?;

    Ok(Json(ApiResponse::success(
        BlacklistCheckData {
            address,
            status,
            cached,
        },
        latency_ms(start),
    )))
}

pub async fn address_info(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddressRequest>,
) -> Result<Json<ApiResponse<AddressInfoData>>, ApiFailure> {
    let start = Instant::now();
    let address = req.validate().map_err(|e| failure(&e, start))?;

    let account = match state.info_cache.get(&address) {
        Some(account) => account,
        None => {
            let account = state
                .ledger
                .account_info(&address)
                .await
                .map_err(|e| failure(&e, start))?;
            state.info_cache.set(&address, account.clone());
            account
        }
    };
    let (risk_status, _) = state
        .risk_status(&address)
        .await
        .map_err(|e| failure(&e, start))?;

    Ok(Json(ApiResponse::success(
        AddressInfoData {
            address,
            account,
            risk_status,
        },
        latency_ms(start),
    )))
}
