//! API Request/Response Types

use serde::{Deserialize, Serialize};

use crate::models::{Address, AppError, AppResult};
use crate::providers::AddressRiskStatus;
use crate::utils::cache::CacheStats;
use crate::utils::constants::{DEFAULT_MAX_DEPTH, MAX_ANALYSIS_DEPTH, MIN_ANALYSIS_DEPTH};

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            details: std::error::Error::source(err).map(|s| s.to_string()),
        }
    }
}

// ============================================
// Analysis
// ============================================

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub source_address: String,
    pub target_address: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl AnalyzeRequest {
    /// Trimmed, format-checked addresses and an in-range depth
    pub fn validate(&self) -> AppResult<(Address, Address, usize)> {
        let source = Address::parse(self.source_address.trim())?;
        let target = Address::parse(self.target_address.trim())?;
        if !(MIN_ANALYSIS_DEPTH..=MAX_ANALYSIS_DEPTH).contains(&self.max_depth) {
            return Err(AppError::out_of_range(
                "max_depth",
                self.max_depth,
                MIN_ANALYSIS_DEPTH,
                MAX_ANALYSIS_DEPTH,
            ));
        }
        Ok((source, target, self.max_depth))
    }
}

// ============================================
// Pass-through lookups
// ============================================

#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    pub address: String,
}

impl AddressRequest {
    pub fn validate(&self) -> AppResult<Address> {
        Address::parse(self.address.trim())
    }
}

#[derive(Debug, Serialize)]
pub struct BlacklistCheckData {
    pub address: Address,
    #[serde(flatten)]
    pub status: AddressRiskStatus,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct AddressInfoData {
    pub address: Address,
    pub account: serde_json::Value,
    pub risk_status: AddressRiskStatus,
}

// ============================================
// Health Check
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub exchanges_loaded: usize,
    pub cache: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_request_defaults_and_trims() {
        let req: AnalyzeRequest = serde_json::from_str(
            r#"{"source_address":"  TAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA ","target_address":"TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB"}"#,
        )
        .unwrap();
        assert_eq!(req.max_depth, DEFAULT_MAX_DEPTH);
        let (source, _, depth) = req.validate().unwrap();
        assert_eq!(source.as_str(), "TAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
        assert_eq!(depth, 2);
    }

    #[test]
    fn test_analyze_request_rejects_bad_input() {
        let bad_addr = AnalyzeRequest {
            source_address: "0xdeadbeef".to_string(),
            target_address: "TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB".to_string(),
            max_depth: 2,
        };
        assert!(bad_addr.validate().unwrap_err().is_validation());

        let bad_depth = AnalyzeRequest {
            source_address: "TAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            target_address: "TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB".to_string(),
            max_depth: 0,
        };
        assert!(bad_depth.validate().unwrap_err().is_validation());
    }
}
