//! Centralized Error Handling Module
//!
//! Every failure carries a unique code so degraded upstream calls, bad
//! input and internal faults can be told apart in logs.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - VAL_xxx: rejected input (never retried)
//! - UPSTREAM_xxx: ledger API/network failures (degraded to empty data)
//! - RECORD_xxx: a single transfer record that failed to parse
//! - ANALYSIS_xxx / CFG_xxx: internal faults surfaced to the caller

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// Upstream failure that callers substitute with empty data
    pub fn is_transient(&self) -> bool {
        self.code.is_transient()
    }

    /// Rejected input
    pub fn is_validation(&self) -> bool {
        self.code.kind() == ErrorKind::Validation
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Coarse failure class, drives how a caller reacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed address or out-of-range parameter
    Validation,
    /// Ledger API or network failure
    TransientUpstream,
    /// One transfer record failed to parse
    MalformedRecord,
    /// Unexpected failure during orchestration
    Internal,
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Validation Errors (1xx)
    // ============================================
    /// Address failed the fixed-format check
    ValidationInvalidAddress,
    /// Parameter outside its accepted range
    ValidationOutOfRange,
    /// Request body missing required fields
    ApiBadRequest,

    // ============================================
    // Upstream Errors (2xx)
    // ============================================
    /// Could not connect to the ledger API
    UpstreamConnectionFailed,
    /// Ledger API request timeout
    UpstreamTimeout,
    /// Ledger API rate limited (HTTP 429)
    UpstreamRateLimited,
    /// Ledger API returned a non-success status
    UpstreamHttp,
    /// Ledger API body could not be decoded
    UpstreamInvalidResponse,

    // ============================================
    // Record Errors (3xx)
    // ============================================
    /// Transfer record missing fields or carrying invalid values
    MalformedRecord,

    // ============================================
    // Internal Errors (9xx)
    // ============================================
    /// Orchestration invariant broken
    AnalysisInternal,
    /// Invalid configuration value
    ConfigInvalidValue,
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationInvalidAddress => "VAL_INVALID_ADDRESS",
            Self::ValidationOutOfRange => "VAL_OUT_OF_RANGE",
            Self::ApiBadRequest => "API_BAD_REQUEST",

            Self::UpstreamConnectionFailed => "UPSTREAM_CONNECTION_FAILED",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamRateLimited => "UPSTREAM_RATE_LIMITED",
            Self::UpstreamHttp => "UPSTREAM_HTTP_ERROR",
            Self::UpstreamInvalidResponse => "UPSTREAM_INVALID_RESPONSE",

            Self::MalformedRecord => "RECORD_MALFORMED",

            Self::AnalysisInternal => "ANALYSIS_INTERNAL",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Failure class of this code
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationInvalidAddress | Self::ValidationOutOfRange | Self::ApiBadRequest => {
                ErrorKind::Validation
            }
            Self::UpstreamConnectionFailed
            | Self::UpstreamTimeout
            | Self::UpstreamRateLimited
            | Self::UpstreamHttp
            | Self::UpstreamInvalidResponse => ErrorKind::TransientUpstream,
            Self::MalformedRecord => ErrorKind::MalformedRecord,
            Self::AnalysisInternal | Self::ConfigInvalidValue | Self::Unknown => {
                ErrorKind::Internal
            }
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::TransientUpstream if *self == Self::UpstreamRateLimited => 429,
            ErrorKind::TransientUpstream => 502,
            ErrorKind::MalformedRecord | ErrorKind::Internal => 500,
        }
    }

    /// Upstream failures degrade to empty data instead of aborting a run
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientUpstream
    }

    /// Check if error is retryable by the caller
    pub fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Address failed format validation
    pub fn invalid_address(raw: &str) -> Self {
        Self::new(
            ErrorCode::ValidationInvalidAddress,
            format!("Invalid address format: {:?}", raw),
        )
    }

    /// Parameter outside its range
    pub fn out_of_range(name: &str, value: impl fmt::Display, min: usize, max: usize) -> Self {
        Self::new(
            ErrorCode::ValidationOutOfRange,
            format!("{} must be between {} and {} (got {})", name, min, max, value),
        )
    }

    /// Ledger API connection failed
    pub fn upstream_connection(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamConnectionFailed, msg)
    }

    /// Ledger API timeout
    pub fn upstream_timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamTimeout, msg)
    }

    /// Ledger API rate limited
    pub fn upstream_rate_limited() -> Self {
        Self::new(ErrorCode::UpstreamRateLimited, "Rate limited (HTTP 429)")
    }

    /// Ledger API returned an error status
    pub fn upstream_http(status: u16) -> Self {
        Self::new(ErrorCode::UpstreamHttp, format!("HTTP error: {}", status))
    }

    /// Transfer record could not be parsed
    pub fn malformed_record(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedRecord, msg)
    }

    /// Invalid configuration value
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    /// API bad request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }

    /// Orchestration failure
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AnalysisInternal, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::UpstreamTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::UpstreamConnectionFailed, "Connection failed")
        } else if err.is_decode() {
            Self::new(ErrorCode::UpstreamInvalidResponse, err.to_string())
        } else if let Some(status) = err.status() {
            Self::upstream_http(status.as_u16())
        } else {
            Self::new(ErrorCode::UpstreamConnectionFailed, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::UpstreamInvalidResponse, "JSON parse error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::upstream_timeout("TronGrid timed out");
        assert_eq!(err.code, ErrorCode::UpstreamTimeout);
        assert_eq!(err.code_str(), "UPSTREAM_TIMEOUT");
        assert_eq!(err.to_string(), "[UPSTREAM_TIMEOUT] TronGrid timed out");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ErrorCode::UpstreamTimeout.is_transient());
        assert!(ErrorCode::UpstreamRateLimited.is_transient());
        assert!(ErrorCode::UpstreamInvalidResponse.is_transient());
        assert!(!ErrorCode::ValidationInvalidAddress.is_transient());
        assert!(!ErrorCode::MalformedRecord.is_transient());
        assert!(!ErrorCode::AnalysisInternal.is_retryable());
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::ValidationInvalidAddress.http_status(), 400);
        assert_eq!(ErrorCode::ValidationOutOfRange.http_status(), 400);
        assert_eq!(ErrorCode::UpstreamRateLimited.http_status(), 429);
        assert_eq!(ErrorCode::UpstreamHttp.http_status(), 502);
        assert_eq!(ErrorCode::AnalysisInternal.http_status(), 500);
    }

    #[test]
    fn test_out_of_range_message() {
        let err = AppError::out_of_range("max_depth", 9, 1, 5);
        assert!(err.is_validation());
        assert!(err.message.contains("between 1 and 5"));
    }
}
