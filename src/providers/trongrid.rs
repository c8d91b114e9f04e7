//! TronGrid / TronScan HTTP Client
//!
//! Implements `LedgerClient` against the public TRON indexers:
//! 1. TRC20 transfer history (TronGrid `/v1/accounts/{addr}/transactions/trc20`)
//! 2. Address security flags (TronScan `/security/account/data`)
//! 3. Account metadata (TronGrid `/v1/accounts/{addr}`)
//!
//! Pagination uses TronGrid's `meta.fingerprint` cursor. No retries: a
//! failed call surfaces as a transient `AppError` and the engine
//! substitutes empty data.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ledger::{page_size_for, AddressRiskStatus, LedgerClient, TransferPage, TransferRecord};
use crate::models::{AnalyzerConfig, AppError, AppResult, Address, Direction};
use crate::utils::constants::{MAX_PAGE_SIZE, TRONGRID_API_KEY_HEADER, USER_AGENT as USER_AGENT_CONST};

// ============================================
// RESPONSE TYPES
// ============================================

/// TRC20 transfer listing
#[derive(Debug, Clone, Deserialize)]
pub struct Trc20TransfersResponse {
    /// Kept raw so one bad element only costs its own record
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(default)]
    pub meta: Option<ResponseMeta>,
}

impl Trc20TransfersResponse {
    pub fn into_page(self) -> TransferPage {
        TransferPage {
            transfers: self.data.into_iter().map(TransferRecord::from_value).collect(),
            next_token: self.meta.and_then(|m| m.fingerprint),
        }
    }
}

/// Paging metadata
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub fingerprint: Option<String>,
}

/// TronScan security endpoint body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityResponse {
    #[serde(default)]
    pub is_black_list: bool,
    #[serde(default)]
    pub has_fraud_transaction: bool,
    #[serde(default)]
    pub fraud_token_creator: bool,
    #[serde(default)]
    pub risk_score: Option<f64>,
}

impl From<SecurityResponse> for AddressRiskStatus {
    fn from(resp: SecurityResponse) -> Self {
        Self {
            is_blacklisted: resp.is_black_list,
            has_fraud_transaction: resp.has_fraud_transaction,
            fraud_token_creator: resp.fraud_token_creator,
            risk_score: resp.risk_score.unwrap_or(0.0),
        }
    }
}

// ============================================
// CLIENT
// ============================================

/// HTTP ledger client for TRON
#[derive(Clone)]
pub struct TronGridClient {
    client: reqwest::Client,
    trongrid_base: String,
    tronscan_base: String,
    token_contract: String,
    tronscan_api_key: Option<String>,
    page_delay: Duration,
}

impl TronGridClient {
    /// Build a client from analyzer configuration
    pub fn new(config: &AnalyzerConfig) -> AppResult<Self> {
        let client = Self::build_client(config.trongrid_api_key.as_deref(), config.request_timeout)?;

        info!(
            "🌐 TronGrid client ready ({}, contract {})",
            config.trongrid_base_url, config.token_contract
        );

        Ok(Self {
            client,
            trongrid_base: config.trongrid_base_url.trim_end_matches('/').to_string(),
            tronscan_base: config.tronscan_base_url.trim_end_matches('/').to_string(),
            token_contract: config.token_contract.clone(),
            tronscan_api_key: config.tronscan_api_key.clone(),
            page_delay: config.page_delay,
        })
    }

    /// HTTP client with default headers (gzip, user agent, API key)
    fn build_client(api_key: Option<&str>, timeout: Duration) -> AppResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(key)
                .map_err(|_| AppError::invalid_config("TRONGRID_API_KEY contains invalid characters"))?;
            value.set_sensitive(true);
            headers.insert(TRONGRID_API_KEY_HEADER, value);
        }

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| AppError::invalid_config(format!("Failed to build HTTP client: {}", e)))
    }

    /// Query parameters for one transfer page
    pub fn transfer_query(
        &self,
        direction: Direction,
        limit: usize,
        page_token: Option<&str>,
    ) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("contract_address", self.token_contract.clone()),
            ("limit", page_size_for(limit).to_string()),
            ("only_confirmed", "true".to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("fingerprint", token.to_string()));
        }
        match direction {
            Direction::From => query.push(("only_from", "true".to_string())),
            Direction::To => query.push(("only_to", "true".to_string())),
            Direction::Both => {}
        }
        query
    }

    /// GET + status mapping + JSON decode
    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> AppResult<T> {
        let response = request.send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            warn!("⏳ Ledger API rate limited (HTTP 429)");
            return Err(AppError::upstream_rate_limited());
        }
        if !status.is_success() {
            return Err(AppError::upstream_http(status.as_u16()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl LedgerClient for TronGridClient {
    async fn fetch_transfers(
        &self,
        address: &Address,
        direction: Direction,
        page_token: Option<&str>,
    ) -> AppResult<TransferPage> {
        let url = format!(
            "{}/v1/accounts/{}/transactions/trc20",
            self.trongrid_base, address
        );
        let query = self.transfer_query(direction, MAX_PAGE_SIZE, page_token);
        debug!("📡 GET {} ({})", url, direction.as_str());

        let resp: Trc20TransfersResponse = self.get_json(self.client.get(&url).query(&query)).await?;
        Ok(resp.into_page())
    }

    async fn address_risk_status(&self, address: &Address) -> AppResult<AddressRiskStatus> {
        let url = format!("{}/security/account/data", self.tronscan_base);
        let mut request = self.client.get(&url).query(&[("address", address.as_str())]);
        if let Some(key) = &self.tronscan_api_key {
            request = request.header(TRONGRID_API_KEY_HEADER, key);
        }

        let resp: SecurityResponse = self.get_json(request).await?;
        Ok(resp.into())
    }

    async fn account_info(&self, address: &Address) -> AppResult<serde_json::Value> {
        let url = format!("{}/v1/accounts/{}", self.trongrid_base, address);
        self.get_json(self.client.get(&url)).await
    }

    fn page_delay(&self) -> Duration {
        self.page_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TronGridClient {
        let mut config = AnalyzerConfig::default();
        config.trongrid_api_key = None;
        TronGridClient::new(&config).unwrap()
    }

    #[test]
    fn test_transfer_query_direction_flags() {
        let client = client();

        let from = client.transfer_query(Direction::From, 200, None);
        assert!(from.contains(&("only_from", "true".to_string())));
        assert!(!from.iter().any(|(k, _)| *k == "only_to"));

        let to = client.transfer_query(Direction::To, 200, Some("cursor"));
        assert!(to.contains(&("only_to", "true".to_string())));
        assert!(to.contains(&("fingerprint", "cursor".to_string())));

        let both = client.transfer_query(Direction::Both, 5_000, None);
        assert!(both.contains(&("limit", "200".to_string())));
        assert!(!both.iter().any(|(k, _)| k.starts_with("only_from") || k.starts_with("only_to")));
    }

    #[test]
    fn test_transfers_response_deserialization() {
        let json = r#"{
            "data": [{
                "transaction_id": "f1",
                "from": "TAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
                "to": "TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB",
                "value": "5000000000",
                "block_timestamp": 1700000000000,
                "token_info": {"symbol": "USDT", "decimals": 6}
            }],
            "success": true,
            "meta": {"at": 1700000000001, "page_size": 1, "fingerprint": "next"}
        }"#;
        let resp: Trc20TransfersResponse = serde_json::from_str(json).unwrap();
        let page = resp.into_page();
        assert_eq!(page.transfers.len(), 1);
        assert_eq!(page.next_token.as_deref(), Some("next"));
        assert_eq!(page.transfers[0].parse().unwrap().amount, 5_000.0);
    }

    #[test]
    fn test_malformed_record_does_not_drop_page() {
        let json = r#"{
            "data": [
                {"transaction_id": "h1", "from": "TAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
                 "to": "TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB", "value": "1000000",
                 "block_timestamp": 1700000000000},
                {"transaction_id": "h2", "from": 12345,
                 "to": "TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB", "value": "2000000",
                 "block_timestamp": {"ms": 1}},
                {"transaction_id": "h3", "from": "TCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC",
                 "to": "TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB", "value": 3000000,
                 "block_timestamp": "1700000000001"},
                "garbage"
            ],
            "meta": {"fingerprint": "next"}
        }"#;
        let page = serde_json::from_str::<Trc20TransfersResponse>(json)
            .unwrap()
            .into_page();
        assert_eq!(page.transfers.len(), 4);

        let parsed: Vec<_> = page.transfers.iter().filter_map(|r| r.parse().ok()).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].tx_hash, "h1");
        assert_eq!(parsed[1].tx_hash, "h3");
        assert_eq!(parsed[1].timestamp_ms, 1_700_000_000_001);
        assert_eq!(
            page.transfers[1].parse().unwrap_err().code,
            crate::models::errors::ErrorCode::MalformedRecord
        );
        assert!(page.transfers[3].parse().is_err());
    }

    #[test]
    fn test_security_response_mapping() {
        let json = r#"{"is_black_list": true, "has_fraud_transaction": true, "risk_score": 87}"#;
        let resp: SecurityResponse = serde_json::from_str(json).unwrap();
        let status: AddressRiskStatus = resp.into();
        assert!(status.is_blacklisted);
        assert!(status.has_fraud_transaction);
        assert!(!status.fraud_token_creator);
        assert_eq!(status.risk_score, 87.0);

        let empty: SecurityResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(AddressRiskStatus::from(empty), AddressRiskStatus::default());
    }
}
