//! Ledger Client Interface
//!
//! The tracing engine only needs four things from a ledger indexer:
//! one page of token transfers, an auto-paginated history, an address
//! risk lookup, and raw account metadata. Transport (HTTP, fixtures)
//! lives behind the `LedgerClient` trait.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{AppError, AppResult, Address, Direction, Transfer};
use crate::utils::constants::{minor_units_to_amount, MAX_PAGE_SIZE};

// ============================================
// WIRE TYPES
// ============================================

/// Minimal TRC20 transfer record as served by the indexer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
///
/// Every field decodes leniently: a wrongly typed field becomes `None` and
/// only that record fails `parse`, never the page it arrived in.
pub struct TransferRecord {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub from: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub to: Option<String>,
    /// Integer minor units; indexers send it as a string or a number
    #[serde(default, deserialize_with = "deserialize_units")]
    pub value: Option<u128>,
    #[serde(default, deserialize_with = "deserialize_millis")]
    pub block_timestamp: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub transaction_id: Option<String>,
}

impl TransferRecord {
    /// Validate both endpoints and convert the amount
    pub fn parse(&self) -> AppResult<Transfer> {
        let from = self
            .from
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| AppError::malformed_record("missing sender"))?;
        let to = self
            .to
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| AppError::malformed_record("missing receiver"))?;

        let from = Address::parse(from)
            .map_err(|_| AppError::malformed_record(format!("invalid sender {:?}", from)))?;
        let to = Address::parse(to)
            .map_err(|_| AppError::malformed_record(format!("invalid receiver {:?}", to)))?;

        let raw = self
            .value
            .ok_or_else(|| AppError::malformed_record("missing or non-integer value"))?;
        let tx_hash = self
            .transaction_id
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::malformed_record("missing transaction id"))?;

        Ok(Transfer {
            from,
            to,
            amount: minor_units_to_amount(raw),
            timestamp_ms: self.block_timestamp.unwrap_or(0),
            tx_hash: tx_hash.to_string(),
        })
    }
}

/// Accept `"1500000"`, `1500000`, or anything else as `None`
fn deserialize_units<'de, D>(deserializer: D) -> Result<Option<u128>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        Some(serde_json::Value::Number(n)) => n.as_u64().map(u128::from),
        _ => None,
    })
}

/// Strings only; numbers, objects and nulls become `None`
fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Millisecond timestamp as a number or a numeric string
fn deserialize_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl TransferRecord {
    /// Decode one raw page element. Anything that is not a JSON object
    /// yields an empty record, which `parse` rejects as malformed.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            debug!("Undecodable transfer record: {}", e);
            Self::default()
        })
    }
}

/// One page of transfers plus the continuation token
#[derive(Debug, Clone, Default)]
pub struct TransferPage {
    pub transfers: Vec<TransferRecord>,
    pub next_token: Option<String>,
}

/// Address risk flags from the security indexer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressRiskStatus {
    pub is_blacklisted: bool,
    #[serde(default)]
    pub has_fraud_transaction: bool,
    #[serde(default)]
    pub fraud_token_creator: bool,
    #[serde(default)]
    pub risk_score: f64,
}

impl AddressRiskStatus {
    /// Blacklisted status with a given upstream score
    pub fn blacklisted(risk_score: f64) -> Self {
        Self {
            is_blacklisted: true,
            risk_score,
            ..Default::default()
        }
    }
}

// ============================================
// CLIENT TRAIT
// ============================================

/// Remote ledger indexer
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// One page of confirmed token transfers
    async fn fetch_transfers(
        &self,
        address: &Address,
        direction: Direction,
        page_token: Option<&str>,
    ) -> AppResult<TransferPage>;

    /// Risk flags for an address
    async fn address_risk_status(&self, address: &Address) -> AppResult<AddressRiskStatus>;

    /// Raw account metadata
    async fn account_info(&self, address: &Address) -> AppResult<serde_json::Value>;

    /// Pause between pages of one paginated fetch
    fn page_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Auto-paginated history bounded by `max_count`.
    ///
    /// A failure on the first page is returned; a failure on a later page
    /// keeps what was already collected.
    async fn fetch_all_transfers(
        &self,
        address: &Address,
        direction: Direction,
        max_count: usize,
    ) -> AppResult<Vec<TransferRecord>> {
        let mut collected: Vec<TransferRecord> = Vec::new();
        let mut token: Option<String> = None;

        while collected.len() < max_count {
            let page = match self
                .fetch_transfers(address, direction, token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) if !collected.is_empty() && e.is_transient() => {
                    warn!(
                        "⚠️ Pagination for {} stopped after {} records: {}",
                        address.short(),
                        collected.len(),
                        e
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            if page.transfers.is_empty() {
                break;
            }
            collected.extend(page.transfers);

            token = page.next_token.filter(|t| !t.is_empty());
            if token.is_none() {
                break;
            }

            let delay = self.page_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        collected.truncate(max_count);
        debug!(
            "📥 {} transfers fetched for {} ({})",
            collected.len(),
            address.short(),
            direction.as_str()
        );
        Ok(collected)
    }
}

/// Page size to request for a remaining budget
#[inline]
pub fn page_size_for(remaining: usize) -> usize {
    remaining.clamp(1, MAX_PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "TAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const B: &str = "TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

    #[test]
    fn test_record_parse_string_value() {
        let json = format!(
            r#"{{"from":"{}","to":"{}","value":"9500000000","block_timestamp":1700000000000,"transaction_id":"abc"}}"#,
            A, B
        );
        let record: TransferRecord = serde_json::from_str(&json).unwrap();
        let transfer = record.parse().unwrap();
        assert_eq!(transfer.amount, 9_500.0);
        assert_eq!(transfer.timestamp_ms, 1_700_000_000_000);
        assert_eq!(transfer.from.as_str(), A);
    }

    #[test]
    fn test_record_parse_numeric_value() {
        let json = format!(
            r#"{{"from":"{}","to":"{}","value":2500000,"transaction_id":"abc"}}"#,
            A, B
        );
        let record: TransferRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.parse().unwrap().amount, 2.5);
    }

    #[test]
    fn test_malformed_records_rejected() {
        let bad_value = format!(
            r#"{{"from":"{}","to":"{}","value":"12.5x","transaction_id":"abc"}}"#,
            A, B
        );
        let record: TransferRecord = serde_json::from_str(&bad_value).unwrap();
        assert_eq!(
            record.parse().unwrap_err().code,
            crate::models::ErrorCode::MalformedRecord
        );

        let bad_address = format!(
            r#"{{"from":"0xabc","to":"{}","value":"1","transaction_id":"abc"}}"#,
            B
        );
        let record: TransferRecord = serde_json::from_str(&bad_address).unwrap();
        assert!(record.parse().is_err());

        let missing_hash = format!(r#"{{"from":"{}","to":"{}","value":"1"}}"#, A, B);
        let record: TransferRecord = serde_json::from_str(&missing_hash).unwrap();
        assert!(record.parse().is_err());
    }

    #[test]
    fn test_risk_status_defaults() {
        let status: AddressRiskStatus = serde_json::from_str(r#"{"is_blacklisted":true}"#).unwrap();
        assert!(status.is_blacklisted);
        assert_eq!(status.risk_score, 0.0);
        assert!(!status.has_fraud_transaction);
    }

    #[test]
    fn test_page_size_clamped() {
        assert_eq!(page_size_for(0), 1);
        assert_eq!(page_size_for(50), 50);
        assert_eq!(page_size_for(1_000), MAX_PAGE_SIZE);
    }
}
