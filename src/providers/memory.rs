//! In-Memory Ledger
//!
//! Fixture-backed `LedgerClient` for offline replays (`--fixture`) and
//! network-free tests. Serves pages exactly like the HTTP client, counts
//! every call, and can simulate upstream failures per address.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path as FsPath;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::ledger::{AddressRiskStatus, LedgerClient, TransferPage, TransferRecord};
use crate::models::{AppError, AppResult, Address, Direction};
use crate::utils::constants::{MAX_PAGE_SIZE, TOKEN_UNIT};

/// Serialized ledger snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerFixture {
    #[serde(default)]
    pub transfers: Vec<TransferRecord>,
    #[serde(default)]
    pub risk: HashMap<String, AddressRiskStatus>,
    #[serde(default)]
    pub accounts: HashMap<String, serde_json::Value>,
}

/// Ledger served from memory
pub struct InMemoryLedger {
    transfers: Vec<TransferRecord>,
    risk: HashMap<String, AddressRiskStatus>,
    accounts: HashMap<String, serde_json::Value>,
    failing: HashSet<String>,
    page_size: usize,
    /// History fetches started, keyed by (address, direction)
    fetch_starts: DashMap<(String, Direction), u64>,
    page_calls: AtomicU64,
    risk_calls: AtomicU64,
    account_calls: AtomicU64,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::from_fixture(LedgerFixture::default())
    }

    /// Ledger seeded from a fixture
    pub fn from_fixture(fixture: LedgerFixture) -> Self {
        Self {
            transfers: fixture.transfers,
            risk: fixture.risk,
            accounts: fixture.accounts,
            failing: HashSet::new(),
            page_size: MAX_PAGE_SIZE,
            fetch_starts: DashMap::new(),
            page_calls: AtomicU64::new(0),
            risk_calls: AtomicU64::new(0),
            account_calls: AtomicU64::new(0),
        }
    }

    /// Load a JSON fixture file
    pub fn load(path: impl AsRef<FsPath>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let fixture: LedgerFixture = serde_json::from_str(&raw)
            .map_err(|e| AppError::invalid_config(format!("Invalid fixture {}: {}", path.display(), e)))?;
        info!(
            "📂 Loaded fixture {} ({} transfers, {} risk entries)",
            path.display(),
            fixture.transfers.len(),
            fixture.risk.len()
        );
        Ok(Self::from_fixture(fixture))
    }

    /// Add a transfer of `amount` whole tokens
    pub fn with_transfer(
        mut self,
        from: &str,
        to: &str,
        amount: f64,
        timestamp_ms: i64,
        tx_hash: &str,
    ) -> Self {
        self.push_record(TransferRecord {
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            value: Some((amount * TOKEN_UNIT).round() as u128),
            block_timestamp: Some(timestamp_ms),
            transaction_id: Some(tx_hash.to_string()),
        });
        self
    }

    /// Add a raw (possibly malformed) record
    pub fn with_record(mut self, record: TransferRecord) -> Self {
        self.push_record(record);
        self
    }

    pub fn push_record(&mut self, record: TransferRecord) {
        self.transfers.push(record);
    }

    /// Set the risk status returned for an address
    pub fn with_risk_status(mut self, address: &str, status: AddressRiskStatus) -> Self {
        self.risk.insert(address.to_string(), status);
        self
    }

    /// Every call touching this address fails with a transient error
    pub fn with_failure(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    /// Records per page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// History fetches started for an address and direction
    pub fn fetch_count(&self, address: &str, direction: Direction) -> u64 {
        self.fetch_starts
            .get(&(address.to_string(), direction))
            .map(|c| *c)
            .unwrap_or(0)
    }

    /// Largest number of fetches started for any single (address, direction)
    pub fn max_fetches_per_key(&self) -> u64 {
        self.fetch_starts.iter().map(|e| *e.value()).max().unwrap_or(0)
    }

    /// All ledger calls made so far
    pub fn total_calls(&self) -> u64 {
        self.page_calls.load(Ordering::Relaxed)
            + self.risk_calls.load(Ordering::Relaxed)
            + self.account_calls.load(Ordering::Relaxed)
    }

    pub fn page_calls(&self) -> u64 {
        self.page_calls.load(Ordering::Relaxed)
    }

    pub fn risk_calls(&self) -> u64 {
        self.risk_calls.load(Ordering::Relaxed)
    }

    fn check_failure(&self, address: &Address) -> AppResult<()> {
        if self.failing.contains(address.as_str()) {
            Err(AppError::upstream_connection(format!(
                "simulated outage for {}",
                address.short()
            )))
        } else {
            Ok(())
        }
    }

    fn matches(record: &TransferRecord, address: &str, direction: Direction) -> bool {
        let from = record.from.as_deref().map(str::trim) == Some(address);
        let to = record.to.as_deref().map(str::trim) == Some(address);
        match direction {
            Direction::From => from,
            Direction::To => to,
            Direction::Both => from || to,
        }
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn fetch_transfers(
        &self,
        address: &Address,
        direction: Direction,
        page_token: Option<&str>,
    ) -> AppResult<TransferPage> {
        self.page_calls.fetch_add(1, Ordering::Relaxed);
        if page_token.is_none() {
            *self
                .fetch_starts
                .entry((address.to_string(), direction))
                .or_insert(0) += 1;
        }
        self.check_failure(address)?;

        let offset: usize = match page_token {
            Some(token) => token
                .parse()
                .map_err(|_| AppError::new(crate::models::ErrorCode::UpstreamInvalidResponse, "bad page token"))?,
            None => 0,
        };

        let matching: Vec<&TransferRecord> = self
            .transfers
            .iter()
            .filter(|r| Self::matches(r, address.as_str(), direction))
            .collect();

        let end = (offset + self.page_size).min(matching.len());
        let transfers = matching
            .get(offset..end)
            .map(|page| page.iter().map(|r| (*r).clone()).collect())
            .unwrap_or_default();
        let next_token = (end < matching.len()).then(|| end.to_string());

        Ok(TransferPage {
            transfers,
            next_token,
        })
    }

    async fn address_risk_status(&self, address: &Address) -> AppResult<AddressRiskStatus> {
        self.risk_calls.fetch_add(1, Ordering::Relaxed);
        self.check_failure(address)?;
        Ok(self.risk.get(address.as_str()).cloned().unwrap_or_default())
    }

    async fn account_info(&self, address: &Address) -> AppResult<serde_json::Value> {
        self.account_calls.fetch_add(1, Ordering::Relaxed);
        self.check_failure(address)?;
        Ok(self
            .accounts
            .get(address.as_str())
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "address": address.as_str() })))
    }
}
