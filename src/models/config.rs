//! Configuration module for the tracing engine
//!
//! Defaults come from utils/constants.rs; environment variables override
//! them. API keys are never logged.

use std::collections::HashMap;
use std::path::Path as FsPath;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::errors::{AppError, AppResult};
use super::types::Address;
use crate::utils::constants::{
    ADDRESS_PREFIX, DEFAULT_CLASSIFICATION_DELAY_MS, DEFAULT_CLASSIFICATION_HISTORY, DEFAULT_CRAWL_DELAY_MS,
    DEFAULT_EXCHANGE_BOOTSTRAP_SIZE, DEFAULT_KEY_ADDRESS_COUNT, DEFAULT_LOOKUP_DELAY_MS,
    DEFAULT_MAX_ADDRESSES_TO_EXPLORE, DEFAULT_MAX_CONNECTIONS_PER_ADDRESS, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_EXCHANGE_LOOKUP, DEFAULT_MAX_EXTENDED_PATHS, DEFAULT_MAX_NEIGHBORS_TO_EXPAND,
    DEFAULT_MAX_NODE_CONNECTIONS, DEFAULT_MAX_PATHS, DEFAULT_MAX_RISK_CHECKS,
    DEFAULT_MAX_TRANSACTIONS_PER_ADDRESS, DEFAULT_MIN_TRANSACTION_AMOUNT, DEFAULT_PAGE_DELAY_MS,
    DEFAULT_REPORTED_KEY_ADDRESSES, DEFAULT_REQUEST_TIMEOUT_SECS, MAX_ANALYSIS_DEPTH,
    MIN_ANALYSIS_DEPTH, TRONGRID_BASE_URL, TRONSCAN_BASE_URL, USDT_CONTRACT,
};

// ============================================
// Known exchange registry
// ============================================

/// Known exchange / service addresses with display names
#[derive(Debug, Clone)]
pub struct ExchangeRegistry {
    names: HashMap<Address, String>,
}

impl Default for ExchangeRegistry {
    fn default() -> Self {
        let mut names = HashMap::new();
        if let Ok(addr) = Address::parse(USDT_CONTRACT) {
            names.insert(addr, "USDT Contract".to_string());
        }
        Self { names }
    }
}

impl ExchangeRegistry {
    /// Empty registry
    pub fn empty() -> Self {
        Self {
            names: HashMap::new(),
        }
    }

    /// Registry from (address, name) pairs
    pub fn from_entries(entries: impl IntoIterator<Item = (Address, String)>) -> Self {
        Self {
            names: entries.into_iter().collect(),
        }
    }

    /// Load from a list file, one `address[,name]` per line.
    ///
    /// Lines that do not start with the address prefix are ignored. A
    /// missing file falls back to the built-in defaults.
    pub fn load(path: impl AsRef<FsPath>) -> AppResult<Self> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "⚠️ Exchange list {} not found, using built-in defaults",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let registry = Self::parse_list(&contents);
        info!(
            "🏦 Loaded {} exchange addresses from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Parse list contents (see [`ExchangeRegistry::load`])
    pub fn parse_list(contents: &str) -> Self {
        let mut names = HashMap::new();
        for line in contents.lines().map(str::trim) {
            if !line.starts_with(ADDRESS_PREFIX) {
                continue;
            }
            let (raw, name) = match line.split_once(',') {
                Some((raw, name)) => (raw.trim(), name.trim()),
                None => (line, ""),
            };
            match Address::parse(raw) {
                Ok(addr) => {
                    let name = if name.is_empty() {
                        "Unknown Exchange".to_string()
                    } else {
                        name.to_string()
                    };
                    names.insert(addr, name);
                }
                Err(_) => debug!("Skipping invalid exchange entry: {}", raw),
            }
        }
        Self { names }
    }

    /// Add or rename an entry
    pub fn insert(&mut self, address: Address, name: impl Into<String>) {
        self.names.insert(address, name.into());
    }

    /// Check if an address is a known exchange
    #[inline]
    pub fn is_exchange(&self, address: &Address) -> bool {
        self.names.contains_key(address)
    }

    /// Display name of a known exchange
    pub fn name_of(&self, address: &Address) -> Option<&str> {
        self.names.get(address).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ============================================
// Analyzer configuration
// ============================================

/// Limits, delays and endpoints for one analysis engine
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// TronGrid REST base URL
    pub trongrid_base_url: String,
    /// TronGrid API key (optional, raises the rate limit)
    pub trongrid_api_key: Option<String>,
    /// TronScan API base URL
    pub tronscan_base_url: String,
    /// TronScan API key (optional)
    pub tronscan_api_key: Option<String>,
    /// Token contract whose transfers form the graph
    pub token_contract: String,
    /// Exchange list file (one address per line)
    pub exchange_list_path: Option<String>,

    /// Crawl depth
    pub max_depth: usize,
    /// Transfers fetched per address during the crawl
    pub max_transactions_per_address: usize,
    /// Exchange addresses fetched per run
    pub max_exchange_lookup: usize,
    /// Addresses fetched per run
    pub max_addresses_to_explore: usize,
    /// Counterparties followed from one address
    pub max_connections_per_address: usize,
    /// Source/target neighbours re-expanded after the seed crawls
    pub max_neighbors_to_expand: usize,

    /// Path-search edge amount floor
    pub min_transaction_amount: f64,
    /// Path-search hub ceiling
    pub max_node_connections: usize,
    /// Visited-set size after which exchanges stop being usable as hops
    pub exchange_bootstrap_size: usize,
    /// Paths kept from the primary search
    pub max_paths: usize,
    /// Paths kept from the common-neighbour fallback
    pub max_extended_paths: usize,

    /// Transfers fetched to classify one address
    pub classification_history_limit: usize,
    /// Distinct addresses whose risk status is looked up
    pub max_risk_checks: usize,
    /// Key addresses computed
    pub key_address_count: usize,
    /// Key addresses reported and classified
    pub reported_key_addresses: usize,

    /// Delay before each recursive crawl fetch
    pub crawl_delay: Duration,
    /// Delay between pages of a paginated fetch
    pub page_delay: Duration,
    /// Delay between risk-status lookups
    pub lookup_delay: Duration,
    /// Delay between classification history fetches
    pub classification_delay: Duration,
    /// HTTP timeout for ledger calls
    pub request_timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            trongrid_base_url: std::env::var("TRONGRID_BASE_URL")
                .unwrap_or_else(|_| TRONGRID_BASE_URL.to_string()),
            trongrid_api_key: env_key("TRONGRID_API_KEY"),
            tronscan_base_url: std::env::var("TRONSCAN_BASE_URL")
                .unwrap_or_else(|_| TRONSCAN_BASE_URL.to_string()),
            tronscan_api_key: env_key("TRONSCAN_API_KEY"),
            token_contract: USDT_CONTRACT.to_string(),
            exchange_list_path: std::env::var("RUSTER_EXCHANGE_LIST").ok(),

            max_depth: env_usize("RUSTER_MAX_DEPTH", DEFAULT_MAX_DEPTH),
            max_transactions_per_address: DEFAULT_MAX_TRANSACTIONS_PER_ADDRESS,
            max_exchange_lookup: DEFAULT_MAX_EXCHANGE_LOOKUP,
            max_addresses_to_explore: env_usize(
                "RUSTER_MAX_ADDRESSES",
                DEFAULT_MAX_ADDRESSES_TO_EXPLORE,
            ),
            max_connections_per_address: DEFAULT_MAX_CONNECTIONS_PER_ADDRESS,
            max_neighbors_to_expand: DEFAULT_MAX_NEIGHBORS_TO_EXPAND,

            min_transaction_amount: DEFAULT_MIN_TRANSACTION_AMOUNT,
            max_node_connections: DEFAULT_MAX_NODE_CONNECTIONS,
            exchange_bootstrap_size: DEFAULT_EXCHANGE_BOOTSTRAP_SIZE,
            max_paths: DEFAULT_MAX_PATHS,
            max_extended_paths: DEFAULT_MAX_EXTENDED_PATHS,

            classification_history_limit: DEFAULT_CLASSIFICATION_HISTORY,
            max_risk_checks: DEFAULT_MAX_RISK_CHECKS,
            key_address_count: DEFAULT_KEY_ADDRESS_COUNT,
            reported_key_addresses: DEFAULT_REPORTED_KEY_ADDRESSES,

            crawl_delay: Duration::from_millis(DEFAULT_CRAWL_DELAY_MS),
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            lookup_delay: Duration::from_millis(DEFAULT_LOOKUP_DELAY_MS),
            classification_delay: Duration::from_millis(DEFAULT_CLASSIFICATION_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl AnalyzerConfig {
    /// Environment-backed configuration
    pub fn from_env() -> Self {
        let config = Self::default();
        if config.trongrid_api_key.is_some() {
            info!("🔑 TRONGRID_API_KEY configured (key hidden for security)");
        } else {
            warn!("⚠️ TRONGRID_API_KEY not set, public rate limits apply");
        }
        config
    }

    /// Same limits with every rate-limit delay removed
    pub fn without_delays(mut self) -> Self {
        self.crawl_delay = Duration::ZERO;
        self.page_delay = Duration::ZERO;
        self.lookup_delay = Duration::ZERO;
        self.classification_delay = Duration::ZERO;
        self
    }

    /// Override crawl depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> AppResult<()> {
        if !(MIN_ANALYSIS_DEPTH..=MAX_ANALYSIS_DEPTH).contains(&self.max_depth) {
            return Err(AppError::invalid_config(format!(
                "max_depth must be between {} and {} (got {})",
                MIN_ANALYSIS_DEPTH, MAX_ANALYSIS_DEPTH, self.max_depth
            )));
        }
        let caps = [
            ("max_transactions_per_address", self.max_transactions_per_address),
            ("max_addresses_to_explore", self.max_addresses_to_explore),
            ("max_connections_per_address", self.max_connections_per_address),
            ("max_node_connections", self.max_node_connections),
            ("max_paths", self.max_paths),
        ];
        if let Some((name, _)) = caps.iter().find(|(_, value)| *value == 0) {
            return Err(AppError::invalid_config(format!("{} must be non-zero", name)));
        }
        if self.min_transaction_amount < 0.0 {
            return Err(AppError::invalid_config("min_transaction_amount must be >= 0"));
        }
        Ok(())
    }

    /// Known-exchange registry from the configured list (or defaults)
    pub fn exchange_registry(&self) -> AppResult<ExchangeRegistry> {
        match &self.exchange_list_path {
            Some(path) => ExchangeRegistry::load(path),
            None => Ok(ExchangeRegistry::default()),
        }
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_contains_usdt_contract() {
        let registry = ExchangeRegistry::default();
        let usdt = Address::parse(USDT_CONTRACT).unwrap();
        assert!(registry.is_exchange(&usdt));
        assert_eq!(registry.name_of(&usdt), Some("USDT Contract"));
    }

    #[test]
    fn test_parse_exchange_list() {
        let contents = "\
# exchanges
TAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA,Binance Hot 1
TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB
Tshort
  TCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC , OKX
";
        let registry = ExchangeRegistry::parse_list(contents);
        assert_eq!(registry.len(), 3);
        let a = Address::parse("TAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").unwrap();
        let b = Address::parse("TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB").unwrap();
        let c = Address::parse("TCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC").unwrap();
        assert_eq!(registry.name_of(&a), Some("Binance Hot 1"));
        assert_eq!(registry.name_of(&b), Some("Unknown Exchange"));
        assert_eq!(registry.name_of(&c), Some("OKX"));
    }

    #[test]
    fn test_missing_exchange_file_falls_back() {
        let registry = ExchangeRegistry::load("/nonexistent/exchanges.txt").unwrap();
        assert_eq!(registry.len(), ExchangeRegistry::default().len());
    }

    #[test]
    fn test_config_validation() {
        let config = AnalyzerConfig::default().with_max_depth(3);
        assert!(config.validate().is_ok());

        let too_deep = AnalyzerConfig::default().with_max_depth(6);
        assert!(too_deep.validate().is_err());

        let mut zero_paths = AnalyzerConfig::default().with_max_depth(2);
        zero_paths.max_paths = 0;
        assert!(zero_paths.validate().is_err());
    }

    #[test]
    fn test_without_delays() {
        assert_eq!(
            AnalyzerConfig::default().classification_delay,
            Duration::from_millis(50)
        );
        let config = AnalyzerConfig::default().without_delays();
        assert_eq!(config.crawl_delay, Duration::ZERO);
        assert_eq!(config.page_delay, Duration::ZERO);
        assert_eq!(config.lookup_delay, Duration::ZERO);
        assert_eq!(config.classification_delay, Duration::ZERO);
    }
}
