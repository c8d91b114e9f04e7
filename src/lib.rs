//! Ruster Trace Library
//!
//! Transfer-path tracing and AML risk scoring between TRC20 (USDT)
//! addresses:
//! - Incremental transaction-graph crawl against a ledger indexer
//! - Exchange-shortcut and bidirectional path search with hub pruning
//! - PageRank, k-core and label-propagation communities
//! - Hot / cold / common wallet classification
//! - Multi-factor path risk scoring

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{
    AnalysisEngine, AnalysisReport, BehaviorClassifier, CentralityAnalyzer, GraphCrawler,
    PathFinder, RiskAssessment, RiskEngine, TransactionGraph,
};
pub use crate::models::{Address, AnalyzerConfig, AppError, AppResult, ExchangeRegistry, Path};
pub use crate::providers::{InMemoryLedger, LedgerClient, TronGridClient};
pub use crate::utils::{AddressLookupCache, CacheStats};
