//! Analysis Orchestrator
//!
//! Runs one source/target investigation end to end:
//! 1. Crawl outward from the source and inward to the target
//! 2. Re-expand a few direct neighbours of each endpoint
//! 3. PageRank, k-core and label propagation over the crawled graph
//! 4. Path search (extended fallback when nothing is found)
//! 5. Behavior classification of endpoints, path members and key addresses
//! 6. Risk-status lookups, exchange connections, wallet ratings
//! 7. Risk scoring of every path
//!
//! Every piece of mutable state lives inside a single `analyze` call, so
//! one engine can serve concurrent requests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::behavior::{BehaviorClassifier, Classification};
use super::centrality::{CentralityAnalyzer, Community, CommunityContext};
use super::crawler::{CrawlContext, CrawlLimits, GraphCrawler};
use super::path_finder::{PathFinder, SearchLimits, SearchStrategy};
use super::risk_score::{PathData, PathEdge, RiskAssessment, RiskEngine};
use crate::models::{
    Address, AnalyzerConfig, AppError, AppResult, Direction, ExchangeRegistry, Path, WalletCategory,
};
use crate::providers::{AddressRiskStatus, LedgerClient};
use crate::utils::constants::{
    KCORE_MIN_K, LABEL_PROPAGATION_ITERATIONS, MAX_ANALYSIS_DEPTH, MIN_ANALYSIS_DEPTH,
    MIXED_WALLET_ADJUSTMENT, PAGERANK_DAMPING, PAGERANK_ITERATIONS, PATH_PREFIX_CHECKS,
    REPORTED_WALLET_RATINGS, SIGNIFICANT_IMPORTANCE, WALLET_RATING_BASE,
};

// ============================================
// Report types
// ============================================

/// 0-100 rating of one checked address
#[derive(Debug, Clone, Serialize)]
pub struct WalletRating {
    pub address: Address,
    pub overall_rating: u8,
    pub classification: Option<WalletCategory>,
    pub confidence: f64,
    pub importance_score: f64,
    pub blacklist_risk: f64,
    pub is_exchange: bool,
    pub is_blacklisted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockedWallet {
    pub address: Address,
    pub risk_score: f64,
    pub fraud_transaction: bool,
    pub classification: Option<WalletCategory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceConnection {
    pub address: Address,
    pub service_type: String,
    pub service_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyAddress {
    pub address: Address,
    pub importance_score: f64,
    pub classification: Option<WalletCategory>,
    pub rating: Option<WalletRating>,
    pub is_blacklisted: bool,
}

/// Classification of one address as it appears on a path
#[derive(Debug, Clone, Serialize)]
pub struct PathAddress {
    pub address: Address,
    pub category: Option<WalletCategory>,
    pub confidence: f64,
    pub importance: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PathIndicators {
    pub contains_hot_wallets: bool,
    pub high_importance_path: bool,
    pub mixed_types: bool,
}

/// One scored path with its transfer data
#[derive(Debug, Clone, Serialize)]
pub struct PathAnalysis {
    pub path: Path,
    pub hops: usize,
    pub transactions: Vec<PathEdge>,
    pub total_amount: f64,
    pub transaction_count: u64,
    pub risk: RiskAssessment,
    pub blacklisted_addresses: Vec<Address>,
    pub exchange_addresses: Vec<Address>,
    pub address_classifications: Vec<PathAddress>,
    pub average_importance: f64,
    pub hot_wallet_count: usize,
    pub cold_wallet_count: usize,
    pub indicators: PathIndicators,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GraphStatistics {
    pub nodes: usize,
    pub edges: usize,
    pub processed_addresses: usize,
    /// Deepest k-core any address belongs to
    pub max_core: usize,
}

/// Full result of one investigation
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub analysis_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source: Address,
    pub target: Address,
    pub max_depth: usize,
    pub search_strategy: SearchStrategy,
    pub graph_statistics: GraphStatistics,
    pub total_paths_found: usize,
    pub paths: Vec<PathAnalysis>,
    pub shortest_path: Option<PathAnalysis>,
    pub source_classification: Option<Classification>,
    pub target_classification: Option<Classification>,
    pub source_rating: Option<WalletRating>,
    pub target_rating: Option<WalletRating>,
    pub key_addresses: Vec<KeyAddress>,
    pub communities_detected: usize,
    pub communities: Vec<Community>,
    pub blocked_wallets: Vec<BlockedWallet>,
    pub service_connections: Vec<ServiceConnection>,
    pub wallet_ratings: Vec<WalletRating>,
    pub analysis_time_seconds: f64,
    pub analysis_time_minutes: f64,
}

impl AnalysisReport {
    pub fn is_connected(&self) -> bool {
        !self.paths.is_empty()
    }
}

// ============================================
// Engine
// ============================================

/// Stateless entry point; each `analyze` call owns its run state
pub struct AnalysisEngine {
    ledger: Arc<dyn LedgerClient>,
    exchanges: Arc<ExchangeRegistry>,
    config: AnalyzerConfig,
}

impl AnalysisEngine {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        exchanges: Arc<ExchangeRegistry>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            ledger,
            exchanges,
            config,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Investigate whether `source` and `target` are connected
    pub async fn analyze(
        &self,
        source: &Address,
        target: &Address,
        max_depth: usize,
    ) -> AppResult<AnalysisReport> {
        if !(MIN_ANALYSIS_DEPTH..=MAX_ANALYSIS_DEPTH).contains(&max_depth) {
            return Err(AppError::out_of_range(
                "max_depth",
                max_depth,
                MIN_ANALYSIS_DEPTH,
                MAX_ANALYSIS_DEPTH,
            ));
        }
        let config = self.config.clone().with_max_depth(max_depth);
        config.validate()?;

        let start = Instant::now();
        info!(
            "🔍 Analyzing {} -> {} (depth {})",
            source.short(),
            target.short(),
            max_depth
        );

        if source == target {
            return Ok(self.same_address_report(source, max_depth, start));
        }

        // ---- crawl ----
        let mut ctx = CrawlContext::new();
        let crawler = GraphCrawler::new(
            self.ledger.clone(),
            self.exchanges.clone(),
            CrawlLimits::from(&config),
        );
        crawler.explore(&mut ctx, source, 0, Direction::From).await?;
        crawler.explore(&mut ctx, target, 0, Direction::To).await?;
        self.expand_neighbors(&crawler, &mut ctx, source, Direction::From)
            .await?;
        self.expand_neighbors(&crawler, &mut ctx, target, Direction::To)
            .await?;

        let graph = ctx.graph();
        info!(
            "🕸️ Graph built: {} nodes, {} edges, {} addresses fetched",
            graph.node_count(),
            graph.edge_count(),
            ctx.processed_count()
        );

        // ---- graph analytics ----
        let mut centrality = CentralityAnalyzer::new(graph);
        centrality.page_rank(PAGERANK_ITERATIONS, PAGERANK_DAMPING);
        let max_core = centrality
            .k_core(KCORE_MIN_K)
            .values()
            .copied()
            .max()
            .unwrap_or(0);
        centrality.label_propagation(&HashMap::new(), LABEL_PROPAGATION_ITERATIONS);
        let key_addresses = centrality.key_addresses(config.key_address_count);
        let reported_keys: Vec<(Address, f64)> = key_addresses
            .into_iter()
            .take(config.reported_key_addresses)
            .collect();

        // ---- path search ----
        let finder = PathFinder::new(graph, &self.exchanges, SearchLimits::from(&config));
        let mut search = finder.find_paths(source, target, config.max_paths);
        if search.is_empty() {
            info!("🔎 No direct paths found, trying extended search");
            search = finder.extended_paths(source, target, config.max_extended_paths);
        }
        info!(
            "🛤️ {} paths found ({:?})",
            search.paths.len(),
            search.strategy
        );

        // ---- classification ----
        let mut to_classify = OrderedSet::default();
        to_classify.push(source);
        to_classify.push(target);
        for path in &search.paths {
            to_classify.extend(path.addresses());
        }
        to_classify.extend(reported_keys.iter().map(|(a, _)| a));

        let mut classifier =
            BehaviorClassifier::new(self.ledger.clone(), config.classification_history_limit);
        for (i, addr) in to_classify.items().iter().enumerate() {
            if i > 0 && !config.classification_delay.is_zero() {
                tokio::time::sleep(config.classification_delay).await;
            }
            let importance = centrality.importance(addr);
            classifier.classify_address(addr, importance).await?;
        }
        debug!("🏷️ {} addresses classified", classifier.len());

        // ---- risk-status lookups ----
        let mut to_check = OrderedSet::default();
        to_check.push(source);
        to_check.push(target);
        for path in &search.paths {
            to_check.extend(path.addresses().iter().take(PATH_PREFIX_CHECKS));
        }
        to_check.extend(reported_keys.iter().map(|(a, _)| a));

        let mut statuses: HashMap<Address, AddressRiskStatus> = HashMap::new();
        let mut ratings: Vec<WalletRating> = Vec::new();
        let mut service_connections = Vec::new();
        let mut blocked_wallets = Vec::new();

        for (i, addr) in to_check
            .items()
            .iter()
            .take(config.max_risk_checks)
            .enumerate()
        {
            if i > 0 && !config.lookup_delay.is_zero() {
                tokio::time::sleep(config.lookup_delay).await;
            }
            let status = self.risk_status(addr).await?;

            let is_exchange = self.exchanges.is_exchange(addr);
            if let Some(name) = self.exchanges.name_of(addr) {
                service_connections.push(ServiceConnection {
                    address: addr.clone(),
                    service_type: "Exchange".to_string(),
                    service_name: name.to_string(),
                });
            }

            let classification = classifier.get(addr);
            if status.is_blacklisted {
                blocked_wallets.push(BlockedWallet {
                    address: addr.clone(),
                    risk_score: status.risk_score,
                    fraud_transaction: status.has_fraud_transaction,
                    classification: classification.map(|c| c.category),
                });
            }
            ratings.push(wallet_rating(
                addr,
                classification,
                centrality.importance(addr),
                &status,
                is_exchange,
            ));
            statuses.insert(addr.clone(), status);
        }

        // ---- path member checks ----
        // Every path address gets a status before any path is scored; the
        // capped list above only drives the wallet ratings.
        let mut path_checks = 0usize;
        for path in &search.paths {
            for addr in path.addresses() {
                if statuses.contains_key(addr) {
                    continue;
                }
                if !config.lookup_delay.is_zero() {
                    tokio::time::sleep(config.lookup_delay).await;
                }
                let status = self.risk_status(addr).await?;
                statuses.insert(addr.clone(), status);
                path_checks += 1;
            }
        }
        if path_checks > 0 {
            debug!("🔎 {} extra path members checked", path_checks);
        }

        // ---- scoring ----
        let mut engine = RiskEngine::new(self.exchanges.clone(), config.max_node_connections);
        let blacklisted: HashSet<Address> = statuses
            .iter()
            .filter(|(_, status)| status.is_blacklisted)
            .map(|(addr, _)| addr.clone())
            .collect();
        for addr in &blacklisted {
            engine.register_blacklisted(addr.clone());
        }

        let mut paths: Vec<PathAnalysis> = Vec::new();
        for path in search.paths.iter().filter(|p| p.len() >= 2) {
            let data = PathData::from_graph(graph, path);
            let risk = engine.score_path(graph, path, &data);
            paths.push(self.path_analysis(path, data, risk, &classifier, &blacklisted));
        }
        paths.sort_by(|a, b| {
            a.hops
                .cmp(&b.hops)
                .then_with(|| b.risk.score.total_cmp(&a.risk.score))
        });

        // ---- report ----
        let categories = classifier.categories();
        let communities = centrality.community_report(&CommunityContext {
            exchanges: &self.exchanges,
            blacklisted: &blacklisted,
            categories: &categories,
        });

        let rating_of = |addr: &Address| ratings.iter().find(|r| &r.address == addr).cloned();
        let key_addresses: Vec<KeyAddress> = reported_keys
            .iter()
            .map(|(addr, score)| KeyAddress {
                address: addr.clone(),
                importance_score: *score,
                classification: classifier.category_of(addr),
                rating: rating_of(addr),
                is_blacklisted: statuses.get(addr).map_or(false, |s| s.is_blacklisted),
            })
            .collect();

        let elapsed = start.elapsed().as_secs_f64();
        info!(
            "✅ Analysis complete: {} paths, {} blocked wallets in {:.1}s",
            paths.len(),
            blocked_wallets.len(),
            elapsed
        );

        Ok(AnalysisReport {
            analysis_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            source: source.clone(),
            target: target.clone(),
            max_depth,
            search_strategy: search.strategy,
            graph_statistics: GraphStatistics {
                nodes: graph.node_count(),
                edges: graph.edge_count(),
                processed_addresses: ctx.processed_count(),
                max_core,
            },
            total_paths_found: paths.len(),
            shortest_path: paths.first().cloned(),
            source_classification: classifier.get(source).cloned(),
            target_classification: classifier.get(target).cloned(),
            source_rating: rating_of(source),
            target_rating: rating_of(target),
            key_addresses,
            communities_detected: centrality.communities_detected(),
            communities,
            blocked_wallets,
            service_connections,
            wallet_ratings: ratings.iter().take(REPORTED_WALLET_RATINGS).cloned().collect(),
            paths,
            analysis_time_seconds: elapsed,
            analysis_time_minutes: elapsed / 60.0,
        })
    }

    /// Crawl the first few direct neighbours of an endpoint one level deep
    async fn expand_neighbors(
        &self,
        crawler: &GraphCrawler,
        ctx: &mut CrawlContext,
        anchor: &Address,
        direction: Direction,
    ) -> AppResult<()> {
        let cap = crawler.limits().max_addresses;
        if !ctx.graph().contains(anchor) || ctx.processed_count() >= cap {
            return Ok(());
        }

        let neighbors: Vec<Address> = match direction {
            Direction::To => ctx.graph().predecessors(anchor).cloned().collect(),
            _ => ctx.graph().successors(anchor).cloned().collect(),
        };
        debug!(
            "↪️ Expanding {} neighbours of {}",
            neighbors.len().min(self.config.max_neighbors_to_expand),
            anchor.short()
        );

        for neighbor in neighbors.iter().take(self.config.max_neighbors_to_expand) {
            if ctx.processed_count() >= cap {
                break;
            }
            if ctx.is_processed(neighbor) {
                continue;
            }
            let delay = crawler.limits().crawl_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            crawler.explore(ctx, neighbor, 1, direction).await?;
        }
        Ok(())
    }

    async fn risk_status(&self, address: &Address) -> AppResult<AddressRiskStatus> {
        match self.ledger.address_risk_status(address).await {
            Ok(status) => Ok(status),
            Err(e) if e.is_transient() => {
                warn!("⚠️ Risk status unavailable for {}: {}", address.short(), e);
                Ok(AddressRiskStatus::default())
            }
            Err(e) => Err(e),
        }
    }

    fn path_analysis(
        &self,
        path: &Path,
        data: PathData,
        mut risk: RiskAssessment,
        classifier: &BehaviorClassifier,
        blacklisted: &HashSet<Address>,
    ) -> PathAnalysis {
        let members: Vec<PathAddress> = path
            .addresses()
            .iter()
            .map(|addr| {
                let classification = classifier.get(addr);
                PathAddress {
                    address: addr.clone(),
                    category: classification.map(|c| c.category),
                    confidence: classification.map_or(0.0, |c| c.confidence),
                    importance: classification.map_or(0.0, |c| c.importance_score),
                }
            })
            .collect();

        let average_importance = if members.is_empty() {
            0.0
        } else {
            members.iter().map(|m| m.importance).sum::<f64>() / members.len() as f64
        };
        let count_of = |category: WalletCategory| {
            members
                .iter()
                .filter(|m| m.category == Some(category))
                .count()
        };
        let hot_wallet_count = count_of(WalletCategory::Hot);
        let cold_wallet_count = count_of(WalletCategory::Cold);
        let distinct: HashSet<Option<WalletCategory>> = members.iter().map(|m| m.category).collect();

        if distinct.len() > 2 {
            risk.apply_mixed_wallet_adjustment(MIXED_WALLET_ADJUSTMENT);
        }

        PathAnalysis {
            path: path.clone(),
            hops: path.hops(),
            total_amount: data.total_amount,
            transaction_count: data.transaction_count,
            transactions: data.edges,
            risk,
            blacklisted_addresses: path
                .addresses()
                .iter()
                .filter(|a| blacklisted.contains(a))
                .cloned()
                .collect(),
            exchange_addresses: path
                .addresses()
                .iter()
                .filter(|a| self.exchanges.is_exchange(a))
                .cloned()
                .collect(),
            address_classifications: members,
            average_importance,
            hot_wallet_count,
            cold_wallet_count,
            indicators: PathIndicators {
                contains_hot_wallets: hot_wallet_count > 0,
                high_importance_path: average_importance > SIGNIFICANT_IMPORTANCE,
                mixed_types: distinct.len() > 1,
            },
        }
    }

    /// Report for source == target: no ledger calls at all
    fn same_address_report(
        &self,
        address: &Address,
        max_depth: usize,
        start: Instant,
    ) -> AnalysisReport {
        let path = Path::single(address.clone());
        let analysis = PathAnalysis {
            hops: 0,
            transactions: Vec::new(),
            total_amount: 0.0,
            transaction_count: 0,
            risk: RiskEngine::new(self.exchanges.clone(), self.config.max_node_connections)
                .score_path(&Default::default(), &path, &PathData::default()),
            blacklisted_addresses: Vec::new(),
            exchange_addresses: Vec::new(),
            address_classifications: Vec::new(),
            average_importance: 0.0,
            hot_wallet_count: 0,
            cold_wallet_count: 0,
            indicators: PathIndicators::default(),
            path,
        };
        let elapsed = start.elapsed().as_secs_f64();

        AnalysisReport {
            analysis_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            source: address.clone(),
            target: address.clone(),
            max_depth,
            search_strategy: SearchStrategy::SameAddress,
            graph_statistics: GraphStatistics::default(),
            total_paths_found: 1,
            shortest_path: Some(analysis.clone()),
            paths: vec![analysis],
            source_classification: None,
            target_classification: None,
            source_rating: None,
            target_rating: None,
            key_addresses: Vec::new(),
            communities_detected: 0,
            communities: Vec::new(),
            blocked_wallets: Vec::new(),
            service_connections: Vec::new(),
            wallet_ratings: Vec::new(),
            analysis_time_seconds: elapsed,
            analysis_time_minutes: elapsed / 60.0,
        }
    }
}

/// Rating: base 50, hot +20, cold -10, significant importance +15,
/// upstream risk -30, exchange +10, clamped to 0..=100
pub fn wallet_rating(
    address: &Address,
    classification: Option<&Classification>,
    importance: f64,
    status: &AddressRiskStatus,
    is_exchange: bool,
) -> WalletRating {
    let category = classification.map(|c| c.category);
    let mut rating = WALLET_RATING_BASE;
    match category {
        Some(WalletCategory::Hot) => rating += 20,
        Some(WalletCategory::Cold) => rating -= 10,
        _ => {}
    }
    if importance > SIGNIFICANT_IMPORTANCE {
        rating += 15;
    }
    if status.risk_score > 0.0 {
        rating -= 30;
    }
    if is_exchange {
        rating += 10;
    }

    WalletRating {
        address: address.clone(),
        overall_rating: rating.clamp(0, 100) as u8,
        classification: category,
        confidence: classification.map_or(0.0, |c| c.confidence),
        importance_score: importance,
        blacklist_risk: status.risk_score,
        is_exchange,
        is_blacklisted: status.is_blacklisted,
    }
}

/// Insertion-ordered, duplicate-free address list
#[derive(Default)]
struct OrderedSet {
    seen: HashSet<Address>,
    items: Vec<Address>,
}

impl OrderedSet {
    fn push(&mut self, address: &Address) {
        if self.seen.insert(address.clone()) {
            self.items.push(address.clone());
        }
    }

    fn extend<'a>(&mut self, addresses: impl IntoIterator<Item = &'a Address>) {
        for address in addresses {
            self.push(address);
        }
    }

    fn items(&self) -> &[Address] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::InMemoryLedger;

    fn addr(tag: &str) -> Address {
        Address::parse(&format!("T{:A<33}", tag)).unwrap()
    }

    fn engine(
        ledger: InMemoryLedger,
        exchanges: ExchangeRegistry,
    ) -> (AnalysisEngine, Arc<InMemoryLedger>) {
        let ledger = Arc::new(ledger);
        let engine = AnalysisEngine::new(
            ledger.clone(),
            Arc::new(exchanges),
            AnalyzerConfig::default().without_delays(),
        );
        (engine, ledger)
    }

    #[tokio::test]
    async fn test_same_address_makes_no_calls() {
        let (engine, ledger) = engine(InMemoryLedger::new(), ExchangeRegistry::empty());
        let a = addr("A");
        let report = engine.analyze(&a, &a, 2).await.unwrap();

        assert_eq!(ledger.total_calls(), 0);
        assert_eq!(report.search_strategy, SearchStrategy::SameAddress);
        assert_eq!(report.paths.len(), 1);
        assert_eq!(report.paths[0].hops, 0);
        assert_eq!(report.paths[0].risk.score, 0.0);
    }

    #[tokio::test]
    async fn test_depth_out_of_range_rejected_before_calls() {
        let (engine, ledger) = engine(InMemoryLedger::new(), ExchangeRegistry::empty());
        let err = engine.analyze(&addr("A"), &addr("B"), 6).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(ledger.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_blacklisted_intermediate_raises_risk() {
        let (a, b, c) = (addr("A"), addr("B"), addr("C"));
        let ledger = InMemoryLedger::new()
            .with_transfer(a.as_str(), b.as_str(), 5_000.0, 1_700_000_000_000, "h1")
            .with_transfer(b.as_str(), c.as_str(), 5_000.0, 1_700_000_060_000, "h2")
            .with_risk_status(b.as_str(), AddressRiskStatus::blacklisted(80.0));
        let (engine, _) = engine(ledger, ExchangeRegistry::empty());

        let report = engine.analyze(&a, &c, 2).await.unwrap();
        assert!(report.is_connected());
        let best = report.shortest_path.as_ref().unwrap();
        assert_eq!(best.path.addresses(), &[a.clone(), b.clone(), c.clone()]);
        assert_eq!(best.blacklisted_addresses, vec![b.clone()]);
        assert!(best.risk.breakdown.blacklist >= 50.0);
        assert_eq!(report.blocked_wallets.len(), 1);
        assert_eq!(report.blocked_wallets[0].address, b);
    }

    #[tokio::test]
    async fn test_every_path_member_checked_past_lookup_budget() {
        let (s, t) = (addr("S"), addr("T"));
        let mut ledger = InMemoryLedger::new();
        let mut bad = Vec::new();
        for i in 0..20 {
            let p = addr(&format!("P{:02}", i));
            let q = addr(&format!("Q{:02}", i));
            let r = addr(&format!("R{:02}", i));
            let ts = 1_700_000_000_000 + i as i64 * 1_000;
            ledger = ledger
                .with_transfer(s.as_str(), p.as_str(), 1_000.0, ts, &format!("sp{}", i))
                .with_transfer(p.as_str(), q.as_str(), 1_000.0, ts + 1, &format!("pq{}", i))
                .with_transfer(q.as_str(), r.as_str(), 1_000.0, ts + 2, &format!("qr{}", i))
                .with_transfer(r.as_str(), t.as_str(), 1_000.0, ts + 3, &format!("rt{}", i))
                .with_risk_status(r.as_str(), AddressRiskStatus::blacklisted(90.0));
            bad.push(r);
        }
        let (engine, _) = engine(ledger, ExchangeRegistry::empty());

        let report = engine.analyze(&s, &t, 4).await.unwrap();
        assert_eq!(report.paths.len(), 20);
        for path in &report.paths {
            assert_eq!(path.blacklisted_addresses.len(), 1, "{:?}", path.path);
            assert!(bad.contains(&path.blacklisted_addresses[0]));
            assert!(path.risk.breakdown.blacklist >= 50.0);
        }
        // Ratings and blocked wallets stay within the lookup budget
        assert!(report.blocked_wallets.len() < 20);
        assert!(report.wallet_ratings.len() <= engine.config().max_risk_checks);
    }

    #[test]
    fn test_wallet_rating_clamped() {
        let status = AddressRiskStatus::blacklisted(90.0);
        let rating = wallet_rating(&addr("A"), None, 0.0, &status, false);
        assert_eq!(rating.overall_rating, 20);

        let rating = wallet_rating(&addr("A"), None, 0.5, &AddressRiskStatus::default(), true);
        assert_eq!(rating.overall_rating, 75);
    }

    #[test]
    fn test_ordered_set_keeps_first_occurrence() {
        let mut set = OrderedSet::default();
        set.push(&addr("B"));
        set.extend([&addr("A"), &addr("B"), &addr("C")]);
        assert_eq!(set.items(), &[addr("B"), addr("A"), addr("C")]);
    }
}
