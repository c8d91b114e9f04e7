//! Risk Scoring Engine
//!
//! Combines independent risk signals into a single 0-100 score per path:
//! - Direct hits against blacklist / sanctions / mixer / scam registries
//! - Transfer patterns (velocity, structuring, high connectivity)
//! - Graph proximity to risky addresses (1 and 2 hops)
//! - Behavioral signals (exchanges on path, high-activity addresses)
//! - Path complexity and volume tiers
//!
//! Each component is computed on its own and recorded in a fixed-field
//! breakdown. The total is clamped to [0, 100] and banded with
//! [`RiskLevel::from_score`].

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::graph::TransactionGraph;
use crate::models::{Address, ExchangeRegistry, Path, RiskLevel};
use crate::utils::constants::{
    in_structuring_band, COMPLEX_PATH_HOPS, HIGH_ACTIVITY_DEGREE, LAYERING_EXCHANGE_COUNT,
    MAX_RISK_SCORE, MODERATE_PATH_HOPS, PROXIMITY_DIRECT_FACTOR, PROXIMITY_TWO_HOP_FACTOR,
    SINGLE_EXCHANGE_CREDIT, STRUCTURING_MIN_EDGES, VELOCITY_TRANSFER_THRESHOLD, VOLUME_LARGE,
    VOLUME_VERY_LARGE, WEIGHT_BLACKLIST, WEIGHT_EXCHANGE_RISK, WEIGHT_HIGH_CONNECTIVITY,
    WEIGHT_HOT_WALLET, WEIGHT_KNOWN_SCAM, WEIGHT_MIXER, WEIGHT_PATH_COMPLEXITY, WEIGHT_SANCTIONS,
    WEIGHT_STRUCTURING, WEIGHT_VELOCITY, WEIGHT_VOLUME_ANOMALY,
};

// ============================================
// Risky address registry
// ============================================

/// Known-bad address sets, grown by explicit registration only
#[derive(Debug, Clone, Default)]
pub struct RiskyAddressRegistry {
    pub blacklisted: HashSet<Address>,
    pub sanctioned: HashSet<Address>,
    pub mixers: HashSet<Address>,
    pub scams: HashSet<Address>,
}

impl RiskyAddressRegistry {
    /// Blacklisted or sanctioned: the sets proximity is measured against
    pub fn is_risky(&self, address: &Address) -> bool {
        self.blacklisted.contains(address) || self.sanctioned.contains(address)
    }

    pub fn has_risky(&self) -> bool {
        !self.blacklisted.is_empty() || !self.sanctioned.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blacklisted.len() + self.sanctioned.len() + self.mixers.len() + self.scams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================
// Breakdown / assessment
// ============================================

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

/// Named contribution of each risk component (zero = not triggered)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskBreakdown {
    pub blacklist: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub velocity_anomaly: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub structuring: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub high_connectivity: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub proximity_to_risky: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub proximity_to_risky_2hop: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub multiple_exchanges: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub exchange_connection: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub hot_wallet_activity: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub complex_path: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub very_large_transaction: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub large_transaction: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub high_total_volume: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub mixed_wallet_types: f64,
}

impl RiskBreakdown {
    /// Unclamped sum of every component
    pub fn total(&self) -> f64 {
        self.blacklist
            + self.velocity_anomaly
            + self.structuring
            + self.high_connectivity
            + self.proximity_to_risky
            + self.proximity_to_risky_2hop
            + self.multiple_exchanges
            + self.exchange_connection
            + self.hot_wallet_activity
            + self.complex_path
            + self.very_large_transaction
            + self.large_transaction
            + self.high_total_volume
            + self.mixed_wallet_types
    }
}

/// Aggregated edge as seen by the scorer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathEdge {
    pub from: Address,
    pub to: Address,
    pub count: u64,
    pub total_amount: f64,
    pub tx_hashes: Vec<String>,
}

/// Per-hop transfer data for one path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathData {
    pub edges: Vec<PathEdge>,
    pub total_amount: f64,
    pub transaction_count: u64,
}

impl PathData {
    /// Collect the graph edges along a path (missing hops are left out)
    pub fn from_graph(graph: &TransactionGraph, path: &Path) -> Self {
        let edges: Vec<PathEdge> = path
            .hop_pairs()
            .filter_map(|(from, to)| graph.edge(from, to))
            .map(|edge| PathEdge {
                from: edge.from.clone(),
                to: edge.to.clone(),
                count: edge.count,
                total_amount: edge.total_amount,
                tx_hashes: edge.tx_hashes(),
            })
            .collect();

        Self {
            total_amount: edges.iter().map(|e| e.total_amount).sum(),
            transaction_count: edges.iter().map(|e| e.count).sum(),
            edges,
        }
    }
}

/// Scored path
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub level: RiskLevel,
    pub breakdown: RiskBreakdown,
    pub warnings: Vec<String>,
    pub recommendation: String,
    pub blacklisted_count: usize,
    pub sanctioned_count: usize,
}

impl RiskAssessment {
    fn empty() -> Self {
        Self {
            score: 0.0,
            level: RiskLevel::Low,
            breakdown: RiskBreakdown::default(),
            warnings: Vec::new(),
            recommendation: recommendation(0.0).to_string(),
            blacklisted_count: 0,
            sanctioned_count: 0,
        }
    }

    fn from_breakdown(
        breakdown: RiskBreakdown,
        warnings: Vec<String>,
        blacklisted_count: usize,
        sanctioned_count: usize,
    ) -> Self {
        let score = clamp_score(breakdown.total());
        Self {
            score,
            level: RiskLevel::from_score(score),
            breakdown,
            warnings,
            recommendation: recommendation(score).to_string(),
            blacklisted_count,
            sanctioned_count,
        }
    }

    /// Record the wallet-mix adjustment and re-band the result
    pub fn apply_mixed_wallet_adjustment(&mut self, amount: f64) {
        self.breakdown.mixed_wallet_types += amount;
        self.score = clamp_score(self.breakdown.total());
        self.level = RiskLevel::from_score(self.score);
        self.recommendation = recommendation(self.score).to_string();
    }
}

fn clamp_score(raw: f64) -> f64 {
    (raw.clamp(0.0, MAX_RISK_SCORE) * 100.0).round() / 100.0
}

/// Recommendation text for a score, same bands as [`RiskLevel`]
pub fn recommendation(score: f64) -> &'static str {
    match RiskLevel::from_score(score) {
        RiskLevel::Critical => "⚠️ CRITICAL RISK: Do not proceed with this transaction. Addresses are blacklisted or show severe risk indicators.",
        RiskLevel::High => "🔴 HIGH RISK: Strongly recommend additional due diligence before proceeding. Multiple risk factors detected.",
        RiskLevel::Medium => "🟡 MEDIUM RISK: Proceed with caution. Some risk indicators present. Review transaction details carefully.",
        RiskLevel::LowMedium => "🟢 LOW-MEDIUM RISK: Generally safe but monitor for unusual patterns.",
        RiskLevel::Low => "✅ LOW RISK: Transaction appears to be low risk. Standard monitoring recommended.",
    }
}

/// Whole-dollar amount with thousands separators ("1,250,000")
pub fn format_amount(amount: f64) -> String {
    let whole = amount.round().abs() as u128;
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount.round() < 0.0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ============================================
// Engine
// ============================================

/// Multi-factor path scorer for one analysis run
pub struct RiskEngine {
    exchanges: Arc<ExchangeRegistry>,
    registry: RiskyAddressRegistry,
    /// address -> (directly touches risky, within two hops of risky)
    proximity_cache: HashMap<Address, (bool, bool)>,
    high_connectivity_degree: usize,
}

impl RiskEngine {
    pub fn new(exchanges: Arc<ExchangeRegistry>, high_connectivity_degree: usize) -> Self {
        Self {
            exchanges,
            registry: RiskyAddressRegistry::default(),
            proximity_cache: HashMap::new(),
            high_connectivity_degree,
        }
    }

    pub fn registry(&self) -> &RiskyAddressRegistry {
        &self.registry
    }

    pub fn register_blacklisted(&mut self, address: Address) {
        self.registry.blacklisted.insert(address);
        self.proximity_cache.clear();
    }

    pub fn register_sanctioned(&mut self, address: Address) {
        self.registry.sanctioned.insert(address);
        self.proximity_cache.clear();
    }

    pub fn register_mixer(&mut self, address: Address) {
        self.registry.mixers.insert(address);
        self.proximity_cache.clear();
    }

    pub fn register_scam(&mut self, address: Address) {
        self.registry.scams.insert(address);
        self.proximity_cache.clear();
    }

    /// Merge a whole registry at once
    pub fn batch_register(&mut self, batch: RiskyAddressRegistry) {
        self.registry.blacklisted.extend(batch.blacklisted);
        self.registry.sanctioned.extend(batch.sanctioned);
        self.registry.mixers.extend(batch.mixers);
        self.registry.scams.extend(batch.scams);
        self.proximity_cache.clear();
    }

    /// Cached proximity entries (exposed for diagnostics)
    pub fn cached_proximity_entries(&self) -> usize {
        self.proximity_cache.len()
    }

    /// Score one path
    pub fn score_path(
        &mut self,
        graph: &TransactionGraph,
        path: &Path,
        data: &PathData,
    ) -> RiskAssessment {
        if path.len() < 2 {
            return RiskAssessment::empty();
        }

        let mut breakdown = RiskBreakdown::default();
        let mut warnings = Vec::new();

        let (blacklisted_count, sanctioned_count) =
            self.direct_hits(path, &mut breakdown, &mut warnings);
        self.transfer_patterns(graph, path, data, &mut breakdown, &mut warnings);
        self.proximity(graph, path, &mut breakdown, &mut warnings);
        self.behavior(graph, path, &mut breakdown, &mut warnings);
        complexity(path, &mut breakdown, &mut warnings);
        volume(data, &mut breakdown, &mut warnings);

        let assessment =
            RiskAssessment::from_breakdown(breakdown, warnings, blacklisted_count, sanctioned_count);
        debug!(
            "📊 Path of {} hops scored {:.2} ({})",
            path.hops(),
            assessment.score,
            assessment.level
        );
        assessment
    }

    fn direct_hits(
        &self,
        path: &Path,
        breakdown: &mut RiskBreakdown,
        warnings: &mut Vec<String>,
    ) -> (usize, usize) {
        let mut score = 0.0;
        let mut blacklisted = 0;
        let mut sanctioned = 0;

        for addr in path.addresses() {
            if self.registry.blacklisted.contains(addr) {
                blacklisted += 1;
                score += WEIGHT_BLACKLIST;
                warnings.push(format!("🚫 BLACKLISTED ADDRESS: {}", addr.short()));
            } else if self.registry.sanctioned.contains(addr) {
                sanctioned += 1;
                score += WEIGHT_SANCTIONS;
                warnings.push(format!("⚠️ SANCTIONED ADDRESS: {}", addr.short()));
            }
        }
        for addr in path.addresses() {
            if self.registry.mixers.contains(addr) {
                score += WEIGHT_MIXER;
                warnings.push(format!("🌀 MIXER/TUMBLER DETECTED: {}", addr.short()));
            }
        }
        for addr in path.addresses() {
            if self.registry.scams.contains(addr) {
                score += WEIGHT_KNOWN_SCAM;
                warnings.push(format!("⚠️ KNOWN SCAM ADDRESS: {}", addr.short()));
            }
        }

        breakdown.blacklist = score.min(MAX_RISK_SCORE);
        (blacklisted, sanctioned)
    }

    /// Velocity, structuring and high connectivity; needs edge data
    fn transfer_patterns(
        &self,
        graph: &TransactionGraph,
        path: &Path,
        data: &PathData,
        breakdown: &mut RiskBreakdown,
        warnings: &mut Vec<String>,
    ) {
        if data.edges.is_empty() {
            return;
        }

        if data.edges.len() > 1 {
            let transfers: u64 = data.edges.iter().map(|e| e.count).sum();
            if transfers > VELOCITY_TRANSFER_THRESHOLD {
                breakdown.velocity_anomaly = WEIGHT_VELOCITY;
                warnings.push(format!(
                    "⚡ VELOCITY ANOMALY: {} transactions detected",
                    transfers
                ));
            }
        }

        let structured = data
            .edges
            .iter()
            .filter(|e| e.total_amount > 0.0 && in_structuring_band(e.total_amount))
            .count();
        if structured >= STRUCTURING_MIN_EDGES {
            breakdown.structuring = WEIGHT_STRUCTURING;
            warnings.push(format!(
                "📊 STRUCTURING DETECTED: {} transactions just below thresholds",
                structured
            ));
        }

        if let Some((addr, degree)) = path
            .addresses()
            .iter()
            .map(|a| (a, graph.degree(a)))
            .find(|(_, degree)| *degree > self.high_connectivity_degree)
        {
            breakdown.high_connectivity = WEIGHT_HIGH_CONNECTIVITY;
            warnings.push(format!(
                "🔗 HIGH CONNECTIVITY: {} has {} connections",
                addr.short(),
                degree
            ));
        }
    }

    fn proximity(
        &mut self,
        graph: &TransactionGraph,
        path: &Path,
        breakdown: &mut RiskBreakdown,
        warnings: &mut Vec<String>,
    ) {
        if !self.registry.has_risky() {
            return;
        }

        let flags: Vec<(bool, bool)> = path
            .addresses()
            .iter()
            .map(|addr| self.proximity_flags(graph, addr))
            .collect();

        if let Some(i) = flags.iter().position(|(direct, _)| *direct) {
            breakdown.proximity_to_risky = WEIGHT_BLACKLIST * PROXIMITY_DIRECT_FACTOR;
            warnings.push(format!(
                "🔴 PROXIMITY RISK: {} directly connected to risky address",
                path.addresses()[i].short()
            ));
        }
        if let Some(i) = flags.iter().position(|(_, two_hop)| *two_hop) {
            breakdown.proximity_to_risky_2hop = WEIGHT_BLACKLIST * PROXIMITY_TWO_HOP_FACTOR;
            warnings.push(format!(
                "🟡 2-HOP PROXIMITY: {} within 2 hops of risky address",
                path.addresses()[i].short()
            ));
        }
    }

    fn proximity_flags(&mut self, graph: &TransactionGraph, address: &Address) -> (bool, bool) {
        if let Some(flags) = self.proximity_cache.get(address) {
            return *flags;
        }

        let registry = &self.registry;
        let touches_risky =
            |addr: &Address| graph.undirected_neighbors(addr).into_iter().any(|n| registry.is_risky(n));

        let flags = if graph.contains(address) {
            let direct = touches_risky(address);
            let two_hop = graph
                .undirected_neighbors(address)
                .into_iter()
                .any(|neighbor| touches_risky(neighbor));
            (direct, two_hop)
        } else {
            (false, false)
        };

        self.proximity_cache.insert(address.clone(), flags);
        flags
    }

    fn behavior(
        &self,
        graph: &TransactionGraph,
        path: &Path,
        breakdown: &mut RiskBreakdown,
        warnings: &mut Vec<String>,
    ) {
        let exchanges = path
            .addresses()
            .iter()
            .filter(|a| self.exchanges.is_exchange(a))
            .count();
        if exchanges >= LAYERING_EXCHANGE_COUNT {
            breakdown.multiple_exchanges = WEIGHT_EXCHANGE_RISK * 1.5;
            warnings.push(format!(
                "🏦 MULTIPLE EXCHANGES: {} exchange addresses in path (possible layering)",
                exchanges
            ));
        } else if exchanges == 1 {
            breakdown.exchange_connection = SINGLE_EXCHANGE_CREDIT;
            warnings.push(
                "🏦 EXCHANGE CONNECTION: Legitimate exchange detected (risk reduced)".to_string(),
            );
        }

        let busy = path
            .addresses()
            .iter()
            .filter(|a| graph.degree(a) > HIGH_ACTIVITY_DEGREE)
            .count();
        if busy > 2 {
            breakdown.hot_wallet_activity = WEIGHT_HOT_WALLET * busy as f64;
            warnings.push(format!(
                "🔥 HIGH ACTIVITY: {} high-activity addresses in path",
                busy
            ));
        }
    }
}

fn complexity(path: &Path, breakdown: &mut RiskBreakdown, warnings: &mut Vec<String>) {
    let hops = path.hops();
    if hops >= COMPLEX_PATH_HOPS {
        breakdown.complex_path = WEIGHT_PATH_COMPLEXITY * hops as f64 / COMPLEX_PATH_HOPS as f64;
        warnings.push(format!(
            "🔀 COMPLEX PATH: {} hops detected (possible layering)",
            hops
        ));
    } else if hops >= MODERATE_PATH_HOPS {
        breakdown.complex_path = WEIGHT_PATH_COMPLEXITY * 0.5;
        warnings.push(format!("🔀 MODERATE COMPLEXITY: {} hops in path", hops));
    }
}

fn volume(data: &PathData, breakdown: &mut RiskBreakdown, warnings: &mut Vec<String>) {
    let amounts: Vec<f64> = data
        .edges
        .iter()
        .map(|e| e.total_amount)
        .filter(|a| *a > 0.0)
        .collect();
    if amounts.is_empty() {
        return;
    }

    let max = amounts.iter().copied().fold(f64::MIN, f64::max);
    let total: f64 = amounts.iter().sum();

    if max >= VOLUME_VERY_LARGE {
        breakdown.very_large_transaction = WEIGHT_VOLUME_ANOMALY * 2.0;
        warnings.push(format!(
            "💰 VERY LARGE TRANSACTION: ${} USDT",
            format_amount(max)
        ));
    } else if max >= VOLUME_LARGE {
        breakdown.large_transaction = WEIGHT_VOLUME_ANOMALY;
        warnings.push(format!("💰 LARGE TRANSACTION: ${} USDT", format_amount(max)));
    }

    if total >= VOLUME_VERY_LARGE {
        breakdown.high_total_volume = WEIGHT_VOLUME_ANOMALY * 1.5;
        warnings.push(format!(
            "💰 HIGH TOTAL VOLUME: ${} USDT across path",
            format_amount(total)
        ));
    }
}
