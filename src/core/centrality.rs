//! Centrality & Community Analysis
//!
//! Graph analytics over the crawled transaction graph:
//! - PageRank importance (fixed iteration budget, no tolerance loop)
//! - k-core depth on the undirected projection
//! - Label propagation communities with deterministic tie-breaking
//! - Community report: composition stats, type, name and risk level

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

use super::graph::TransactionGraph;
use crate::models::{Address, ExchangeRegistry, RiskLevel, WalletCategory};
use crate::utils::constants::{
    DOMINANT_CATEGORY_RATIO, KCORE_CEILING, LABEL_PROPAGATION_ITERATIONS, PAGERANK_DAMPING,
    PAGERANK_ITERATIONS, SMALL_COMMUNITY_SIZE,
};

// ============================================
// Community report types
// ============================================

/// What dominates a community
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunityType {
    Blocked,
    Exchange,
    Hot,
    Cold,
    Unknown,
}

/// One detected community with its composition
#[derive(Debug, Clone, Serialize)]
pub struct Community {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub community_type: CommunityType,
    pub member_count: usize,
    pub addresses: Vec<Address>,
    pub characteristics: Vec<String>,
    pub risk_level: RiskLevel,
    pub exchange_count: usize,
    pub blacklisted_count: usize,
    pub hot_wallet_count: usize,
    pub cold_wallet_count: usize,
}

/// Facts about addresses the report needs beyond graph structure
pub struct CommunityContext<'a> {
    pub exchanges: &'a ExchangeRegistry,
    pub blacklisted: &'a HashSet<Address>,
    pub categories: &'a HashMap<Address, WalletCategory>,
}

// ============================================
// Analyzer
// ============================================

/// Importance and community analysis, caching the last computed results
pub struct CentralityAnalyzer<'a> {
    graph: &'a TransactionGraph,
    pagerank: Option<HashMap<Address, f64>>,
    labels: Option<BTreeMap<Address, String>>,
}

impl<'a> CentralityAnalyzer<'a> {
    pub fn new(graph: &'a TransactionGraph) -> Self {
        Self {
            graph,
            pagerank: None,
            labels: None,
        }
    }

    /// Power-iteration PageRank, exactly `max_iterations` rounds.
    ///
    /// Unweighted; rank held by nodes without out-edges is spread uniformly.
    pub fn page_rank(&mut self, max_iterations: usize, damping: f64) -> &HashMap<Address, f64> {
        let nodes: Vec<&Address> = self.graph.nodes().collect();
        let n = nodes.len();
        let mut scores: HashMap<Address, f64> = HashMap::with_capacity(n);

        if n > 0 {
            let uniform = 1.0 / n as f64;
            let mut rank: HashMap<&Address, f64> = nodes.iter().map(|a| (*a, uniform)).collect();

            for _ in 0..max_iterations {
                let dangling: f64 = nodes
                    .iter()
                    .filter(|a| self.graph.out_degree(a) == 0)
                    .map(|a| rank[*a])
                    .sum();
                let base = (1.0 - damping) * uniform + damping * dangling * uniform;

                let mut next: HashMap<&Address, f64> = nodes.iter().map(|a| (*a, base)).collect();
                for node in &nodes {
                    let out = self.graph.out_degree(node);
                    if out == 0 {
                        continue;
                    }
                    let share = damping * rank[*node] / out as f64;
                    for succ in self.graph.successors(node) {
                        if let Some(slot) = next.get_mut(succ) {
                            *slot += share;
                        }
                    }
                }
                rank = next;
            }

            scores.extend(rank.into_iter().map(|(a, s)| (a.clone(), s)));
        }

        debug!("📈 PageRank over {} nodes ({} iterations)", n, max_iterations);
        self.pagerank.insert(scores)
    }

    /// PageRank with default parameters, computed once
    pub fn importance_scores(&mut self) -> &HashMap<Address, f64> {
        if self.pagerank.is_none() {
            self.page_rank(PAGERANK_ITERATIONS, PAGERANK_DAMPING);
        }
        self.pagerank.get_or_insert_with(HashMap::new)
    }

    /// Importance of one address (0 when unknown)
    pub fn importance(&mut self, address: &Address) -> f64 {
        self.importance_scores().get(address).copied().unwrap_or(0.0)
    }

    /// Top-N addresses by importance, descending; ties by address
    pub fn key_addresses(&mut self, top_n: usize) -> Vec<(Address, f64)> {
        let mut ranked: Vec<(Address, f64)> = self
            .importance_scores()
            .iter()
            .map(|(a, s)| (a.clone(), *s))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(top_n);
        ranked
    }

    /// Core depth per node.
    ///
    /// Nodes outside the `k`-core get 0; others get the largest threshold
    /// in `k..KCORE_CEILING` whose core still contains them (at least `k`).
    pub fn k_core(&self, k: usize) -> BTreeMap<Address, usize> {
        let cores = self.core_numbers();
        cores
            .into_iter()
            .map(|(address, core)| {
                if core < k {
                    return (address, 0);
                }
                let mut depth = k;
                for threshold in k..KCORE_CEILING {
                    if core >= threshold {
                        depth = threshold;
                    } else {
                        break;
                    }
                }
                (address, depth)
            })
            .collect()
    }

    /// Core number of every node by repeated min-degree peeling
    fn core_numbers(&self) -> BTreeMap<Address, usize> {
        let mut degree: HashMap<&Address, usize> = self
            .graph
            .nodes()
            .map(|a| (a, self.graph.undirected_neighbors(a).len()))
            .collect();
        let mut queue: BTreeSet<(usize, &Address)> = degree.iter().map(|(a, d)| (*d, *a)).collect();
        let mut removed: HashSet<&Address> = HashSet::new();
        let mut cores = BTreeMap::new();
        let mut current = 0;

        while let Some((d, node)) = queue.pop_first() {
            current = current.max(d);
            cores.insert(node.clone(), current);
            removed.insert(node);

            for neighbor in self.graph.undirected_neighbors(node) {
                if removed.contains(neighbor) {
                    continue;
                }
                if let Some(nd) = degree.get_mut(neighbor) {
                    if *nd > 0 {
                        queue.remove(&(*nd, neighbor));
                        *nd -= 1;
                        queue.insert((*nd, neighbor));
                    }
                }
            }
        }
        cores
    }

    /// Asynchronous label propagation over the undirected projection.
    ///
    /// Nodes are swept in address order; a node adopts the most frequent
    /// label among its neighbours, lowest label on ties. Stops when a sweep
    /// changes nothing or after `max_iterations` sweeps. Labels are then
    /// renamed `community_{i}` by first appearance, and `known_labels`
    /// override the result for their addresses.
    pub fn label_propagation(
        &mut self,
        known_labels: &HashMap<Address, String>,
        max_iterations: usize,
    ) -> &BTreeMap<Address, String> {
        let nodes: Vec<&Address> = self.graph.nodes().collect();
        let mut labels: HashMap<&Address, &Address> = nodes.iter().map(|a| (*a, *a)).collect();

        for sweep in 0..max_iterations {
            let mut changed = false;
            for node in &nodes {
                let mut counts: BTreeMap<&Address, usize> = BTreeMap::new();
                for neighbor in self.graph.undirected_neighbors(node) {
                    if let Some(label) = labels.get(neighbor) {
                        *counts.entry(*label).or_insert(0) += 1;
                    }
                }
                let Some(best) = counts.values().copied().max() else {
                    continue;
                };
                // BTreeMap iterates labels ascending, so the first hit is the lowest
                let Some(winner) = counts
                    .iter()
                    .find(|(_, count)| **count == best)
                    .map(|(label, _)| *label)
                else {
                    continue;
                };
                if labels.get(*node) != Some(&winner) {
                    labels.insert(*node, winner);
                    changed = true;
                }
            }
            if !changed {
                debug!("🏘️ Label propagation converged after {} sweeps", sweep + 1);
                break;
            }
        }

        let mut renamed: HashMap<&Address, String> = HashMap::new();
        let mut result = BTreeMap::new();
        for node in &nodes {
            let raw = labels.get(*node).copied().unwrap_or(*node);
            let next_id = renamed.len();
            let name = renamed
                .entry(raw)
                .or_insert_with(|| format!("community_{}", next_id))
                .clone();
            result.insert((*node).clone(), name);
        }
        for (address, label) in known_labels {
            result.insert(address.clone(), label.clone());
        }

        self.labels.insert(result)
    }

    /// Labels from the last propagation run (defaults if none yet)
    pub fn communities(&mut self) -> &BTreeMap<Address, String> {
        if self.labels.is_none() {
            self.label_propagation(&HashMap::new(), LABEL_PROPAGATION_ITERATIONS);
        }
        self.labels.get_or_insert_with(BTreeMap::new)
    }

    /// Distinct community labels
    pub fn communities_detected(&mut self) -> usize {
        self.communities().values().collect::<HashSet<_>>().len()
    }

    /// Members sharing `address`'s community (just itself when unlabelled)
    pub fn community_members(&mut self, address: &Address) -> BTreeSet<Address> {
        let labels = self.communities();
        match labels.get(address) {
            Some(label) => labels
                .iter()
                .filter(|(_, l)| *l == label)
                .map(|(a, _)| a.clone())
                .collect(),
            None => BTreeSet::from([address.clone()]),
        }
    }

    /// Named, typed communities, largest first
    pub fn community_report(&mut self, ctx: &CommunityContext<'_>) -> Vec<Community> {
        let labels = self.communities();

        let mut order: Vec<&String> = Vec::new();
        let mut groups: HashMap<&String, Vec<Address>> = HashMap::new();
        for (address, label) in labels {
            let members = groups.entry(label).or_insert_with(|| {
                order.push(label);
                Vec::new()
            });
            members.push(address.clone());
        }

        let mut report: Vec<Community> = order
            .into_iter()
            .filter_map(|label| {
                groups
                    .remove(label)
                    .map(|members| describe_community(label.clone(), members, ctx))
            })
            .collect();
        report.sort_by(|a, b| b.member_count.cmp(&a.member_count));
        report
    }
}

/// Classify and name one community
fn describe_community(id: String, members: Vec<Address>, ctx: &CommunityContext<'_>) -> Community {
    let total = members.len();
    let exchange_count = members.iter().filter(|a| ctx.exchanges.is_exchange(a)).count();
    let blacklisted_count = members.iter().filter(|a| ctx.blacklisted.contains(*a)).count();
    let count_category = |category: WalletCategory| {
        members
            .iter()
            .filter(|a| ctx.categories.get(*a) == Some(&category))
            .count()
    };
    let hot_wallet_count = count_category(WalletCategory::Hot);
    let cold_wallet_count = count_category(WalletCategory::Cold);

    let ratio = |count: usize| if total > 0 { count as f64 / total as f64 } else { 0.0 };
    let blacklisted_ratio = ratio(blacklisted_count);

    let mut community_type = CommunityType::Unknown;
    let mut name_parts: Vec<String> = Vec::new();
    let mut characteristics = Vec::new();

    if blacklisted_count > 0 {
        community_type = CommunityType::Blocked;
        if blacklisted_count == total {
            name_parts.push("🚫 Blocked Addresses".to_string());
        } else {
            name_parts.push(format!("⚠️ Mixed (Contains {} Blocked)", blacklisted_count));
        }
        characteristics.push(format!("{} blocked address(es)", blacklisted_count));
    }

    if exchange_count > 0 {
        if community_type == CommunityType::Unknown {
            community_type = CommunityType::Exchange;
        }
        if exchange_count == total {
            let mut names: Vec<&str> = Vec::new();
            for member in &members {
                let name = ctx.exchanges.name_of(member).unwrap_or("Exchange");
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            match names.as_slice() {
                [single] => name_parts.push(format!("🏦 {} Community", single)),
                [] => name_parts.push("🏦 Exchange Community".to_string()),
                many => name_parts.push(format!(
                    "🏦 Exchange Community ({})",
                    many.iter().take(2).copied().collect::<Vec<_>>().join(", ")
                )),
            }
        } else {
            name_parts.push(format!(
                "🏦 Exchange-Related ({}/{} exchanges)",
                exchange_count, total
            ));
        }
        characteristics.push(format!("{} exchange address(es)", exchange_count));
    }

    if ratio(hot_wallet_count) > DOMINANT_CATEGORY_RATIO {
        if name_parts.is_empty() {
            name_parts.push("🔥 High Activity Community".to_string());
        }
        if community_type == CommunityType::Unknown {
            community_type = CommunityType::Hot;
        }
        characteristics.push(format!("{} hot wallet(s)", hot_wallet_count));
    }

    if ratio(cold_wallet_count) > DOMINANT_CATEGORY_RATIO {
        if name_parts.is_empty() {
            name_parts.push("❄️ Low Activity Community".to_string());
        }
        if community_type == CommunityType::Unknown {
            community_type = CommunityType::Cold;
        }
        characteristics.push(format!("{} cold wallet(s)", cold_wallet_count));
    }

    if name_parts.is_empty() {
        name_parts.push(match total {
            1 => "👤 Single Address".to_string(),
            n if n <= SMALL_COMMUNITY_SIZE => "👥 Small Community".to_string(),
            _ => "👥 Regular Community".to_string(),
        });
    }

    let risk_level = if blacklisted_ratio >= 0.5 {
        RiskLevel::High
    } else if blacklisted_ratio > 0.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    Community {
        id,
        name: name_parts.join(" | "),
        community_type,
        member_count: total,
        addresses: members,
        characteristics,
        risk_level,
        exchange_count,
        blacklisted_count,
        hot_wallet_count,
        cold_wallet_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transfer;

    fn addr(tag: &str) -> Address {
        Address::parse(&format!("T{:A<33}", tag)).unwrap()
    }

    fn link(graph: &mut TransactionGraph, from: &Address, to: &Address) {
        graph.add_transfer(&Transfer {
            from: from.clone(),
            to: to.clone(),
            amount: 100.0,
            timestamp_ms: 0,
            tx_hash: format!("{}{}", from, to),
        });
    }

    fn two_triangles() -> TransactionGraph {
        let mut graph = TransactionGraph::new();
        let (a, b, c) = (addr("A"), addr("B"), addr("C"));
        let (x, y, z) = (addr("X"), addr("Y"), addr("Z"));
        link(&mut graph, &a, &b);
        link(&mut graph, &b, &c);
        link(&mut graph, &c, &a);
        link(&mut graph, &x, &y);
        link(&mut graph, &y, &z);
        link(&mut graph, &z, &x);
        graph
    }

    #[test]
    fn test_pagerank_sums_to_one() {
        let mut graph = TransactionGraph::new();
        let (a, b, c, d) = (addr("A"), addr("B"), addr("C"), addr("D"));
        link(&mut graph, &a, &b);
        link(&mut graph, &b, &c);
        link(&mut graph, &c, &a);
        link(&mut graph, &a, &d);

        let mut analyzer = CentralityAnalyzer::new(&graph);
        let scores = analyzer.page_rank(PAGERANK_ITERATIONS, PAGERANK_DAMPING);
        let total: f64 = scores.values().sum();
        assert!((total - 1.0).abs() < 1e-9, "sum was {}", total);
        assert!(scores.values().all(|s| *s > 0.0));
    }

    #[test]
    fn test_pagerank_empty_graph() {
        let graph = TransactionGraph::new();
        let mut analyzer = CentralityAnalyzer::new(&graph);
        assert!(analyzer.page_rank(15, 0.85).is_empty());
        assert!(analyzer.key_addresses(5).is_empty());
    }

    #[test]
    fn test_key_addresses_sink_ranks_first() {
        let mut graph = TransactionGraph::new();
        let hub = addr("H");
        for tag in ["A", "B", "C", "D"] {
            link(&mut graph, &addr(tag), &hub);
        }
        let mut analyzer = CentralityAnalyzer::new(&graph);
        let top = analyzer.key_addresses(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, hub);
        // Remaining scores tie; lowest address wins
        assert_eq!(top[1].0, addr("A"));
    }

    #[test]
    fn test_k_core_depths() {
        let mut graph = two_triangles();
        let tail = addr("Q");
        link(&mut graph, &addr("A"), &tail);
        graph.add_node(&addr("L"));

        let analyzer = CentralityAnalyzer::new(&graph);
        let cores = analyzer.k_core(1);
        assert_eq!(cores[&addr("A")], 2);
        assert_eq!(cores[&addr("X")], 2);
        assert_eq!(cores[&tail], 1);
        assert_eq!(cores[&addr("L")], 0);

        let strict = analyzer.k_core(2);
        assert_eq!(strict[&tail], 0);
        assert_eq!(strict[&addr("B")], 2);
    }

    #[test]
    fn test_label_propagation_separates_components() {
        let graph = two_triangles();
        let mut analyzer = CentralityAnalyzer::new(&graph);
        let labels = analyzer.label_propagation(&HashMap::new(), LABEL_PROPAGATION_ITERATIONS).clone();

        assert_eq!(labels[&addr("A")], "community_0");
        assert_eq!(labels[&addr("A")], labels[&addr("B")]);
        assert_eq!(labels[&addr("B")], labels[&addr("C")]);
        assert_eq!(labels[&addr("X")], "community_1");
        assert_eq!(labels[&addr("X")], labels[&addr("Z")]);
        assert_eq!(analyzer.communities_detected(), 2);
        assert_eq!(analyzer.community_members(&addr("Y")).len(), 3);
    }

    #[test]
    fn test_label_propagation_deterministic_and_known_labels() {
        let graph = two_triangles();
        let first = CentralityAnalyzer::new(&graph)
            .label_propagation(&HashMap::new(), 20)
            .clone();
        let second = CentralityAnalyzer::new(&graph)
            .label_propagation(&HashMap::new(), 20)
            .clone();
        assert_eq!(first, second);

        let known = HashMap::from([(addr("Z"), "binance".to_string())]);
        let mut analyzer = CentralityAnalyzer::new(&graph);
        let labels = analyzer.label_propagation(&known, 20);
        assert_eq!(labels[&addr("Z")], "binance");
        assert_eq!(labels[&addr("X")], "community_1");
    }

    #[test]
    fn test_community_report_types() {
        let graph = two_triangles();
        let mut analyzer = CentralityAnalyzer::new(&graph);
        analyzer.label_propagation(&HashMap::new(), 20);

        let exchanges = ExchangeRegistry::from_entries([(addr("X"), "Binance".to_string())]);
        let blacklisted = HashSet::from([addr("A"), addr("B")]);
        let categories = HashMap::new();
        let ctx = CommunityContext {
            exchanges: &exchanges,
            blacklisted: &blacklisted,
            categories: &categories,
        };

        let report = analyzer.community_report(&ctx);
        assert_eq!(report.len(), 2);

        let blocked = report.iter().find(|c| c.id == "community_0").unwrap();
        assert_eq!(blocked.community_type, CommunityType::Blocked);
        assert_eq!(blocked.risk_level, RiskLevel::High);
        assert_eq!(blocked.name, "⚠️ Mixed (Contains 2 Blocked)");

        let exchange = report.iter().find(|c| c.id == "community_1").unwrap();
        assert_eq!(exchange.community_type, CommunityType::Exchange);
        assert_eq!(exchange.risk_level, RiskLevel::Low);
        assert_eq!(exchange.name, "🏦 Exchange-Related (1/3 exchanges)");
    }

    #[test]
    fn test_describe_community_naming() {
        let exchanges = ExchangeRegistry::from_entries([
            (addr("E"), "OKX".to_string()),
            (addr("F"), "OKX".to_string()),
        ]);
        let blacklisted = HashSet::from([addr("Z")]);
        let categories = HashMap::from([
            (addr("H"), WalletCategory::Hot),
            (addr("I"), WalletCategory::Hot),
            (addr("J"), WalletCategory::Cold),
        ]);
        let ctx = CommunityContext {
            exchanges: &exchanges,
            blacklisted: &blacklisted,
            categories: &categories,
        };

        let all_exchange = describe_community("c".into(), vec![addr("E"), addr("F")], &ctx);
        assert_eq!(all_exchange.name, "🏦 OKX Community");

        let one_blocked = describe_community("c".into(), vec![addr("Z")], &ctx);
        assert_eq!(one_blocked.name, "🚫 Blocked Addresses");
        assert_eq!(one_blocked.risk_level, RiskLevel::High);

        let mostly_hot = describe_community("c".into(), vec![addr("H"), addr("I"), addr("J")], &ctx);
        assert_eq!(mostly_hot.community_type, CommunityType::Hot);
        assert_eq!(mostly_hot.name, "🔥 High Activity Community");

        let single = describe_community("c".into(), vec![addr("S")], &ctx);
        assert_eq!(single.community_type, CommunityType::Unknown);
        assert_eq!(single.name, "👤 Single Address");

        let large: Vec<Address> = ["K", "M", "N", "O"].iter().map(|t| addr(t)).collect();
        assert_eq!(describe_community("c".into(), large, &ctx).name, "👥 Regular Community");
    }
}
