//! Path Finder
//!
//! Connects two addresses over the crawled graph:
//! 1. Degenerate source == target
//! 2. Exchange shortcut (shared exchange one hop from both ends)
//! 3. Frontier-balanced bidirectional BFS with hub / dust / exchange pruning
//! 4. Shortest-first simple-path enumeration when the search never meets
//!
//! `extended_paths` is a separate, cheaper common-neighbour fallback the
//! engine reaches for when all of the above come back empty.
//!
//! The bidirectional search stops after the first round that produces a
//! meeting point, so a shorter path reachable one round later from the
//! other side can be missed. Paths are deduplicated by exact sequence.

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use super::graph::TransactionGraph;
use crate::models::{Address, AnalyzerConfig, ExchangeRegistry, Path};

/// Which stage produced the paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    SameAddress,
    ExchangeShortcut,
    Bidirectional,
    SimplePaths,
    CommonNeighbors,
    NotFound,
}

/// Paths plus the stage that found them
#[derive(Debug, Clone)]
pub struct PathSearch {
    pub paths: Vec<Path>,
    pub strategy: SearchStrategy,
}

impl PathSearch {
    fn new(paths: Vec<Path>, strategy: SearchStrategy) -> Self {
        let strategy = if paths.is_empty() {
            SearchStrategy::NotFound
        } else {
            strategy
        };
        Self { paths, strategy }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Search limits copied out of `AnalyzerConfig`
#[derive(Debug, Clone)]
pub struct SearchLimits {
    /// Bidirectional rounds, and hop cutoff for the simple-path fallback
    pub max_depth: usize,
    /// Edges below this aggregated amount are not followed
    pub min_transaction_amount: f64,
    /// Nodes with more neighbours than this are never expanded
    pub max_node_connections: usize,
    /// Exchanges stop being usable hops once a side has visited this many
    pub exchange_bootstrap_size: usize,
}

impl From<&AnalyzerConfig> for SearchLimits {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            min_transaction_amount: config.min_transaction_amount,
            max_node_connections: config.max_node_connections,
            exchange_bootstrap_size: config.exchange_bootstrap_size,
        }
    }
}

// ============================================
// Search side state
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Forward,
    Backward,
}

#[derive(Debug)]
struct Frontier {
    queue: VecDeque<Address>,
    visited: HashSet<Address>,
    /// Child -> parent on this side; roots have no entry
    parents: HashMap<Address, Address>,
}

impl Frontier {
    fn rooted_at(root: &Address) -> Self {
        Self {
            queue: VecDeque::from([root.clone()]),
            visited: HashSet::from([root.clone()]),
            parents: HashMap::new(),
        }
    }

    /// Walk parents from `from` to this side's root, `from` first
    fn chain(&self, from: &Address) -> Vec<Address> {
        let mut chain = vec![from.clone()];
        let mut cursor = from;
        while let Some(parent) = self.parents.get(cursor) {
            chain.push(parent.clone());
            cursor = parent;
        }
        chain
    }
}

// ============================================
// Path finder
// ============================================

/// Path search over one run's graph
pub struct PathFinder<'a> {
    graph: &'a TransactionGraph,
    exchanges: &'a ExchangeRegistry,
    limits: SearchLimits,
}

impl<'a> PathFinder<'a> {
    pub fn new(
        graph: &'a TransactionGraph,
        exchanges: &'a ExchangeRegistry,
        limits: SearchLimits,
    ) -> Self {
        Self {
            graph,
            exchanges,
            limits,
        }
    }

    /// Stages 1-4, first stage with results wins
    pub fn find_paths(&self, source: &Address, target: &Address, max_paths: usize) -> PathSearch {
        if source == target {
            return PathSearch::new(vec![Path::single(source.clone())], SearchStrategy::SameAddress);
        }

        if let Some(path) = self.exchange_shortcut(source, target) {
            debug!("🏦 Exchange shortcut found: {:?}", path);
            return PathSearch::new(vec![path], SearchStrategy::ExchangeShortcut);
        }

        let paths = self.bidirectional(source, target, max_paths);
        if !paths.is_empty() {
            return PathSearch::new(paths, SearchStrategy::Bidirectional);
        }

        let paths = self.simple_paths(source, target, self.limits.max_depth, max_paths);
        PathSearch::new(paths, SearchStrategy::SimplePaths)
    }

    /// Known exchange that is a successor of `source` and predecessor of
    /// `target`, or failing that a predecessor of `source` and successor of
    /// `target`
    pub fn exchange_shortcut(&self, source: &Address, target: &Address) -> Option<Path> {
        let shared = |a: std::collections::BTreeSet<&Address>,
                      b: std::collections::BTreeSet<&Address>| {
            a.intersection(&b)
                .find(|addr| self.exchanges.is_exchange(addr))
                .map(|addr| (*addr).clone())
        };

        shared(
            self.graph.successor_set(source),
            self.graph.predecessor_set(target),
        )
        .or_else(|| {
            shared(
                self.graph.predecessor_set(source),
                self.graph.successor_set(target),
            )
        })
        .map(|hub| Path::new(vec![source.clone(), hub, target.clone()]))
    }

    /// Frontier-balanced bidirectional BFS.
    ///
    /// Each round expands one full level of the side with fewer queued
    /// nodes (ties go forward). If that side has run dry the other side is
    /// expanded instead of spending the round on an empty queue.
    pub fn bidirectional(&self, source: &Address, target: &Address, max_paths: usize) -> Vec<Path> {
        let mut forward = Frontier::rooted_at(source);
        let mut backward = Frontier::rooted_at(target);
        let mut found: Vec<Path> = Vec::new();
        let mut seen: HashSet<Path> = HashSet::new();

        for round in 0..self.limits.max_depth {
            if forward.queue.is_empty() && backward.queue.is_empty() {
                break;
            }

            let side = if backward.queue.is_empty()
                || (!forward.queue.is_empty() && forward.queue.len() <= backward.queue.len())
            {
                Side::Forward
            } else {
                Side::Backward
            };

            let meetings = match side {
                Side::Forward => self.expand_level(Side::Forward, &mut forward, &backward),
                Side::Backward => self.expand_level(Side::Backward, &mut backward, &forward),
            };

            for meeting in meetings {
                let Some(path) = Self::reconstruct(&meeting, &forward, &backward) else {
                    continue;
                };
                if seen.insert(path.clone()) {
                    found.push(path);
                    if found.len() >= max_paths {
                        return found;
                    }
                }
            }

            if !found.is_empty() {
                debug!("🔀 Frontiers met in round {} ({} paths)", round + 1, found.len());
                break;
            }
        }

        found
    }

    /// Expand one level of `active`; returns meeting points with `opposite`
    fn expand_level(&self, side: Side, active: &mut Frontier, opposite: &Frontier) -> Vec<Address> {
        let mut meetings = Vec::new();
        let mut next = VecDeque::new();

        while let Some(current) = active.queue.pop_front() {
            let neighbor_count = match side {
                Side::Forward => self.graph.out_degree(&current),
                Side::Backward => self.graph.in_degree(&current),
            };
            if neighbor_count > self.limits.max_node_connections {
                debug!(
                    "⏭️ Not expanding hub {} ({} neighbours)",
                    current.short(),
                    neighbor_count
                );
                continue;
            }

            let neighbors: Vec<&Address> = match side {
                Side::Forward => self.graph.successors(&current).collect(),
                Side::Backward => self.graph.predecessors(&current).collect(),
            };

            for neighbor in neighbors {
                if active.visited.contains(neighbor) {
                    continue;
                }
                if self.exchanges.is_exchange(neighbor)
                    && active.visited.len() > self.limits.exchange_bootstrap_size
                {
                    continue;
                }

                let edge = match side {
                    Side::Forward => self.graph.edge(&current, neighbor),
                    Side::Backward => self.graph.edge(neighbor, &current),
                };
                if edge.map_or(0.0, |e| e.total_amount) < self.limits.min_transaction_amount {
                    continue;
                }

                active.visited.insert(neighbor.clone());
                active.parents.insert(neighbor.clone(), current.clone());
                if opposite.visited.contains(neighbor) {
                    meetings.push(neighbor.clone());
                }
                next.push_back(neighbor.clone());
            }
        }

        active.queue = next;
        meetings
    }

    /// Source..meeting from the forward parents, then meeting..target from
    /// the backward parents; meeting appears once
    fn reconstruct(meeting: &Address, forward: &Frontier, backward: &Frontier) -> Option<Path> {
        let mut addresses = forward.chain(meeting);
        addresses.reverse();
        addresses.extend(backward.chain(meeting).into_iter().skip(1));

        let path = Path::new(addresses);
        (path.len() > 1 && path.is_simple()).then_some(path)
    }

    /// Simple paths of at most `max_hops` hops, shortest first
    pub fn simple_paths(
        &self,
        source: &Address,
        target: &Address,
        max_hops: usize,
        max_paths: usize,
    ) -> Vec<Path> {
        let mut paths = Vec::new();
        if max_paths == 0 {
            return paths;
        }

        // Iterative deepening keeps the output ordered by length
        for hops in 1..=max_hops {
            let mut trail = vec![source.clone()];
            let mut on_trail: HashSet<Address> = HashSet::from([source.clone()]);
            self.collect_exact(target, hops, &mut trail, &mut on_trail, &mut paths, max_paths);
            if paths.len() >= max_paths {
                break;
            }
        }
        paths
    }

    fn collect_exact(
        &self,
        target: &Address,
        remaining: usize,
        trail: &mut Vec<Address>,
        on_trail: &mut HashSet<Address>,
        out: &mut Vec<Path>,
        max_paths: usize,
    ) {
        let Some(current) = trail.last().cloned() else {
            return;
        };
        let next: Vec<Address> = self.graph.successors(&current).cloned().collect();

        for neighbor in next {
            if out.len() >= max_paths {
                return;
            }
            if on_trail.contains(&neighbor) {
                continue;
            }
            if remaining == 1 {
                if &neighbor == target {
                    let mut addresses = trail.clone();
                    addresses.push(neighbor);
                    out.push(Path::new(addresses));
                }
                continue;
            }
            if &neighbor == target {
                continue;
            }

            on_trail.insert(neighbor.clone());
            trail.push(neighbor.clone());
            self.collect_exact(target, remaining - 1, trail, on_trail, out, max_paths);
            trail.pop();
            on_trail.remove(&neighbor);
        }
    }

    /// Common-neighbour fallback: `[s, i, t]` for every successor of `s`
    /// that precedes `t`, then `[s, i1, i2, t]` two-hop compositions
    pub fn extended_paths(&self, source: &Address, target: &Address, max_paths: usize) -> PathSearch {
        if !self.graph.contains(source) || !self.graph.contains(target) {
            return PathSearch::new(Vec::new(), SearchStrategy::CommonNeighbors);
        }

        let successors = self.graph.successor_set(source);
        let predecessors = self.graph.predecessor_set(target);
        let mut paths = Vec::new();

        for middle in successors.intersection(&predecessors) {
            if paths.len() >= max_paths {
                break;
            }
            let path = Path::new(vec![source.clone(), (*middle).clone(), target.clone()]);
            if path.is_simple() {
                paths.push(path);
            }
        }

        'outer: for first in &successors {
            for second in self.graph.successors(first) {
                if paths.len() >= max_paths {
                    break 'outer;
                }
                if !predecessors.contains(second) {
                    continue;
                }
                let path = Path::new(vec![
                    source.clone(),
                    (*first).clone(),
                    second.clone(),
                    target.clone(),
                ]);
                if path.is_simple() {
                    paths.push(path);
                }
            }
        }

        PathSearch::new(paths, SearchStrategy::CommonNeighbors)
    }
}
