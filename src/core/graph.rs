//! Transaction Graph
//!
//! Directed graph of addresses where parallel transfers between the same
//! ordered pair collapse into one aggregated `Edge`. A transfer is keyed
//! by its hash, so refetching the same movement from the other endpoint
//! never double-counts it.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::{Address, Transfer};

/// Reference to one transfer folded into an edge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRef {
    pub tx_hash: String,
    pub amount: f64,
    pub timestamp_ms: i64,
}

/// Aggregation of every transfer between an ordered address pair
#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub from: Address,
    pub to: Address,
    pub count: u64,
    pub total_amount: f64,
    pub transfers: Vec<TransferRef>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl Edge {
    fn new(from: Address, to: Address) -> Self {
        Self {
            from,
            to,
            count: 0,
            total_amount: 0.0,
            transfers: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Fold a transfer in; false if its hash was already counted
    fn absorb(&mut self, transfer: &Transfer) -> bool {
        if !self.seen.insert(transfer.tx_hash.clone()) {
            return false;
        }
        self.count += 1;
        self.total_amount += transfer.amount;
        self.transfers.push(TransferRef {
            tx_hash: transfer.tx_hash.clone(),
            amount: transfer.amount,
            timestamp_ms: transfer.timestamp_ms,
        });
        true
    }

    pub fn tx_hashes(&self) -> Vec<String> {
        self.transfers.iter().map(|t| t.tx_hash.clone()).collect()
    }
}

/// Edge-aggregated directed transaction graph owned by one analysis run
#[derive(Debug, Clone, Default)]
pub struct TransactionGraph {
    nodes: BTreeSet<Address>,
    edges: HashMap<(Address, Address), Edge>,
    successors: HashMap<Address, BTreeSet<Address>>,
    predecessors: HashMap<Address, BTreeSet<Address>>,
}

impl TransactionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node (no-op if present)
    pub fn add_node(&mut self, address: &Address) {
        if !self.nodes.contains(address) {
            self.nodes.insert(address.clone());
        }
    }

    /// Fold a transfer into its (from, to) edge.
    ///
    /// Returns false when the same transaction hash was already counted on
    /// that edge.
    pub fn add_transfer(&mut self, transfer: &Transfer) -> bool {
        self.add_node(&transfer.from);
        self.add_node(&transfer.to);

        let key = (transfer.from.clone(), transfer.to.clone());
        let edge = self
            .edges
            .entry(key)
            .or_insert_with(|| Edge::new(transfer.from.clone(), transfer.to.clone()));
        if !edge.absorb(transfer) {
            return false;
        }

        self.successors
            .entry(transfer.from.clone())
            .or_default()
            .insert(transfer.to.clone());
        self.predecessors
            .entry(transfer.to.clone())
            .or_default()
            .insert(transfer.from.clone());
        true
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.nodes.contains(address)
    }

    pub fn edge(&self, from: &Address, to: &Address) -> Option<&Edge> {
        self.edges.get(&(from.clone(), to.clone()))
    }

    pub fn has_edge(&self, from: &Address, to: &Address) -> bool {
        self.edge(from, to).is_some()
    }

    /// Receivers of `address`, in address order
    pub fn successors<'a>(&'a self, address: &Address) -> impl Iterator<Item = &'a Address> + 'a {
        self.successors.get(address).into_iter().flatten()
    }

    /// Senders to `address`, in address order
    pub fn predecessors<'a>(&'a self, address: &Address) -> impl Iterator<Item = &'a Address> + 'a {
        self.predecessors.get(address).into_iter().flatten()
    }

    pub fn successor_set(&self, address: &Address) -> BTreeSet<&Address> {
        self.successors(address).collect()
    }

    pub fn predecessor_set(&self, address: &Address) -> BTreeSet<&Address> {
        self.predecessors(address).collect()
    }

    pub fn out_degree(&self, address: &Address) -> usize {
        self.successors.get(address).map_or(0, BTreeSet::len)
    }

    pub fn in_degree(&self, address: &Address) -> usize {
        self.predecessors.get(address).map_or(0, BTreeSet::len)
    }

    /// Combined in + out degree
    pub fn degree(&self, address: &Address) -> usize {
        self.in_degree(address) + self.out_degree(address)
    }

    /// Neighbours ignoring direction, excluding self-loops
    pub fn undirected_neighbors(&self, address: &Address) -> BTreeSet<&Address> {
        self.successors(address)
            .chain(self.predecessors(address))
            .filter(|n| *n != address)
            .collect()
    }

    /// Nodes in address order
    pub fn nodes(&self) -> impl Iterator<Item = &Address> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
