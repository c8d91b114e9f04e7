//! Graph Crawler
//!
//! Depth-bounded exploration that pulls transfer history from the ledger
//! and folds it into the run's `TransactionGraph`.
//!
//! Exploration is depth-first over an explicit work stack. Each entry
//! carries a shared ancestor chain so an address never repeats within one
//! root-to-leaf chain, while the context's processed set guarantees every
//! address's history is fetched at most once per run (diamond-shaped
//! revisits through other branches are skipped, not refetched).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::graph::TransactionGraph;
use crate::models::{Address, AnalyzerConfig, AppResult, Direction, ExchangeRegistry};
use crate::providers::LedgerClient;

// ============================================
// Crawl context (per-run mutable state)
// ============================================

/// Graph plus processed-address bookkeeping for one analysis run
#[derive(Debug, Default)]
pub struct CrawlContext {
    graph: TransactionGraph,
    processed: HashSet<Address>,
    exchanges_processed: usize,
}

impl CrawlContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &TransactionGraph {
        &self.graph
    }

    pub fn into_graph(self) -> TransactionGraph {
        self.graph
    }

    /// Addresses whose history has been fetched (or attempted)
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn is_processed(&self, address: &Address) -> bool {
        self.processed.contains(address)
    }

    pub fn exchanges_processed(&self) -> usize {
        self.exchanges_processed
    }

    fn mark_processed(&mut self, address: &Address, is_exchange: bool) {
        if self.processed.insert(address.clone()) && is_exchange {
            self.exchanges_processed += 1;
        }
    }
}

/// Counters for one `explore` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub addresses_fetched: usize,
    pub transfers_added: usize,
    pub records_skipped: usize,
    pub failed_fetches: usize,
}

impl CrawlStats {
    fn merge(&mut self, other: CrawlStats) {
        self.addresses_fetched += other.addresses_fetched;
        self.transfers_added += other.transfers_added;
        self.records_skipped += other.records_skipped;
        self.failed_fetches += other.failed_fetches;
    }
}

// ============================================
// Work stack entries
// ============================================

/// Immutable link in a root-to-leaf exploration chain
#[derive(Debug)]
struct Ancestor {
    address: Address,
    parent: Option<Arc<Ancestor>>,
}

fn chain_contains(chain: &Option<Arc<Ancestor>>, address: &Address) -> bool {
    let mut cursor = chain.as_ref();
    while let Some(link) = cursor {
        if &link.address == address {
            return true;
        }
        cursor = link.parent.as_ref();
    }
    false
}

#[derive(Debug)]
struct Frame {
    address: Address,
    depth: usize,
    /// Chain of addresses above this one (excluding itself)
    ancestors: Option<Arc<Ancestor>>,
}

// ============================================
// Crawler
// ============================================

/// Crawl limits copied out of `AnalyzerConfig`
#[derive(Debug, Clone)]
pub struct CrawlLimits {
    pub max_depth: usize,
    pub max_addresses: usize,
    pub max_exchange_lookup: usize,
    pub max_transactions_per_address: usize,
    pub max_connections_per_address: usize,
    pub crawl_delay: Duration,
}

impl From<&AnalyzerConfig> for CrawlLimits {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_addresses: config.max_addresses_to_explore,
            max_exchange_lookup: config.max_exchange_lookup,
            max_transactions_per_address: config.max_transactions_per_address,
            max_connections_per_address: config.max_connections_per_address,
            crawl_delay: config.crawl_delay,
        }
    }
}

/// Builds the transaction graph from seed addresses
pub struct GraphCrawler {
    ledger: Arc<dyn LedgerClient>,
    exchanges: Arc<ExchangeRegistry>,
    limits: CrawlLimits,
}

impl GraphCrawler {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        exchanges: Arc<ExchangeRegistry>,
        limits: CrawlLimits,
    ) -> Self {
        Self {
            ledger,
            exchanges,
            limits,
        }
    }

    pub fn limits(&self) -> &CrawlLimits {
        &self.limits
    }

    /// Explore from `seed` starting at `depth`, following `direction`.
    ///
    /// Pruning is evaluated for every address before its fetch, in order:
    /// global address cap (stops the crawl), already processed, depth
    /// limit, exchange cap. Transient ledger failures leave the address as
    /// an isolated node; malformed records are skipped.
    pub async fn explore(
        &self,
        ctx: &mut CrawlContext,
        seed: &Address,
        depth: usize,
        direction: Direction,
    ) -> AppResult<CrawlStats> {
        let mut stats = CrawlStats::default();
        let mut stack = vec![Frame {
            address: seed.clone(),
            depth,
            ancestors: None,
        }];

        while let Some(frame) = stack.pop() {
            if ctx.processed_count() >= self.limits.max_addresses {
                debug!(
                    "🛑 Address cap reached ({}), crawl stopped",
                    self.limits.max_addresses
                );
                break;
            }
            if ctx.is_processed(&frame.address) {
                continue;
            }
            if frame.depth > self.limits.max_depth {
                continue;
            }
            if chain_contains(&frame.ancestors, &frame.address) {
                continue;
            }
            let is_exchange = self.exchanges.is_exchange(&frame.address);
            if is_exchange && ctx.exchanges_processed() >= self.limits.max_exchange_lookup {
                debug!("🏦 Exchange cap reached, skipping {}", frame.address.short());
                continue;
            }

            ctx.mark_processed(&frame.address, is_exchange);

            if frame.ancestors.is_some() && !self.limits.crawl_delay.is_zero() {
                tokio::time::sleep(self.limits.crawl_delay).await;
            }

            let (children, frame_stats) = self.fetch_and_fold(ctx, &frame, direction).await?;
            stats.merge(frame_stats);

            let chain = Some(Arc::new(Ancestor {
                address: frame.address.clone(),
                parent: frame.ancestors.clone(),
            }));
            // Reverse so the first-discovered counterparty is explored first
            for child in children.into_iter().rev() {
                stack.push(Frame {
                    address: child,
                    depth: frame.depth + 1,
                    ancestors: chain.clone(),
                });
            }
        }

        info!(
            "🕸️ Crawl from {} ({}): {} fetched, {} transfers, graph {} nodes / {} edges",
            seed.short(),
            direction.as_str(),
            stats.addresses_fetched,
            stats.transfers_added,
            ctx.graph.node_count(),
            ctx.graph.edge_count()
        );
        Ok(stats)
    }

    /// Fetch one address's history, fold it into the graph, and return the
    /// counterparties to explore next
    async fn fetch_and_fold(
        &self,
        ctx: &mut CrawlContext,
        frame: &Frame,
        direction: Direction,
    ) -> AppResult<(Vec<Address>, CrawlStats)> {
        let address = &frame.address;
        let mut stats = CrawlStats {
            addresses_fetched: 1,
            ..Default::default()
        };

        // The attempt is recorded regardless of what the ledger returns
        ctx.graph.add_node(address);

        let records = match self
            .ledger
            .fetch_all_transfers(address, direction, self.limits.max_transactions_per_address)
            .await
        {
            Ok(records) => records,
            Err(e) if e.is_transient() => {
                warn!("⚠️ Transfer fetch failed for {}: {}", address.short(), e);
                stats.failed_fetches = 1;
                return Ok((Vec::new(), stats));
            }
            Err(e) => return Err(e),
        };

        let mut seen = HashSet::new();
        let mut children = Vec::new();
        let mut consider = |candidate: &Address| {
            if candidate != address
                && !chain_contains(&frame.ancestors, candidate)
                && seen.insert(candidate.clone())
            {
                children.push(candidate.clone());
            }
        };

        for record in &records {
            let transfer = match record.parse() {
                Ok(t) => t,
                Err(e) => {
                    debug!("Skipping record for {}: {}", address.short(), e);
                    stats.records_skipped += 1;
                    continue;
                }
            };

            if ctx.graph.add_transfer(&transfer) {
                stats.transfers_added += 1;
            }
            if direction.follows_receivers() {
                consider(&transfer.to);
            }
            if direction.follows_senders() {
                consider(&transfer.from);
            }
        }

        children.truncate(self.limits.max_connections_per_address);
        Ok((children, stats))
    }
}
