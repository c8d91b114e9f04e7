//! Behavior Classifier
//!
//! Turns an address's raw transfer history into a fixed feature vector and
//! labels the address hot (exchange-like, busy), cold (dormant, storage) or
//! common (everything else) with a confidence in [0, 1].
//!
//! Classifications are computed lazily and cached for the lifetime of one
//! analysis run, so each address's history is fetched at most once.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{Address, AppResult, Direction, Transfer, WalletCategory};
use crate::providers::LedgerClient;
use crate::utils::constants::{
    COMMON_BASE_SCORE, COMMON_COLD_FLOOR, COMMON_HOT_FLOOR, MS_PER_DAY, MS_PER_MINUTE, WEEK_MINUTES,
};

/// Behavioral feature vector
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Features {
    pub out_count: usize,
    pub in_count: usize,
    /// Unique receivers of outgoing transfers
    pub out_addr_count: usize,
    /// Unique senders of incoming transfers
    pub in_addr_count: usize,
    pub out_avg_amount: f64,
    pub in_avg_amount: f64,
    /// Smallest gap between consecutive timestamped transfers
    pub min_gap_time_minutes: f64,
    pub total_volume: f64,
    /// Transfers per day over the observed span (span floored at one day)
    pub transaction_frequency: f64,
    pub net_flow: f64,
    pub total_transactions: usize,
}

/// Per-category scores behind a classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryScores {
    pub hot: u32,
    pub cold: u32,
    pub common: u32,
}

impl CategoryScores {
    /// Highest score; ties go hot > cold > common
    pub fn winner(&self) -> WalletCategory {
        if self.hot >= self.cold && self.hot >= self.common {
            WalletCategory::Hot
        } else if self.cold >= self.common {
            WalletCategory::Cold
        } else {
            WalletCategory::Common
        }
    }

    pub fn total(&self) -> u32 {
        self.hot + self.cold + self.common
    }

    pub fn max(&self) -> u32 {
        self.hot.max(self.cold).max(self.common)
    }
}

/// Cached behavioral verdict for one address
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub category: WalletCategory,
    pub confidence: f64,
    pub importance_score: f64,
    pub features: Features,
}

/// Feature extraction, scoring and the per-run classification cache
pub struct BehaviorClassifier {
    ledger: Arc<dyn LedgerClient>,
    history_limit: usize,
    cache: HashMap<Address, Classification>,
}

impl BehaviorClassifier {
    pub fn new(ledger: Arc<dyn LedgerClient>, history_limit: usize) -> Self {
        Self {
            ledger,
            history_limit,
            cache: HashMap::new(),
        }
    }

    /// Feature vector for `address` over `transfers` (either direction)
    pub fn extract_features(address: &Address, transfers: &[Transfer]) -> Features {
        if transfers.is_empty() {
            return Features::default();
        }

        let outgoing: Vec<&Transfer> = transfers.iter().filter(|t| &t.from == address).collect();
        let incoming: Vec<&Transfer> = transfers.iter().filter(|t| &t.to == address).collect();

        let out_addr_count = outgoing.iter().map(|t| &t.to).collect::<HashSet<_>>().len();
        let in_addr_count = incoming.iter().map(|t| &t.from).collect::<HashSet<_>>().len();
        let out_avg_amount = average(&outgoing);
        let in_avg_amount = average(&incoming);

        let mut timestamps: Vec<i64> = transfers
            .iter()
            .map(|t| t.timestamp_ms)
            .filter(|ts| *ts > 0)
            .collect();
        timestamps.sort_unstable();

        let min_gap_time_minutes = timestamps
            .windows(2)
            .map(|w| w[1] - w[0])
            .min()
            .map_or(0.0, |gap| gap as f64 / MS_PER_MINUTE);

        let transaction_frequency = match (timestamps.first(), timestamps.last()) {
            (Some(first), Some(last)) if timestamps.len() > 1 => {
                let span_days = (last - first) as f64 / MS_PER_DAY;
                transfers.len() as f64 / span_days.max(1.0)
            }
            _ => 0.0,
        };

        Features {
            out_count: outgoing.len(),
            in_count: incoming.len(),
            out_addr_count,
            in_addr_count,
            out_avg_amount,
            in_avg_amount,
            min_gap_time_minutes,
            total_volume: transfers.iter().map(|t| t.amount).sum(),
            transaction_frequency,
            net_flow: in_avg_amount * incoming.len() as f64
                - out_avg_amount * outgoing.len() as f64,
            total_transactions: transfers.len(),
        }
    }

    /// Tiered hot / cold / common scores
    pub fn score(features: &Features) -> CategoryScores {
        let total = features.total_transactions;
        let frequency = features.transaction_frequency;
        let mut scores = CategoryScores::default();

        scores.hot += match total {
            t if t > 1000 => 3,
            t if t > 100 => 2,
            t if t > 10 => 1,
            _ => 0,
        };
        if features.out_addr_count > 50 || features.in_addr_count > 50 {
            scores.hot += 3;
        } else if features.out_addr_count > 10 || features.in_addr_count > 10 {
            scores.hot += 2;
        }
        if frequency > 10.0 {
            scores.hot += 2;
        } else if frequency > 1.0 {
            scores.hot += 1;
        }
        if features.total_volume > 1_000_000.0 {
            scores.hot += 2;
        }

        if total < 10 && frequency < 0.1 {
            scores.cold += 3;
        } else if total < 50 {
            scores.cold += 1;
        }
        if features.min_gap_time_minutes > WEEK_MINUTES {
            scores.cold += 2;
        }

        if scores.hot < COMMON_HOT_FLOOR && scores.cold < COMMON_COLD_FLOOR {
            scores.common = COMMON_BASE_SCORE;
        }
        scores
    }

    /// Category and confidence (winning score / score sum, 0 if all zero)
    pub fn classify(features: &Features) -> (WalletCategory, f64) {
        let scores = Self::score(features);
        let total = scores.total();
        let confidence = if total == 0 {
            0.0
        } else {
            scores.max() as f64 / total as f64
        };
        (scores.winner(), confidence)
    }

    /// Cached classification, fetching history on first request.
    ///
    /// A transient ledger failure classifies the address from an empty
    /// history.
    pub async fn classify_address(
        &mut self,
        address: &Address,
        importance: f64,
    ) -> AppResult<&Classification> {
        if !self.cache.contains_key(address) {
            let transfers = self.history(address).await?;
            let features = Self::extract_features(address, &transfers);
            let (category, confidence) = Self::classify(&features);
            debug!(
                "🏷️ {} classified {} ({:.2})",
                address.short(),
                category.as_str(),
                confidence
            );
            self.cache.insert(
                address.clone(),
                Classification {
                    category,
                    confidence,
                    importance_score: importance,
                    features,
                },
            );
        }
        Ok(&self.cache[address])
    }

    async fn history(&self, address: &Address) -> AppResult<Vec<Transfer>> {
        let records = match self
            .ledger
            .fetch_all_transfers(address, Direction::Both, self.history_limit)
            .await
        {
            Ok(records) => records,
            Err(e) if e.is_transient() => {
                warn!("⚠️ History unavailable for {}: {}", address.short(), e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        Ok(records.iter().filter_map(|r| r.parse().ok()).collect())
    }

    pub fn get(&self, address: &Address) -> Option<&Classification> {
        self.cache.get(address)
    }

    pub fn category_of(&self, address: &Address) -> Option<WalletCategory> {
        self.cache.get(address).map(|c| c.category)
    }

    /// Every cached category
    pub fn categories(&self) -> HashMap<Address, WalletCategory> {
        self.cache
            .iter()
            .map(|(a, c)| (a.clone(), c.category))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

fn average(transfers: &[&Transfer]) -> f64 {
    if transfers.is_empty() {
        0.0
    } else {
        transfers.iter().map(|t| t.amount).sum::<f64>() / transfers.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::InMemoryLedger;

    const DAY_MS: i64 = 86_400_000;

    fn addr(tag: &str) -> Address {
        Address::parse(&format!("T{:A<33}", tag)).unwrap()
    }

    fn transfer(from: &Address, to: &Address, amount: f64, ts: i64, hash: &str) -> Transfer {
        Transfer {
            from: from.clone(),
            to: to.clone(),
            amount,
            timestamp_ms: ts,
            tx_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_extract_features() {
        let (me, a, b) = (addr("M"), addr("A"), addr("B"));
        let transfers = vec![
            transfer(&me, &a, 100.0, DAY_MS, "1"),
            transfer(&me, &a, 300.0, DAY_MS + 30 * 60_000, "2"),
            transfer(&b, &me, 50.0, 3 * DAY_MS, "3"),
        ];
        let f = BehaviorClassifier::extract_features(&me, &transfers);

        assert_eq!(f.out_count, 2);
        assert_eq!(f.in_count, 1);
        assert_eq!(f.out_addr_count, 1);
        assert_eq!(f.in_addr_count, 1);
        assert_eq!(f.out_avg_amount, 200.0);
        assert_eq!(f.in_avg_amount, 50.0);
        assert_eq!(f.min_gap_time_minutes, 30.0);
        assert_eq!(f.total_volume, 450.0);
        assert_eq!(f.net_flow, 50.0 - 400.0);
        assert_eq!(f.total_transactions, 3);
        // Span is two days
        assert!((f.transaction_frequency - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_frequency_floors_span_and_ignores_missing_timestamps() {
        let (me, a) = (addr("M"), addr("A"));
        let short_span = vec![
            transfer(&me, &a, 1.0, 1_000, "1"),
            transfer(&me, &a, 1.0, 2_000, "2"),
            transfer(&me, &a, 1.0, 0, "3"),
        ];
        let f = BehaviorClassifier::extract_features(&me, &short_span);
        assert_eq!(f.transaction_frequency, 3.0);

        let single = vec![transfer(&me, &a, 1.0, 1_000, "1")];
        let f = BehaviorClassifier::extract_features(&me, &single);
        assert_eq!(f.transaction_frequency, 0.0);
        assert_eq!(f.min_gap_time_minutes, 0.0);
    }

    #[test]
    fn test_hot_wallet_classification() {
        let features = Features {
            total_transactions: 1_500,
            out_addr_count: 80,
            transaction_frequency: 15.0,
            total_volume: 2_000_000.0,
            ..Default::default()
        };
        let (category, confidence) = BehaviorClassifier::classify(&features);
        assert_eq!(category, WalletCategory::Hot);
        assert!(confidence > 0.5);
    }

    #[test]
    fn test_cold_and_common_classification() {
        let dormant = Features {
            total_transactions: 3,
            transaction_frequency: 0.05,
            min_gap_time_minutes: 20_000.0,
            ..Default::default()
        };
        let scores = BehaviorClassifier::score(&dormant);
        assert_eq!(scores, CategoryScores { hot: 0, cold: 5, common: 0 });
        assert_eq!(BehaviorClassifier::classify(&dormant), (WalletCategory::Cold, 1.0));

        let ordinary = Features {
            total_transactions: 60,
            transaction_frequency: 0.5,
            out_addr_count: 5,
            ..Default::default()
        };
        let (category, confidence) = BehaviorClassifier::classify(&ordinary);
        assert_eq!(category, WalletCategory::Common);
        assert!((confidence - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_tie_breaks_toward_hot() {
        let scores = CategoryScores { hot: 3, cold: 3, common: 0 };
        assert_eq!(scores.winner(), WalletCategory::Hot);
        let scores = CategoryScores { hot: 0, cold: 5, common: 5 };
        assert_eq!(scores.winner(), WalletCategory::Cold);
        assert_eq!(CategoryScores::default().winner(), WalletCategory::Hot);
    }

    #[tokio::test]
    async fn test_classification_cached_per_address() {
        let a = "TAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let b = "TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
        let ledger = Arc::new(InMemoryLedger::new().with_transfer(a, b, 10.0, 1_000, "x"));
        let mut classifier = BehaviorClassifier::new(ledger.clone(), 200);
        let address = Address::parse(a).unwrap();

        let first = classifier.classify_address(&address, 0.2).await.unwrap().clone();
        let second = classifier.classify_address(&address, 0.9).await.unwrap().clone();

        assert_eq!(first.importance_score, 0.2);
        assert_eq!(second.importance_score, 0.2);
        assert_eq!(ledger.fetch_count(a, Direction::Both), 1);
        assert_eq!(classifier.category_of(&address), Some(first.category));
    }

    #[tokio::test]
    async fn test_failed_history_degrades_to_empty() {
        let a = "TAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let ledger = Arc::new(InMemoryLedger::new().with_failure(a));
        let mut classifier = BehaviorClassifier::new(ledger, 200);

        let c = classifier
            .classify_address(&Address::parse(a).unwrap(), 0.0)
            .await
            .unwrap();
        assert_eq!(c.features, Features::default());
    }
}
