//! In-Memory Lookup Cache
//!
//! Thread-safe TTL cache for pass-through address lookups served by the
//! API (risk status, account info). Analysis runs never read from it:
//! each run fetches fresh data.
//!
//! Backed by DashMap, so handlers share it without explicit locking.
//! Base58 addresses are case-sensitive and are used as keys unchanged.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::models::Address;
use crate::utils::constants::DEFAULT_CACHE_TTL_SECS;

/// Cached value plus insertion time
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    /// Seconds left before expiry
    pub fn remaining_ttl(&self) -> u64 {
        self.ttl
            .saturating_sub(self.created_at.elapsed())
            .as_secs()
    }
}

/// Address-keyed TTL cache with hit/miss counters
#[derive(Clone)]
pub struct AddressLookupCache<V> {
    store: Arc<DashMap<Address, CacheEntry<V>>>,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<V: Clone> Default for AddressLookupCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> AddressLookupCache<V> {
    /// Cache with the default TTL
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fresh value for `address`, dropping it if expired
    pub fn get(&self, address: &Address) -> Option<V> {
        let expired = match self.store.get(address) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "✅ CACHE HIT: {} (TTL: {}s remaining)",
                    address.short(),
                    entry.remaining_ttl()
                );
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.store.remove(address);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("📭 CACHE MISS: {}", address.short());
        None
    }

    pub fn set(&self, address: &Address, value: V) {
        self.store.insert(
            address.clone(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl: self.ttl,
            },
        );
        debug!("💾 CACHE SET: {} (TTL: {}s)", address.short(), self.ttl.as_secs());
    }

    pub fn invalidate(&self, address: &Address) {
        self.store.remove(address);
    }

    /// Drop every expired entry, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            info!("🧹 CACHE CLEANUP: {} expired entries removed", removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            ttl_secs: self.ttl.as_secs(),
        }
    }

    pub fn clear(&self) {
        self.store.clear();
    }
}

/// Cache counters for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: &str) -> Address {
        Address::parse(&format!("T{:A<33}", tag)).unwrap()
    }

    #[test]
    fn test_cache_set_get() {
        let cache = AddressLookupCache::new();
        cache.set(&addr("A"), 42u32);
        assert_eq!(cache.get(&addr("A")), Some(42));
    }

    #[test]
    fn test_cache_miss() {
        let cache: AddressLookupCache<u32> = AddressLookupCache::new();
        assert!(cache.get(&addr("NOPE")).is_none());
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let cache = AddressLookupCache::with_ttl(Duration::ZERO);
        cache.set(&addr("A"), "status".to_string());
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get(&addr("A")).is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_cleanup_expired() {
        let cache = AddressLookupCache::with_ttl(Duration::ZERO);
        cache.set(&addr("A"), 1u8);
        cache.set(&addr("B"), 2u8);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.cleanup_expired(), 2);
    }

    #[test]
    fn test_cache_stats() {
        let cache = AddressLookupCache::new();
        cache.set(&addr("A"), 1u8);
        cache.get(&addr("A"));
        cache.get(&addr("B"));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 50.0);
    }
}
