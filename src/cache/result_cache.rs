// LRU/TTL result cache
//
// Entries expire after the configured TTL and are pruned lazily on read.
// When the store exceeds its size cap, the 20 oldest entries by insertion
// time are evicted in one sweep.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::common::{ContentHash, QueryStrategy, StoreKind};
use crate::engine::Response;

/// Entries evicted per sweep once the cap is exceeded.
const EVICTION_BATCH: usize = 20;

/// Cache key: MD5 over the normalized query text and every option that
/// would change the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(ContentHash);

impl CacheKey {
    pub fn new(
        raw_query: &str,
        limit: usize,
        strategy: QueryStrategy,
        database: Option<StoreKind>,
        min_score: Option<f64>,
    ) -> Self {
        let normalized = raw_query
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let mut material = format!("{}|{}|{}", normalized, limit, strategy.as_str());
        if let Some(store) = database {
            material.push('|');
            material.push_str(store.as_str());
        }
        if let Some(threshold) = min_score {
            material.push('|');
            material.push_str(&threshold.to_string());
        }

        Self(ContentHash::of(&material))
    }
}

struct CacheEntry {
    response: Response,
    inserted_at: Instant,
}

/// Thread-safe response cache with TTL and a size cap.
pub struct ResultCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            ttl,
        }
    }

    /// Fetch a cached response. Expired entries are dropped on access.
    pub fn get(&self, key: &CacheKey) -> Option<Response> {
        {
            let entries = self.entries.read();
            let entry = entries.get(key)?;
            if entry.inserted_at.elapsed() <= self.ttl {
                return Some(entry.response.clone());
            }
        }
        self.entries.write().remove(key);
        None
    }

    /// Insert a response, evicting the oldest batch when over capacity.
    pub fn insert(&self, key: CacheKey, response: Response) {
        let mut entries = self.entries.write();
        entries.insert(
            key,
            CacheEntry {
                response,
                inserted_at: Instant::now(),
            },
        );

        if entries.len() > self.capacity {
            let mut by_age: Vec<(CacheKey, Instant)> = entries
                .iter()
                .map(|(k, e)| (*k, e.inserted_at))
                .collect();
            by_age.sort_by_key(|(_, inserted)| *inserted);
            for (old_key, _) in by_age.into_iter().take(EVICTION_BATCH) {
                entries.remove(&old_key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Response;

    fn key(raw: &str) -> CacheKey {
        CacheKey::new(raw, 10, QueryStrategy::Hybrid, None, None)
    }

    #[test]
    fn key_normalizes_whitespace_and_case() {
        assert_eq!(key("memory%Architecture"), key("  memory%architecture  "));
        assert_eq!(key("a   b"), key("a b"));
    }

    #[test]
    fn options_are_part_of_the_key() {
        let base = CacheKey::new("q", 10, QueryStrategy::Hybrid, None, None);
        assert_ne!(base, CacheKey::new("q", 5, QueryStrategy::Hybrid, None, None));
        assert_ne!(base, CacheKey::new("q", 10, QueryStrategy::Parallel, None, None));
        assert_ne!(
            base,
            CacheKey::new("q", 10, QueryStrategy::Hybrid, Some(StoreKind::Kv), None)
        );
        assert_ne!(
            base,
            CacheKey::new("q", 10, QueryStrategy::Hybrid, None, Some(0.5))
        );
    }

    #[test]
    fn hit_within_ttl_returns_a_copy() {
        let cache = ResultCache::new(10, Duration::from_secs(60));
        let k = key("memory%architecture");
        cache.insert(k, Response::default());

        let hit = cache.get(&k).expect("cache hit");
        assert!(!hit.metadata.from_cache, "copy keeps the stored flags");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entries_miss_and_are_pruned() {
        let cache = ResultCache::new(10, Duration::ZERO);
        let k = key("memory%architecture");
        cache.insert(k, Response::default());

        assert!(cache.get(&k).is_none());
        assert!(cache.is_empty(), "expired entry is removed on read");
    }

    #[test]
    fn overflow_evicts_the_oldest_batch() {
        let cache = ResultCache::new(30, Duration::from_secs(60));
        for i in 0..31 {
            cache.insert(key(&format!("query-{}", i)), Response::default());
            // Distinct insertion instants keep the eviction order exact.
            std::thread::sleep(Duration::from_millis(1));
        }
        // 31 entries exceeded the cap of 30; the 20 oldest are gone.
        assert_eq!(cache.len(), 11);
        assert!(cache.get(&key("query-0")).is_none());
        assert!(cache.get(&key("query-30")).is_some());
    }
}
