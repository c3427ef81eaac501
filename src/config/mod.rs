// Engine configuration
//
// Environment-driven settings for the SLA ceiling, result cache, ranking
// weights and per-store connection strings. Unset or unparseable variables
// fall back to defaults.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::common::StoreKind;

pub const DEFAULT_SLA_MS: u64 = 2_000;
pub const DEFAULT_CACHE_SIZE: usize = 100;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3_600;
pub const DEFAULT_MAX_PER_SOURCE: usize = 5;

/// Engine configuration. Built from the environment via `from_env`, or
/// programmatically starting from `Default`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Outer per-call deadline in milliseconds.
    pub sla_ms: u64,
    /// Maximum number of cached responses.
    pub cache_size: usize,
    /// Result cache time-to-live.
    pub cache_ttl: Duration,
    /// Per-store ranking weights.
    pub store_weights: HashMap<StoreKind, f64>,
    /// Diversity cap per source store; 0 disables the filter.
    pub max_per_source: usize,
    /// Connection strings handed to adapters, keyed by store.
    pub store_urls: HashMap<StoreKind, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sla_ms: DEFAULT_SLA_MS,
            cache_size: DEFAULT_CACHE_SIZE,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            store_weights: default_store_weights(),
            max_per_source: DEFAULT_MAX_PER_SOURCE,
            store_urls: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Read configuration from the environment.
    ///
    /// Recognized variables: `SLA_MS`, `CACHE_SIZE`, `CACHE_TTL_SEC`,
    /// `MAX_PER_SOURCE`, `STORE_WEIGHT_<KIND>` and `STORE_URL_<KIND>`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(sla) = parse_env::<u64>("SLA_MS") {
            config.sla_ms = sla.max(1);
        }
        if let Some(size) = parse_env::<usize>("CACHE_SIZE") {
            config.cache_size = size;
        }
        if let Some(ttl) = parse_env::<u64>("CACHE_TTL_SEC") {
            config.cache_ttl = Duration::from_secs(ttl);
        }
        if let Some(cap) = parse_env::<usize>("MAX_PER_SOURCE") {
            config.max_per_source = cap;
        }

        for store in StoreKind::ALL {
            let suffix = store.as_str().to_uppercase();
            if let Some(weight) = parse_env::<f64>(&format!("STORE_WEIGHT_{}", suffix)) {
                if weight >= 0.0 {
                    config.store_weights.insert(store, weight);
                }
            }
            if let Ok(url) = env::var(format!("STORE_URL_{}", suffix)) {
                if !url.trim().is_empty() {
                    config.store_urls.insert(store, url);
                }
            }
        }

        config
    }

    /// Ranking weight for a store; unknown stores weigh 0.5.
    pub fn store_weight(&self, store: StoreKind) -> f64 {
        self.store_weights.get(&store).copied().unwrap_or(0.5)
    }

    pub fn store_url(&self, store: StoreKind) -> Option<&str> {
        self.store_urls.get(&store).map(String::as_str)
    }
}

fn default_store_weights() -> HashMap<StoreKind, f64> {
    HashMap::from([
        (StoreKind::Vector, 1.2),
        (StoreKind::Relational, 1.0),
        (StoreKind::Graph, 0.9),
        (StoreKind::Filesystem, 0.8),
        (StoreKind::Kv, 0.7),
    ])
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|raw| raw.trim().parse().ok())
}
