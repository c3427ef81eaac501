// # Store Adapter Interface
//
// The narrow capability surface a backing store must implement to
// participate in federation:
//
// - `kind()` identifies the store
// - `health()` reports liveness and a size hint for cost estimation
// - `execute()` runs one operation and returns a typed payload
//
// Adapter returns are a small sum type (`AdapterPayload`) rather than
// duck-typed maps; the runner pattern-matches the variants into uniform
// `ResultItem`s. Adapters must be safe under concurrent read access; the
// engine performs no writes through this interface.

pub mod filesystem;
pub mod graph;
pub mod kv;
pub mod relational;
pub mod vector;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::common::{OperationKind, StoreKind};
use crate::error::StoreError;
use crate::planner::operation::OperationParams;

pub use filesystem::FilesystemStore;
pub use graph::MemoryGraphStore;
pub use kv::MemoryKvStore;
pub use relational::MemoryRelationalStore;
pub use vector::MemoryVectorStore;

/// Liveness report used by the planner's availability filter and the cost
/// model's data-size factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub size_hint: usize,
}

impl HealthStatus {
    pub fn healthy(size_hint: usize) -> Self {
        Self {
            healthy: true,
            size_hint,
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            size_hint: 0,
        }
    }
}

/// A document-shaped record (relational rows and vector hits).
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub content: String,
    pub similarity_score: Option<f64>,
    pub score: Option<f64>,
    pub metadata: Map<String, Value>,
}

/// A file-shaped record from filesystem search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileRecord {
    pub name: Option<String>,
    pub path: String,
    pub content: Option<String>,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// A node-shaped record from graph queries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeRecord {
    pub id: String,
    pub label: Option<String>,
    pub name: Option<String>,
    pub properties: Map<String, Value>,
}

/// A key-value pair from cache lookups.
#[derive(Debug, Clone, Serialize)]
pub struct CacheValueRecord {
    pub key: String,
    pub value: String,
}

/// Typed payload returned by an adapter. The runner matches on the variant
/// to normalize into `ResultItem`s.
#[derive(Debug, Clone, Serialize)]
pub enum AdapterPayload {
    Documents(Vec<DocumentRecord>),
    Files(Vec<FileRecord>),
    Nodes(Vec<NodeRecord>),
    CacheValues(Vec<CacheValueRecord>),
    Generic(Vec<Value>),
}

impl AdapterPayload {
    pub fn len(&self) -> usize {
        match self {
            AdapterPayload::Documents(v) => v.len(),
            AdapterPayload::Files(v) => v.len(),
            AdapterPayload::Nodes(v) => v.len(),
            AdapterPayload::CacheValues(v) => v.len(),
            AdapterPayload::Generic(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Full adapter response: the typed payload plus the raw value for
/// diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterResponse {
    pub payload: AdapterPayload,
    pub raw: Value,
}

impl AdapterResponse {
    pub fn new(payload: AdapterPayload) -> Self {
        let raw = serde_json::to_value(&payload).unwrap_or(Value::Null);
        Self { payload, raw }
    }
}

/// The capability interface a backing store implements.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Which store this adapter fronts.
    fn kind(&self) -> StoreKind;

    /// Liveness and size reporting.
    async fn health(&self) -> HealthStatus;

    /// Execute one operation. Failures are store-specific errors which the
    /// runner wraps; adapters never panic across this boundary.
    async fn execute(
        &self,
        op: OperationKind,
        params: &OperationParams,
    ) -> Result<AdapterResponse, StoreError>;
}

/// Registry of adapters keyed by store kind. Owned by the engine; shared
/// read-only with the coordinator and recovery layers.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<StoreKind, Arc<dyn StoreAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous adapter for the same
    /// store.
    pub fn register(&mut self, adapter: Arc<dyn StoreAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, store: StoreKind) -> Option<Arc<dyn StoreAdapter>> {
        self.adapters.get(&store).cloned()
    }

    pub fn contains(&self, store: StoreKind) -> bool {
        self.adapters.contains_key(&store)
    }

    /// Registered stores in the canonical `StoreKind::ALL` order.
    pub fn kinds(&self) -> Vec<StoreKind> {
        StoreKind::ALL
            .into_iter()
            .filter(|k| self.adapters.contains_key(k))
            .collect()
    }

    /// Health of each registered store, polled once per plan.
    pub async fn health_snapshot(&self) -> HashMap<StoreKind, HealthStatus> {
        let mut snapshot = HashMap::new();
        for (kind, adapter) in &self.adapters {
            snapshot.insert(*kind, adapter.health().await);
        }
        snapshot
    }
}

/// Glob matching for `*` (any run) and `?` (any single character), used by
/// the kv and filesystem adapters.
pub(crate) fn glob_match(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();

    fn matches(p: &[char], c: &[char]) -> bool {
        match (p.first(), c.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                matches(&p[1..], c) || (!c.is_empty() && matches(p, &c[1..]))
            }
            (Some('?'), Some(_)) => matches(&p[1..], &c[1..]),
            (Some(pc), Some(cc)) => {
                pc.eq_ignore_ascii_case(cc) && matches(&p[1..], &c[1..])
            }
            _ => false,
        }
    }

    matches(&pattern, &candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_wildcards() {
        assert!(glob_match("*.md", "README.md"));
        assert!(glob_match("deploy*", "deployment-notes"));
        assert!(glob_match("?at", "cat"));
        assert!(!glob_match("*.md", "notes.txt"));
        assert!(!glob_match("?at", "coat"));
        assert!(glob_match("*", "anything at all"));
    }

    #[test]
    fn registry_keeps_canonical_store_order() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(MemoryKvStore::new()));
        registry.register(Arc::new(MemoryRelationalStore::new()));
        assert_eq!(
            registry.kinds(),
            vec![StoreKind::Relational, StoreKind::Kv]
        );
        assert!(registry.contains(StoreKind::Kv));
        assert!(!registry.contains(StoreKind::Graph));
    }
}
