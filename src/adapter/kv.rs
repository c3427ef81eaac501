// In-memory key-value cache adapter
//
// Exact key lookup or `*`-glob pattern scan over the keyspace. Values are
// opaque strings.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::common::{OperationKind, StoreKind};
use crate::error::StoreError;
use crate::planner::operation::{KvParams, OperationParams};

use super::{glob_match, AdapterPayload, AdapterResponse, CacheValueRecord, HealthStatus, StoreAdapter};

/// In-memory key-value store.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[async_trait]
impl StoreAdapter for MemoryKvStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Kv
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::healthy(self.entries.read().len())
    }

    async fn execute(
        &self,
        op: OperationKind,
        params: &OperationParams,
    ) -> Result<AdapterResponse, StoreError> {
        if op != OperationKind::CacheLookup {
            return Err(StoreError::Syntax(format!(
                "kv store does not implement {}",
                op
            )));
        }

        let entries = self.entries.read();
        let mut values: Vec<CacheValueRecord> = match params {
            OperationParams::Kv(KvParams::Key(key)) => entries
                .get(key)
                .map(|value| CacheValueRecord {
                    key: key.clone(),
                    value: value.clone(),
                })
                .into_iter()
                .collect(),
            OperationParams::Kv(KvParams::Pattern(pattern)) => {
                let wrapped = format!("*{}*", pattern.trim_matches('*'));
                entries
                    .iter()
                    .filter(|(key, _)| glob_match(&wrapped, key))
                    .map(|(key, value)| CacheValueRecord {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect()
            }
            _ => {
                return Err(StoreError::Syntax(
                    "cache lookup requires kv parameters".into(),
                ))
            }
        };

        values.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(AdapterResponse::new(AdapterPayload::CacheValues(values)))
    }
}
