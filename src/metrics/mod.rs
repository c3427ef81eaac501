// Engine metrics sink
//
// Process-wide counters over query executions: totals, cache hits,
// failures, a rolling average of execution time, SLA violations and
// per-store usage. Owned by the engine; safe for concurrent recording.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::common::StoreKind;
use crate::execution::CoordinationSnapshot;

/// Point-in-time view of the engine counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    pub cache_hits: u64,
    pub sla_violations: u64,
    pub average_execution_ms: f64,
    pub store_usage: BTreeMap<StoreKind, u64>,
    pub coordination: CoordinationSnapshot,
}

/// Concurrent metrics recorder.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    total_queries: AtomicU64,
    successful_queries: AtomicU64,
    failed_queries: AtomicU64,
    cache_hits: AtomicU64,
    sla_violations: AtomicU64,
    average_execution_ms: Mutex<f64>,
    store_usage: DashMap<StoreKind, u64>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(
        &self,
        duration_ms: f64,
        success: bool,
        sla_ms: u64,
        stores: &[StoreKind],
    ) {
        let total = self.total_queries.fetch_add(1, Ordering::Relaxed) + 1;
        if success {
            self.successful_queries.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_queries.fetch_add(1, Ordering::Relaxed);
        }
        if duration_ms > sla_ms as f64 {
            self.sla_violations.fetch_add(1, Ordering::Relaxed);
        }
        for store in stores {
            *self.store_usage.entry(*store).or_insert(0) += 1;
        }

        let mut average = self.average_execution_ms.lock();
        *average = (*average * (total - 1) as f64 + duration_ms) / total as f64;
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, coordination: CoordinationSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            successful_queries: self.successful_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            sla_violations: self.sla_violations.load(Ordering::Relaxed),
            average_execution_ms: *self.average_execution_ms.lock(),
            store_usage: self
                .store_usage
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
            coordination,
        }
    }
}
