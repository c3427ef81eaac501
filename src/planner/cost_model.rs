// Cost model for federated operation planning
//
// Assigns an estimated cost in milliseconds to a (store, operation, params)
// triple:
//
//   cost = base * complexity * data_size * operation_factor * adjustment
//
// Costs are advisory, never authoritative: the operation timeout, not the
// estimate, bounds real execution. Estimates approaching a store's SLA are
// saturated logarithmically so a pathological input cannot dominate plan
// ordering.

use crate::common::{OperationKind, StoreKind};
use crate::planner::operation::{GraphParams, KvParams, OperationParams};

/// Cost estimator over store performance characteristics.
#[derive(Debug, Default, Clone)]
pub struct CostModel;

impl CostModel {
    pub fn new() -> Self {
        Self
    }

    /// Base cost of one operation against a store, in milliseconds.
    pub fn base_cost(store: StoreKind) -> f64 {
        match store {
            StoreKind::Relational => 50.0,
            StoreKind::Vector => 200.0,
            StoreKind::Graph => 300.0,
            StoreKind::Kv => 20.0,
            StoreKind::Filesystem => 150.0,
        }
    }

    /// Per-store SLA ceiling, in milliseconds. Operation timeouts never
    /// exceed this.
    pub fn store_sla_ms(store: StoreKind) -> u64 {
        match store {
            StoreKind::Relational => 100,
            StoreKind::Vector => 300,
            StoreKind::Graph => 1_000,
            StoreKind::Kv => 200,
            StoreKind::Filesystem => 2_000,
        }
    }

    /// Estimate the cost of executing `op_kind` with `params` against
    /// `store`, given the store's reported size hint.
    pub fn estimate(
        &self,
        store: StoreKind,
        op_kind: OperationKind,
        search_terms: &[String],
        params: &OperationParams,
        size_hint: usize,
    ) -> f64 {
        let mut cost = Self::base_cost(store)
            * complexity_factor(search_terms.len())
            * data_size_factor(size_hint)
            * operation_factor(op_kind, store);

        cost = store_adjustment(cost, store, search_terms, params);

        // Saturate estimates that approach the store SLA.
        let warning_threshold = Self::store_sla_ms(store) as f64 * 0.8;
        if cost > warning_threshold {
            cost = warning_threshold * (1.0 + cost / warning_threshold).log10();
        }

        (cost * 10.0).round() / 10.0
    }
}

/// Term-count complexity multiplier.
fn complexity_factor(term_count: usize) -> f64 {
    match term_count {
        0..=2 => 1.0,
        3..=4 => 1.5,
        5..=7 => 2.0,
        _ => 3.0,
    }
}

/// Data-size multiplier from the store's row/document count.
fn data_size_factor(size_hint: usize) -> f64 {
    match size_hint {
        0..=100 => 1.0,
        101..=1_000 => 1.2,
        1_001..=10_000 => 1.5,
        _ => 2.0,
    }
}

/// Per-kind operation multiplier; specialized operations are only more
/// expensive on the store that actually implements them.
fn operation_factor(op_kind: OperationKind, store: StoreKind) -> f64 {
    match op_kind {
        OperationKind::Retrieve => 1.0,
        OperationKind::Search => 1.2,
        OperationKind::VectorSearch => {
            if store == StoreKind::Vector {
                1.5
            } else {
                1.0
            }
        }
        OperationKind::GraphQuery => {
            if store == StoreKind::Graph {
                2.0
            } else {
                1.0
            }
        }
        OperationKind::FileSearch => {
            if store == StoreKind::Filesystem {
                1.3
            } else {
                1.0
            }
        }
        OperationKind::CacheLookup => {
            if store == StoreKind::Kv {
                0.3
            } else {
                1.0
            }
        }
    }
}

/// Store-specific cost tweaks.
fn store_adjustment(
    cost: f64,
    store: StoreKind,
    search_terms: &[String],
    params: &OperationParams,
) -> f64 {
    match store {
        StoreKind::Relational => {
            if search_terms.len() <= 2 {
                cost * 0.8
            } else if search_terms.iter().any(|t| t.len() > 10) {
                cost * 1.3
            } else {
                cost
            }
        }
        StoreKind::Vector => {
            let k = match params {
                OperationParams::Vector(p) => p.k,
                _ => 10,
            };
            if k > 10 {
                cost * (1.0 + 0.05 * (k as f64 - 10.0))
            } else {
                cost
            }
        }
        StoreKind::Filesystem => {
            let mut cost = cost;
            if let OperationParams::Filesystem(p) = params {
                if p.path.matches('/').count() > 3 {
                    cost *= 1.4;
                }
                if p.pattern.contains('*') || p.pattern.contains('?') {
                    cost *= 1.2;
                }
            }
            cost
        }
        StoreKind::Kv => {
            // Pattern scans walk the keyspace.
            if matches!(params, OperationParams::Kv(KvParams::Pattern(_))) {
                cost * 2.0
            } else {
                cost
            }
        }
        StoreKind::Graph => {
            if let OperationParams::Graph(GraphParams::Traverse { max_depth, .. }) = params {
                cost * (1.0 + 0.2 * (*max_depth as f64))
            } else {
                cost
            }
        }
    }
}
