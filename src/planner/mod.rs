// # Query Planner
//
// Produces an `ExecutionPlan` from a `SemanticQuery`:
//
// 1. Filter target stores to registered, healthy adapters (falling back to
//    the relational store when nothing targeted survives).
// 2. Build one `DatabaseOperation` per selected store with typed
//    parameters, a cost estimate, an execution mode and a timeout.
// 3. Order by the per-query-kind priority table, cheapest first within the
//    same priority.
// 4. Partition into a parallel group and a sequential tail.
// 5. Enforce the SLA budget by dropping lowest-priority tail operations,
//    recording a note for each adjustment.

pub mod cost_model;
pub mod operation;

use regex::escape;

use crate::adapter::AdapterRegistry;
use crate::common::{
    ExecutionMode, OperationKind, QueryKind, QueryStrategy, SemanticQuery, StoreKind,
};

pub use cost_model::CostModel;
pub use operation::{
    supports, DatabaseOperation, ExecutionPlan, FilesystemParams, GraphParams, KvParams,
    OperationParams, RelationalParams, VectorParams,
};

/// Fixed planner-side coordination overhead charged per operation.
const COORDINATION_OVERHEAD_MS: f64 = 10.0;

/// Default retry budget granted to every planned operation.
const DEFAULT_RETRIES: u32 = 2;

/// Cost-aware planner over the registered stores.
#[derive(Debug, Clone)]
pub struct Planner {
    cost_model: CostModel,
    sla_ms: u64,
}

impl Planner {
    pub fn new(sla_ms: u64) -> Self {
        Self {
            cost_model: CostModel::new(),
            sla_ms,
        }
    }

    /// Plan the execution of `query` across the available stores.
    pub async fn plan(
        &self,
        query: &SemanticQuery,
        registry: &AdapterRegistry,
        strategy: QueryStrategy,
        database: Option<StoreKind>,
        limit: usize,
    ) -> ExecutionPlan {
        let mut notes = Vec::new();

        let targets: Vec<StoreKind> = if let Some(store) = database {
            vec![store]
        } else if strategy == QueryStrategy::Selective {
            vec![query.primary_store()]
        } else {
            query.target_stores.clone()
        };

        let health = registry.health_snapshot().await;
        let mut available = Vec::new();
        for store in targets {
            match health.get(&store) {
                Some(status) if status.healthy => available.push(store),
                Some(_) => notes.push(format!("skipped {}: store unhealthy", store)),
                None => notes.push(format!("skipped {}: no adapter registered", store)),
            }
        }

        if available.is_empty() {
            if health.get(&StoreKind::Relational).map(|h| h.healthy) == Some(true) {
                notes.push("no targeted store available; falling back to relational".into());
                available.push(StoreKind::Relational);
            } else {
                let mut plan =
                    ExecutionPlan::empty(query.kind, "no healthy stores available for query");
                plan.notes.append(&mut notes);
                return plan;
            }
        }

        let op_count = available.len();
        let mut operations: Vec<DatabaseOperation> = available
            .into_iter()
            .map(|store| {
                let size_hint = health.get(&store).map(|h| h.size_hint).unwrap_or(0);
                self.build_operation(query, store, size_hint, limit, strategy, op_count)
            })
            .collect();

        // Validation is structural for the most part; anything that still
        // slipped through is dropped rather than executed malformed.
        operations.retain(|op| {
            let valid = supports(op.store, op.op_kind) && !op.params.is_empty() && op.timeout_ms > 0;
            if !valid {
                notes.push(format!("dropped invalid {} operation", op.store));
            }
            valid
        });

        let priorities = priority_table(query.kind);
        for op in &mut operations {
            op.priority = priorities
                .iter()
                .position(|s| *s == op.store)
                .unwrap_or(priorities.len());
        }
        operations.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.estimated_cost_ms.total_cmp(&b.estimated_cost_ms))
        });

        let (mut parallel_ops, mut sequential_ops) = partition(operations);

        // Budget enforcement: shed the lowest-priority tail work first.
        let mut estimated_total = estimate_total(&parallel_ops, &sequential_ops);
        while estimated_total > self.sla_ms as f64 && !sequential_ops.is_empty() {
            if let Some(dropped) = sequential_ops.pop() {
                notes.push(format!(
                    "dropped {} {} (est {:.0}ms) to honor {}ms budget",
                    dropped.store, dropped.op_kind, dropped.estimated_cost_ms, self.sla_ms
                ));
            }
            estimated_total = estimate_total(&parallel_ops, &sequential_ops);
        }
        if estimated_total > self.sla_ms as f64 {
            for op in &mut parallel_ops {
                if op.timeout_ms > self.sla_ms {
                    op.timeout_ms = self.sla_ms;
                }
            }
            notes.push(format!(
                "plan estimate {:.0}ms exceeds {}ms budget; timeouts clamped",
                estimated_total, self.sla_ms
            ));
        }

        ExecutionPlan {
            query_kind: query.kind,
            parallel_ops,
            sequential_ops,
            estimated_total_ms: estimated_total,
            notes,
        }
    }

    /// Build one operation for a store. Also used by the recovery layer to
    /// re-aim a failed operation's intent at an alternative store.
    pub fn build_operation(
        &self,
        query: &SemanticQuery,
        store: StoreKind,
        size_hint: usize,
        limit: usize,
        strategy: QueryStrategy,
        op_count: usize,
    ) -> DatabaseOperation {
        let op_kind = operation_kind_for(store);
        let params = self.build_params(query, store, limit);
        let estimated_cost_ms =
            self.cost_model
                .estimate(store, op_kind, &query.search_terms, &params, size_hint);

        let mode = match strategy {
            QueryStrategy::Parallel => ExecutionMode::Parallel,
            QueryStrategy::Sequential => ExecutionMode::Sequential,
            _ => default_mode(store, query.kind),
        };

        let budget_share = (self.sla_ms / op_count.max(1) as u64).max(1);
        let timeout_ms = CostModel::store_sla_ms(store).min(budget_share).max(1);

        DatabaseOperation {
            store,
            op_kind,
            params,
            estimated_cost_ms,
            mode,
            priority: 0,
            timeout_ms,
            retries: DEFAULT_RETRIES,
        }
    }

    fn build_params(&self, query: &SemanticQuery, store: StoreKind, limit: usize) -> OperationParams {
        match store {
            StoreKind::Relational => OperationParams::Relational(RelationalParams {
                query: query.search_text(),
                search_terms: query.search_terms.clone(),
                limit,
                temporal: query.temporal,
                resource_type: Some(query.kind.as_str().to_string()),
            }),
            StoreKind::Vector => OperationParams::Vector(VectorParams {
                query: query.search_text(),
                // Fetch extra candidates so dedup and thresholding still
                // leave enough for the final limit.
                k: limit.saturating_mul(2).max(1),
            }),
            StoreKind::Graph => {
                let alternation = query
                    .search_terms
                    .iter()
                    .map(|t| escape(t))
                    .collect::<Vec<_>>()
                    .join("|");
                OperationParams::Graph(GraphParams::Pattern(format!(
                    "(?i).*({}).*",
                    alternation
                )))
            }
            StoreKind::Kv => {
                if query.search_terms.len() == 1 {
                    OperationParams::Kv(KvParams::Key(query.search_terms[0].clone()))
                } else {
                    OperationParams::Kv(KvParams::Pattern(query.search_terms.join("*")))
                }
            }
            StoreKind::Filesystem => {
                let pattern = query
                    .search_terms
                    .iter()
                    .find(|t| t.contains('*') || t.contains('?'))
                    .cloned()
                    .unwrap_or_else(|| "*".to_string());
                OperationParams::Filesystem(FilesystemParams {
                    path: ".".to_string(),
                    pattern,
                    limit,
                })
            }
        }
    }
}

/// The operation each store runs for a federated query.
pub fn operation_kind_for(store: StoreKind) -> OperationKind {
    match store {
        StoreKind::Relational => OperationKind::Retrieve,
        StoreKind::Vector => OperationKind::VectorSearch,
        StoreKind::Graph => OperationKind::GraphQuery,
        StoreKind::Kv => OperationKind::CacheLookup,
        StoreKind::Filesystem => OperationKind::FileSearch,
    }
}

/// Per-query-kind store priority. Lower index runs first.
pub fn priority_table(kind: QueryKind) -> &'static [StoreKind] {
    match kind {
        QueryKind::Memory => &[
            StoreKind::Vector,
            StoreKind::Relational,
            StoreKind::Filesystem,
            StoreKind::Graph,
            StoreKind::Kv,
        ],
        QueryKind::Chat => &[StoreKind::Relational, StoreKind::Kv],
        QueryKind::Document => &[
            StoreKind::Filesystem,
            StoreKind::Vector,
            StoreKind::Relational,
            StoreKind::Graph,
            StoreKind::Kv,
        ],
    }
}

/// Default execution mode: fast stores fan out, slow stores serialize.
/// The vector store joins the parallel group only for memory queries.
fn default_mode(store: StoreKind, kind: QueryKind) -> ExecutionMode {
    match store {
        StoreKind::Relational | StoreKind::Kv => ExecutionMode::Parallel,
        StoreKind::Graph | StoreKind::Filesystem => ExecutionMode::Sequential,
        StoreKind::Vector => {
            if kind == QueryKind::Memory {
                ExecutionMode::Parallel
            } else {
                ExecutionMode::Sequential
            }
        }
    }
}

fn partition(
    operations: Vec<DatabaseOperation>,
) -> (Vec<DatabaseOperation>, Vec<DatabaseOperation>) {
    let mut parallel: Vec<DatabaseOperation> = Vec::new();
    let mut sequential: Vec<DatabaseOperation> = Vec::new();

    for op in operations {
        let compatible = parallel.iter().all(|p| op.is_compatible_with(p));
        if op.mode == ExecutionMode::Parallel && compatible {
            parallel.push(op);
        } else {
            sequential.push(op);
        }
    }

    (parallel, sequential)
}

fn estimate_total(parallel: &[DatabaseOperation], sequential: &[DatabaseOperation]) -> f64 {
    let parallel_cost = parallel
        .iter()
        .map(|op| op.estimated_cost_ms)
        .fold(0.0, f64::max);
    let sequential_cost: f64 = sequential.iter().map(|op| op.estimated_cost_ms).sum();
    let overhead = COORDINATION_OVERHEAD_MS * (parallel.len() + sequential.len()) as f64;
    parallel_cost + sequential_cost + overhead
}
