// Plan operation types
//
// `OperationParams` is a tagged union over operation kinds: one variant per
// store with a struct of required fields, validated at plan time, so the
// planner and runner cannot miscompose a parameter bag.

use serde::Serialize;

use crate::common::{
    ExecutionMode, OperationKind, QueryKind, StoreKind, TemporalFilter,
};

/// Relational retrieve/search parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationalParams {
    pub query: String,
    pub search_terms: Vec<String>,
    pub limit: usize,
    pub temporal: Option<TemporalFilter>,
    pub resource_type: Option<String>,
}

/// Dense-vector nearest-neighbor parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorParams {
    pub query: String,
    pub k: usize,
}

/// Graph query parameters: either an adapter-side pattern or a bounded
/// traversal from a start node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GraphParams {
    Pattern(String),
    Traverse {
        start_id: String,
        rel_types: Vec<String>,
        max_depth: usize,
    },
}

/// Maximum traversal depth a graph operation may request.
pub const MAX_GRAPH_DEPTH: usize = 5;

/// Key-value lookup parameters. The variant split makes "exactly one of
/// key or pattern" structural.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum KvParams {
    Key(String),
    Pattern(String),
}

/// Filesystem search parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilesystemParams {
    pub path: String,
    pub pattern: String,
    pub limit: usize,
}

/// Parameters for a single database operation, tagged by target store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OperationParams {
    Relational(RelationalParams),
    Vector(VectorParams),
    Graph(GraphParams),
    Kv(KvParams),
    Filesystem(FilesystemParams),
}

impl OperationParams {
    pub fn store(&self) -> StoreKind {
        match self {
            OperationParams::Relational(_) => StoreKind::Relational,
            OperationParams::Vector(_) => StoreKind::Vector,
            OperationParams::Graph(_) => StoreKind::Graph,
            OperationParams::Kv(_) => StoreKind::Kv,
            OperationParams::Filesystem(_) => StoreKind::Filesystem,
        }
    }

    /// A parameter set with nothing to act on fails plan validation.
    pub fn is_empty(&self) -> bool {
        match self {
            OperationParams::Relational(p) => p.query.is_empty() && p.search_terms.is_empty(),
            OperationParams::Vector(p) => p.query.is_empty() || p.k == 0,
            OperationParams::Graph(GraphParams::Pattern(pattern)) => pattern.is_empty(),
            OperationParams::Graph(GraphParams::Traverse { start_id, max_depth, .. }) => {
                start_id.is_empty() || *max_depth == 0 || *max_depth > MAX_GRAPH_DEPTH
            }
            OperationParams::Kv(KvParams::Key(key)) => key.is_empty(),
            OperationParams::Kv(KvParams::Pattern(pattern)) => pattern.is_empty(),
            OperationParams::Filesystem(p) => p.pattern.is_empty(),
        }
    }
}

/// Whether a store implements an operation kind.
pub fn supports(store: StoreKind, op: OperationKind) -> bool {
    matches!(
        (store, op),
        (StoreKind::Relational, OperationKind::Retrieve)
            | (StoreKind::Relational, OperationKind::Search)
            | (StoreKind::Vector, OperationKind::VectorSearch)
            | (StoreKind::Graph, OperationKind::GraphQuery)
            | (StoreKind::Kv, OperationKind::CacheLookup)
            | (StoreKind::Filesystem, OperationKind::FileSearch)
    )
}

/// All supported operation kinds are read-only; writes never flow through
/// the query pipeline.
pub fn is_read_only(op: OperationKind) -> bool {
    matches!(
        op,
        OperationKind::Retrieve
            | OperationKind::Search
            | OperationKind::VectorSearch
            | OperationKind::GraphQuery
            | OperationKind::FileSearch
            | OperationKind::CacheLookup
    )
}

/// A single planned database operation. Immutable during execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseOperation {
    pub store: StoreKind,
    pub op_kind: OperationKind,
    pub params: OperationParams,
    pub estimated_cost_ms: f64,
    pub mode: ExecutionMode,
    /// Lower value = higher priority; derived from the per-kind tables.
    pub priority: usize,
    pub timeout_ms: u64,
    pub retries: u32,
}

impl DatabaseOperation {
    /// Two operations can share the parallel group when they target
    /// different stores, or the same store with read-only operations.
    pub fn is_compatible_with(&self, other: &DatabaseOperation) -> bool {
        if self.store != other.store {
            return true;
        }
        is_read_only(self.op_kind) && is_read_only(other.op_kind)
    }
}

/// A complete execution plan: a parallel group and a sequential tail.
/// Every operation appears in exactly one of the two.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub query_kind: QueryKind,
    pub parallel_ops: Vec<DatabaseOperation>,
    pub sequential_ops: Vec<DatabaseOperation>,
    pub estimated_total_ms: f64,
    pub notes: Vec<String>,
}

impl ExecutionPlan {
    pub fn empty(query_kind: QueryKind, note: impl Into<String>) -> Self {
        Self {
            query_kind,
            parallel_ops: Vec::new(),
            sequential_ops: Vec::new(),
            estimated_total_ms: 0.0,
            notes: vec![note.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parallel_ops.is_empty() && self.sequential_ops.is_empty()
    }

    pub fn total_operations(&self) -> usize {
        self.parallel_ops.len() + self.sequential_ops.len()
    }

    pub fn operations(&self) -> impl Iterator<Item = &DatabaseOperation> {
        self.parallel_ops.iter().chain(self.sequential_ops.iter())
    }

    /// Distinct stores touched by the plan, in plan order.
    pub fn stores(&self) -> Vec<StoreKind> {
        let mut stores = Vec::new();
        for op in self.operations() {
            if !stores.contains(&op.store) {
                stores.push(op.store);
            }
        }
        stores
    }

    /// Sum of per-operation cost estimates, ignoring parallelism. Used for
    /// the speedup metric.
    pub fn serial_cost_ms(&self) -> f64 {
        self.operations().map(|op| op.estimated_cost_ms).sum()
    }
}
