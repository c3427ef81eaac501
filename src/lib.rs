// QueryMesh - Federated query engine
// Core library module
//
// One textual query in, one ranked result set out, drawn from a relational
// store, a dense-vector store, a property graph and a key-value cache. The
// pipeline: parse -> plan (cost-aware) -> coordinate (bounded parallelism,
// timeouts, graceful degradation) -> aggregate, deduplicate and rank ->
// respond with execution metadata. Results are cached with TTL.

pub mod adapter;
pub mod aggregate;
pub mod cache;
pub mod common;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod parser;
pub mod planner;
pub mod recovery;

pub use common::{
    ContentHash, ExecutionMode, ItemKind, OperationKind, QueryKind, QueryStrategy, ResultItem,
    SemanticQuery, StoreKind, TemporalFilter, TemporalKind,
};
pub use config::EngineConfig;
pub use engine::{Engine, QueryAnalysis, QueryOptions, Response, ResponseMetadata};
pub use error::{
    CoordinationError, OpError, OpErrorKind, ParseError, PlanError, QueryError, Result, StoreError,
};
