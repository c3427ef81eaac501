// # Engine Façade
//
// Top-level entry point: `Engine::execute(query, options)` drives
// cache -> parse -> plan -> coordinate -> recover -> aggregate -> respond,
// and records metrics for every call. The engine exclusively owns the
// adapter registry, the result cache and the metrics sink; per-call state
// never outlives the call.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::adapter::{AdapterRegistry, StoreAdapter};
use crate::aggregate;
use crate::cache::{CacheKey, ResultCache};
use crate::common::{
    QueryKind, QueryStrategy, ResultItem, SemanticQuery, StoreKind, TemporalFilter,
};
use crate::config::EngineConfig;
use crate::error::{OpError, OpErrorKind, QueryError, Result};
use crate::execution::{CoordinationOutcome, Coordinator, RunResult};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::parser::QueryParser;
use crate::planner::{operation_kind_for, ExecutionPlan, Planner};
use crate::recovery::FallbackExecutor;

/// Per-call options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    /// Maximum items returned; 1..=100.
    pub limit: usize,
    pub strategy: QueryStrategy,
    pub use_cache: bool,
    /// Restrict execution to a single store.
    pub database: Option<StoreKind>,
    /// Drop items whose raw score falls below this threshold, after
    /// ranking and before the limit.
    pub min_score: Option<f64>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            strategy: QueryStrategy::Hybrid,
            use_cache: true,
            database: None,
            min_score: None,
        }
    }
}

impl QueryOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_strategy(mut self, strategy: QueryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.limit < 1 || self.limit > 100 {
            return Err(QueryError::InvalidOptions(format!(
                "limit must be between 1 and 100, got {}",
                self.limit
            )));
        }
        if let Some(threshold) = self.min_score {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(QueryError::InvalidOptions(format!(
                    "min_score must be between 0.0 and 1.0, got {}",
                    threshold
                )));
            }
        }
        Ok(())
    }
}

/// How the query was understood.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryAnalysis {
    pub kind: Option<QueryKind>,
    pub search_terms: Vec<String>,
    pub temporal: Option<TemporalFilter>,
    pub topic_filters: Vec<String>,
    pub stores_targeted: Vec<StoreKind>,
}

impl QueryAnalysis {
    fn from_query(query: &SemanticQuery) -> Self {
        Self {
            kind: Some(query.kind),
            search_terms: query.search_terms.clone(),
            temporal: query.temporal,
            topic_filters: query.topic_filters.clone(),
            stores_targeted: query.target_stores.clone(),
        }
    }
}

/// Execution metadata attached to every response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseMetadata {
    pub execution_id: String,
    pub execution_time_ms: f64,
    pub stores_queried: Vec<StoreKind>,
    pub total_operations: usize,
    pub parallel_operations: usize,
    pub sequential_operations: usize,
    pub parallel_efficiency_pct: f64,
    pub speedup_factor: f64,
    pub sla_compliance: bool,
    pub errors: Vec<OpError>,
    pub warnings: Vec<String>,
    pub from_cache: bool,
    pub store_times_ms: BTreeMap<StoreKind, f64>,
    pub raw_result_count: usize,
    pub deduplicated_count: usize,
    pub deduplication_ratio: f64,
}

/// The unified query response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Response {
    pub success: bool,
    pub items: Vec<ResultItem>,
    pub query_analysis: QueryAnalysis,
    pub metadata: ResponseMetadata,
}

/// Federated query engine over the registered store adapters.
pub struct Engine {
    config: EngineConfig,
    registry: AdapterRegistry,
    parser: QueryParser,
    planner: Planner,
    coordinator: Coordinator,
    cache: ResultCache,
    metrics: EngineMetrics,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = ResultCache::new(config.cache_size, config.cache_ttl);
        let planner = Planner::new(config.sla_ms);
        Self {
            config,
            registry: AdapterRegistry::new(),
            parser: QueryParser::new(),
            planner,
            coordinator: Coordinator::new(),
            cache,
            metrics: EngineMetrics::new(),
        }
    }

    /// Register a store adapter. Call before serving queries.
    pub fn register(&mut self, adapter: Arc<dyn StoreAdapter>) {
        self.registry.register(adapter);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.coordinator.stats().snapshot())
    }

    pub fn cached_responses(&self) -> usize {
        self.cache.len()
    }

    /// Execute a query across the federated stores.
    pub async fn execute(&self, raw: &str, options: QueryOptions) -> Result<Response> {
        let started = Instant::now();
        options.validate()?;

        let cache_key = CacheKey::new(
            raw,
            options.limit,
            options.strategy,
            options.database,
            options.min_score,
        );

        if options.use_cache || options.strategy == QueryStrategy::Cached {
            if let Some(mut cached) = self.cache.get(&cache_key) {
                cached.metadata.from_cache = true;
                self.metrics.record_cache_hit();
                tracing::debug!(query = raw, "serving response from cache");
                return Ok(cached);
            }
        }

        let query = self.parser.parse(raw)?;
        tracing::debug!(
            kind = %query.kind,
            terms = ?query.search_terms,
            stores = ?query.target_stores,
            "parsed query"
        );

        if options.strategy == QueryStrategy::Cached {
            // Cache-only execution touches no stores on a miss.
            let response = self.cache_miss_response(&query, started);
            self.metrics
                .record_query(response.metadata.execution_time_ms, true, self.config.sla_ms, &[]);
            return Ok(response);
        }

        let plan = self
            .planner
            .plan(
                &query,
                &self.registry,
                options.strategy,
                options.database,
                options.limit,
            )
            .await;

        if plan.is_empty() {
            let response = self.degenerate_response(&query, &plan, options.database, started);
            self.metrics
                .record_query(response.metadata.execution_time_ms, false, self.config.sla_ms, &[]);
            return Ok(response);
        }

        let deadline = started + Duration::from_millis(self.config.sla_ms);
        let outcome = self
            .coordinator
            .coordinate(&plan, &self.registry, deadline)
            .await;

        let response = self
            .finish(&query, &plan, outcome, &options, started)
            .await;

        if response.success && options.use_cache {
            self.cache.insert(cache_key, response.clone());
        }
        self.metrics.record_query(
            response.metadata.execution_time_ms,
            response.success,
            self.config.sla_ms,
            &response.metadata.stores_queried,
        );
        tracing::info!(
            success = response.success,
            items = response.items.len(),
            errors = response.metadata.errors.len(),
            elapsed_ms = response.metadata.execution_time_ms,
            "query executed"
        );

        Ok(response)
    }

    /// Recovery, aggregation and response assembly for a coordinated plan.
    async fn finish(
        &self,
        query: &SemanticQuery,
        plan: &ExecutionPlan,
        outcome: CoordinationOutcome,
        options: &QueryOptions,
        started: Instant,
    ) -> Response {
        let deadline = started + Duration::from_millis(self.config.sla_ms);
        let mut results = outcome.results;
        let errors = outcome.errors;
        let mut warnings = plan.notes.clone();
        warnings.extend(outcome.warnings);

        let mut single_store_ok = false;
        let mut minimal_item = None;

        if !errors.is_empty() {
            let failed: Vec<RunResult> =
                results.iter().filter(|r| !r.success).cloned().collect();
            let executor = FallbackExecutor::new(&self.registry, &self.planner, options.limit);
            let recovery = executor.recover(query, &failed, deadline).await;
            warnings.extend(recovery.notes);
            single_store_ok = recovery.single_store_completed;
            minimal_item = recovery.minimal_item;
            results.extend(recovery.results);
        }

        let mut store_times_ms = BTreeMap::new();
        for run in &results {
            store_times_ms.insert(run.op.store, round2(run.duration_ms));
        }

        let candidates = aggregate::collect(&results);
        let raw_result_count = candidates.len();
        let deduplicated = aggregate::deduplicate(candidates, &self.config);
        let mut items = deduplicated.items;
        let deduplicated_count = items.len();

        aggregate::rank(&mut items, &query.search_terms, &self.config, Utc::now());
        aggregate::apply_diversity_filter(&mut items, self.config.max_per_source);

        if let Some(threshold) = options.min_score {
            items.retain(|item| item.score >= threshold);
        }
        items.truncate(options.limit);
        for (index, item) in items.iter_mut().enumerate() {
            item.rank_position = index + 1;
        }

        let produced_items = results.iter().any(|r| r.success && !r.items.is_empty());
        let success = produced_items || single_store_ok;
        if !success {
            if let Some(item) = minimal_item {
                items.push(item);
            }
        }

        let execution_time_ms = started.elapsed().as_secs_f64() * 1_000.0;
        let total_operations = plan.total_operations();
        let parallel_operations = plan.parallel_ops.len();
        let sequential_operations = plan.sequential_ops.len();

        let metadata = ResponseMetadata {
            execution_id: Uuid::new_v4().to_string(),
            execution_time_ms: round2(execution_time_ms),
            stores_queried: plan.stores(),
            total_operations,
            parallel_operations,
            sequential_operations,
            parallel_efficiency_pct: parallel_efficiency_pct(
                parallel_operations,
                total_operations,
                outcome.coordination_ms,
                execution_time_ms,
            ),
            speedup_factor: speedup_factor(plan.serial_cost_ms(), execution_time_ms),
            sla_compliance: execution_time_ms <= self.config.sla_ms as f64,
            errors,
            warnings,
            from_cache: false,
            store_times_ms,
            raw_result_count,
            deduplicated_count,
            deduplication_ratio: if raw_result_count > 0 {
                round2(
                    (raw_result_count - deduplicated_count) as f64 / raw_result_count as f64,
                )
            } else {
                0.0
            },
        };

        Response {
            success,
            items,
            query_analysis: QueryAnalysis::from_query(query),
            metadata,
        }
    }

    /// Empty successful response for a cache-only miss.
    fn cache_miss_response(&self, query: &SemanticQuery, started: Instant) -> Response {
        Response {
            success: true,
            items: Vec::new(),
            query_analysis: QueryAnalysis::from_query(query),
            metadata: ResponseMetadata {
                execution_id: Uuid::new_v4().to_string(),
                execution_time_ms: round2(started.elapsed().as_secs_f64() * 1_000.0),
                sla_compliance: true,
                warnings: vec!["no cached response for query".into()],
                ..Default::default()
            },
        }
    }

    /// Failure response for a plan with no runnable operations: one error
    /// per targeted store.
    fn degenerate_response(
        &self,
        query: &SemanticQuery,
        plan: &ExecutionPlan,
        database: Option<StoreKind>,
        started: Instant,
    ) -> Response {
        let targeted: Vec<StoreKind> = match database {
            Some(store) => vec![store],
            None => query.target_stores.clone(),
        };
        let errors: Vec<OpError> = targeted
            .iter()
            .map(|store| {
                OpError::new(
                    *store,
                    operation_kind_for(*store),
                    OpErrorKind::Unavailable,
                    "store unavailable or unhealthy",
                )
            })
            .collect();

        Response {
            success: false,
            items: Vec::new(),
            query_analysis: QueryAnalysis::from_query(query),
            metadata: ResponseMetadata {
                execution_id: Uuid::new_v4().to_string(),
                execution_time_ms: round2(started.elapsed().as_secs_f64() * 1_000.0),
                sla_compliance: true,
                errors,
                warnings: plan.notes.clone(),
                ..Default::default()
            },
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn speedup_factor(serial_cost_ms: f64, actual_ms: f64) -> f64 {
    if actual_ms > 0.0 && serial_cost_ms > 0.0 {
        round2(serial_cost_ms / actual_ms)
    } else {
        1.0
    }
}

/// Share of operations that ran in the parallel group, discounted by the
/// observed coordination overhead.
fn parallel_efficiency_pct(
    parallel_count: usize,
    total_count: usize,
    coordination_ms: f64,
    execution_ms: f64,
) -> f64 {
    if parallel_count == 0 || total_count == 0 {
        return 0.0;
    }
    let parallel_ratio = parallel_count as f64 / total_count as f64;
    let overhead = (coordination_ms - 50.0 * total_count as f64).max(0.0);
    let penalty = if execution_ms > 0.0 {
        (overhead / execution_ms).min(0.5)
    } else {
        0.0
    };
    let efficiency = (parallel_ratio * (1.0 - penalty)).clamp(0.0, 1.0);
    (efficiency * 1_000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_call_contract() {
        let options = QueryOptions::default();
        assert_eq!(options.limit, 10);
        assert_eq!(options.strategy, QueryStrategy::Hybrid);
        assert!(options.use_cache);
        assert!(options.database.is_none());
    }

    #[test]
    fn limit_is_validated() {
        assert!(QueryOptions::default().with_limit(0).validate().is_err());
        assert!(QueryOptions::default().with_limit(101).validate().is_err());
        assert!(QueryOptions::default().with_limit(100).validate().is_ok());
    }

    #[test]
    fn min_score_is_validated() {
        let mut options = QueryOptions::default();
        options.min_score = Some(1.5);
        assert!(options.validate().is_err());
        options.min_score = Some(0.7);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn speedup_and_efficiency_are_bounded() {
        assert_eq!(speedup_factor(0.0, 100.0), 1.0);
        assert_eq!(speedup_factor(400.0, 100.0), 4.0);
        assert_eq!(parallel_efficiency_pct(0, 3, 10.0, 100.0), 0.0);
        let full = parallel_efficiency_pct(3, 3, 10.0, 100.0);
        assert!(full > 99.0 && full <= 100.0);
        let half = parallel_efficiency_pct(1, 2, 10.0, 100.0);
        assert!((half - 50.0).abs() < 1.0);
    }
}
