// # Failure Recovery
//
// Classifies per-operation failures and executes a fallback strategy for
// each: retry with exponential backoff for timeouts, an alternative store
// for connectivity failures, a relational single-store fallback for syntax
// errors, and a minimal well-typed response when resources are exhausted.
//
// The executor is constructed fresh per call and is effectively a function
// from (query, failed operations, errors) to recovered results; it holds no
// mutable state of its own.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::adapter::AdapterRegistry;
use crate::common::{ItemKind, ResultItem, SemanticQuery, StoreKind};
use crate::error::{OpError, OpErrorKind};
use crate::execution::{OperationRunner, RunResult};
use crate::planner::Planner;

/// Severity of a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Recovery strategy chosen for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStrategy {
    Retry,
    AlternativeStore,
    SingleStore,
    MinimalResponse,
}

/// Store priority for alternative-store fallback, most reliable first.
const FALLBACK_PRIORITY: [StoreKind; 5] = [
    StoreKind::Relational,
    StoreKind::Vector,
    StoreKind::Filesystem,
    StoreKind::Graph,
    StoreKind::Kv,
];

/// Retry backoff: starts at 100ms, doubles, at most 3 attempts.
const RETRY_BASE_DELAY_MS: u64 = 100;
const RETRY_ATTEMPT_CAP: u32 = 3;

/// Map a failure to its severity and recovery strategy.
pub fn classify(error: &OpError) -> (Severity, FallbackStrategy) {
    match error.kind {
        OpErrorKind::Timeout => (Severity::Medium, FallbackStrategy::Retry),
        OpErrorKind::Connection | OpErrorKind::Unavailable | OpErrorKind::Permission => {
            (Severity::High, FallbackStrategy::AlternativeStore)
        }
        OpErrorKind::ResourceExhausted => (Severity::Critical, FallbackStrategy::MinimalResponse),
        OpErrorKind::Syntax => (Severity::Low, FallbackStrategy::SingleStore),
        // A database context is always known here, so unmatched failures
        // default to a retry.
        OpErrorKind::Other => (Severity::Medium, FallbackStrategy::Retry),
    }
}

/// What recovery produced for one coordination outcome.
#[derive(Debug, Default)]
pub struct RecoveryOutcome {
    /// Additional run results recovered via fallback.
    pub results: Vec<RunResult>,
    /// Notes describing which strategies ran.
    pub notes: Vec<String>,
    /// Set when a single-store fallback completed, even with zero items;
    /// such a response still counts as valid.
    pub single_store_completed: bool,
    /// Synthesized user-facing item for the minimal-response path.
    pub minimal_item: Option<ResultItem>,
}

/// Executes fallback strategies against the live registry.
pub struct FallbackExecutor<'a> {
    registry: &'a AdapterRegistry,
    planner: &'a Planner,
    runner: OperationRunner,
    limit: usize,
}

impl<'a> FallbackExecutor<'a> {
    pub fn new(registry: &'a AdapterRegistry, planner: &'a Planner, limit: usize) -> Self {
        Self {
            registry,
            planner,
            runner: OperationRunner::new(),
            limit,
        }
    }

    /// Recover from the failed operations in `failed`, respecting the
    /// remaining deadline.
    pub async fn recover(
        &self,
        query: &SemanticQuery,
        failed: &[RunResult],
        deadline: Instant,
    ) -> RecoveryOutcome {
        let mut outcome = RecoveryOutcome::default();
        let failed_stores: Vec<StoreKind> = failed.iter().map(|r| r.op.store).collect();
        let mut single_store_done = false;

        for run in failed {
            let Some(error) = &run.error else {
                continue;
            };
            let (severity, strategy) = classify(error);
            tracing::debug!(
                store = %error.store,
                kind = %error.kind.as_str(),
                ?severity,
                ?strategy,
                "recovering failed operation"
            );

            match strategy {
                FallbackStrategy::Retry => {
                    if let Some(result) = self.retry(run, deadline).await {
                        outcome
                            .notes
                            .push(format!("retry recovered {} operation", run.op.store));
                        outcome.results.push(result);
                    }
                }
                FallbackStrategy::AlternativeStore => {
                    if let Some(result) = self
                        .alternative_store(query, &failed_stores, deadline)
                        .await
                    {
                        outcome.notes.push(format!(
                            "rerouted {} operation to {}",
                            run.op.store, result.op.store
                        ));
                        outcome.results.push(result);
                    }
                }
                FallbackStrategy::SingleStore => {
                    if single_store_done {
                        continue;
                    }
                    single_store_done = true;
                    if let Some(result) = self.single_store(query, deadline).await {
                        outcome.single_store_completed = result.success;
                        outcome
                            .notes
                            .push("fell back to relational single-store query".into());
                        outcome.results.push(result);
                    }
                }
                FallbackStrategy::MinimalResponse => {
                    outcome.minimal_item = Some(minimal_item(error));
                    outcome
                        .notes
                        .push("resource exhaustion; returning minimal response".into());
                }
            }
        }

        outcome
    }

    /// Retry the failed operation with exponential backoff. `op.retries`
    /// bounds the attempts, capped at three.
    async fn retry(&self, run: &RunResult, deadline: Instant) -> Option<RunResult> {
        let attempts = run.op.retries.min(RETRY_ATTEMPT_CAP);
        let mut delay_ms = RETRY_BASE_DELAY_MS;

        for _ in 0..attempts {
            if Instant::now() + Duration::from_millis(delay_ms) >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            delay_ms *= 2;

            let adapter = self.registry.get(run.op.store)?;
            let result = self.runner.run(adapter, &run.op).await;
            if result.success {
                return Some(result);
            }
        }
        None
    }

    /// Re-aim the query's intent at the next store in the priority list,
    /// skipping every store that already failed.
    async fn alternative_store(
        &self,
        query: &SemanticQuery,
        failed_stores: &[StoreKind],
        deadline: Instant,
    ) -> Option<RunResult> {
        for store in FALLBACK_PRIORITY {
            if failed_stores.contains(&store) {
                continue;
            }
            let Some(adapter) = self.registry.get(store) else {
                continue;
            };
            if Instant::now() >= deadline {
                return None;
            }

            let health = adapter.health().await;
            if !health.healthy {
                continue;
            }

            let op = self.planner.build_operation(
                query,
                store,
                health.size_hint,
                self.limit,
                crate::common::QueryStrategy::Hybrid,
                1,
            );
            let result = self.runner.run(adapter, &op).await;
            if result.success {
                return Some(result);
            }
        }
        None
    }

    /// Run the query against the relational store alone.
    async fn single_store(&self, query: &SemanticQuery, deadline: Instant) -> Option<RunResult> {
        if Instant::now() >= deadline {
            return None;
        }
        let adapter = self.registry.get(StoreKind::Relational)?;
        let health = adapter.health().await;
        if !health.healthy {
            return None;
        }

        let op = self.planner.build_operation(
            query,
            StoreKind::Relational,
            health.size_hint,
            self.limit,
            crate::common::QueryStrategy::Hybrid,
            1,
        );
        Some(self.runner.run(adapter, &op).await)
    }
}

/// Well-typed generic item carrying a user-facing error string.
fn minimal_item(error: &OpError) -> ResultItem {
    let mut metadata = Map::new();
    metadata.insert("error_kind".into(), Value::String(error.kind.as_str().into()));
    metadata.insert("error_store".into(), Value::String(error.store.as_str().into()));

    ResultItem::new(
        "system-message",
        ItemKind::Generic,
        "System Error",
        "Unable to process query due to system errors. Please try again later.",
        0.0,
        error.store,
        metadata,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{
        AdapterPayload, AdapterResponse, DocumentRecord, HealthStatus, MemoryRelationalStore,
        StoreAdapter,
    };
    use crate::common::OperationKind;
    use crate::error::StoreError;
    use crate::parser::QueryParser;
    use crate::planner::OperationParams;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails a configurable number of times, then succeeds.
    struct FlakyAdapter {
        kind: StoreKind,
        failures_left: AtomicU32,
        error: StoreError,
    }

    #[async_trait]
    impl StoreAdapter for FlakyAdapter {
        fn kind(&self) -> StoreKind {
            self.kind
        }

        async fn health(&self) -> HealthStatus {
            HealthStatus::healthy(1)
        }

        async fn execute(
            &self,
            _op: OperationKind,
            _params: &OperationParams,
        ) -> Result<AdapterResponse, StoreError> {
            if self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            }).is_ok()
            {
                return Err(self.error.clone());
            }
            Ok(AdapterResponse::new(AdapterPayload::Documents(vec![
                DocumentRecord {
                    id: "recovered".into(),
                    content: "recovered content".into(),
                    score: Some(0.7),
                    ..Default::default()
                },
            ])))
        }
    }

    fn query() -> SemanticQuery {
        QueryParser::new().parse("memory%architecture").expect("parse")
    }

    fn failed_run(store: StoreKind, kind: OpErrorKind) -> RunResult {
        let planner = Planner::new(2_000);
        let op = planner.build_operation(
            &query(),
            store,
            10,
            10,
            crate::common::QueryStrategy::Hybrid,
            1,
        );
        RunResult::failed(
            op.clone(),
            OpError::new(store, op.op_kind, kind, "injected failure"),
            5.0,
        )
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[test]
    fn classification_matches_severity_table() {
        let err = |kind| OpError::new(StoreKind::Vector, OperationKind::VectorSearch, kind, "x");
        assert_eq!(
            classify(&err(OpErrorKind::Timeout)),
            (Severity::Medium, FallbackStrategy::Retry)
        );
        assert_eq!(
            classify(&err(OpErrorKind::Connection)),
            (Severity::High, FallbackStrategy::AlternativeStore)
        );
        assert_eq!(
            classify(&err(OpErrorKind::Permission)),
            (Severity::High, FallbackStrategy::AlternativeStore)
        );
        assert_eq!(
            classify(&err(OpErrorKind::Syntax)),
            (Severity::Low, FallbackStrategy::SingleStore)
        );
        assert_eq!(
            classify(&err(OpErrorKind::ResourceExhausted)),
            (Severity::Critical, FallbackStrategy::MinimalResponse)
        );
    }

    #[tokio::test]
    async fn timeout_is_retried_until_success() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(FlakyAdapter {
            kind: StoreKind::Vector,
            failures_left: AtomicU32::new(1),
            error: StoreError::Other("transient".into()),
        }));
        let planner = Planner::new(2_000);
        let executor = FallbackExecutor::new(&registry, &planner, 10);

        let failed = vec![failed_run(StoreKind::Vector, OpErrorKind::Timeout)];
        let outcome = executor.recover(&query(), &failed, far_deadline()).await;

        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].success);
        assert_eq!(outcome.results[0].items[0].id, "recovered");
    }

    #[tokio::test]
    async fn connection_failure_reroutes_to_relational() {
        let mut registry = AdapterRegistry::new();
        let relational = Arc::new(MemoryRelationalStore::new());
        relational.insert_row(
            "row-1",
            "architecture notes",
            vec![],
            "memory",
            Utc::now(),
        );
        registry.register(relational);

        let planner = Planner::new(2_000);
        let executor = FallbackExecutor::new(&registry, &planner, 10);

        let failed = vec![failed_run(StoreKind::Vector, OpErrorKind::Connection)];
        let outcome = executor.recover(&query(), &failed, far_deadline()).await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].op.store, StoreKind::Relational);
        assert!(outcome.results[0].success);
        assert!(!outcome.results[0].items.is_empty());
    }

    #[tokio::test]
    async fn alternative_store_skips_failed_stores() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(FlakyAdapter {
            kind: StoreKind::Relational,
            failures_left: AtomicU32::new(u32::MAX),
            error: StoreError::Connection("down".into()),
        }));

        let planner = Planner::new(2_000);
        let executor = FallbackExecutor::new(&registry, &planner, 10);

        // The relational store itself failed; it must not be re-tried as
        // its own alternative.
        let failed = vec![failed_run(StoreKind::Relational, OpErrorKind::Connection)];
        let outcome = executor.recover(&query(), &failed, far_deadline()).await;
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn syntax_error_falls_back_to_single_store_once() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(MemoryRelationalStore::new()));
        let planner = Planner::new(2_000);
        let executor = FallbackExecutor::new(&registry, &planner, 10);

        let failed = vec![
            failed_run(StoreKind::Graph, OpErrorKind::Syntax),
            failed_run(StoreKind::Vector, OpErrorKind::Syntax),
        ];
        let outcome = executor.recover(&query(), &failed, far_deadline()).await;

        // One relational run, even with an empty result set, marks the
        // fallback as completed.
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.single_store_completed);
    }

    #[tokio::test]
    async fn resource_exhaustion_yields_minimal_item() {
        let registry = AdapterRegistry::new();
        let planner = Planner::new(2_000);
        let executor = FallbackExecutor::new(&registry, &planner, 10);

        let failed = vec![failed_run(StoreKind::Vector, OpErrorKind::ResourceExhausted)];
        let outcome = executor.recover(&query(), &failed, far_deadline()).await;

        let item = outcome.minimal_item.expect("minimal item");
        assert_eq!(item.kind, ItemKind::Generic);
        assert!(item.content.contains("Unable to process query"));
    }
}
