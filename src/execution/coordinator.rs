// Execution coordinator
//
// Drives a plan: fans out the parallel group as spawned tasks gathered
// together, then walks the sequential tail as an awaited chain. Individual
// failures never cascade to sibling operations; the outer deadline cancels
// whatever has not started and lets already-collected results flow on.

use std::time::Instant;

use futures::future::join_all;

use crate::adapter::AdapterRegistry;
use crate::error::{OpError, OpErrorKind};
use crate::planner::{DatabaseOperation, ExecutionPlan};

use super::stats::{CoordinationShape, CoordinationStatistics};
use super::{OperationRunner, RunResult};

/// Result of coordinating one plan.
#[derive(Debug, Default)]
pub struct CoordinationOutcome {
    pub results: Vec<RunResult>,
    pub errors: Vec<OpError>,
    pub warnings: Vec<String>,
    pub parallel_count: usize,
    pub sequential_count: usize,
    pub coordination_ms: f64,
}

impl CoordinationOutcome {
    pub fn successful_results(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

/// Plan coordinator; owns the per-run statistics.
#[derive(Debug, Default)]
pub struct Coordinator {
    runner: OperationRunner,
    stats: CoordinationStatistics,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &CoordinationStatistics {
        &self.stats
    }

    /// Execute a plan against the registry, honoring the outer deadline.
    pub async fn coordinate(
        &self,
        plan: &ExecutionPlan,
        registry: &AdapterRegistry,
        deadline: Instant,
    ) -> CoordinationOutcome {
        let started = Instant::now();
        let mut outcome = CoordinationOutcome {
            parallel_count: plan.parallel_ops.len(),
            sequential_count: plan.sequential_ops.len(),
            ..Default::default()
        };

        if plan.is_empty() {
            self.stats.record(0, CoordinationShape::Empty, 0.0, true);
            return outcome;
        }

        self.run_parallel_group(&plan.parallel_ops, registry, deadline, &mut outcome)
            .await;
        self.run_sequential_tail(&plan.sequential_ops, registry, deadline, &mut outcome)
            .await;

        for result in &outcome.results {
            if let Some(error) = &result.error {
                outcome.errors.push(error.clone());
            }
        }

        outcome.coordination_ms = started.elapsed().as_secs_f64() * 1_000.0;
        let shape = match (plan.parallel_ops.is_empty(), plan.sequential_ops.is_empty()) {
            (false, false) => CoordinationShape::Mixed,
            (false, true) => CoordinationShape::Parallel,
            (true, false) => CoordinationShape::Sequential,
            (true, true) => CoordinationShape::Empty,
        };
        self.stats.record(
            plan.total_operations(),
            shape,
            outcome.coordination_ms,
            outcome.successful_results() > 0,
        );

        outcome
    }

    /// Start every parallel operation in plan order and gather them all.
    /// Completion order is unspecified; result order follows the plan.
    async fn run_parallel_group(
        &self,
        ops: &[DatabaseOperation],
        registry: &AdapterRegistry,
        deadline: Instant,
        outcome: &mut CoordinationOutcome,
    ) {
        if ops.is_empty() {
            return;
        }

        let mut handles = Vec::with_capacity(ops.len());
        for op in ops {
            let Some(adapter) = registry.get(op.store) else {
                outcome.results.push(RunResult::failed(
                    op.clone(),
                    OpError::new(
                        op.store,
                        op.op_kind,
                        OpErrorKind::Unavailable,
                        "no adapter registered",
                    ),
                    0.0,
                ));
                continue;
            };

            let mut scoped = op.clone();
            scoped.timeout_ms = scoped.timeout_ms.min(remaining_ms(deadline));
            let runner = self.runner;
            handles.push((
                op.clone(),
                tokio::spawn(async move { runner.run(adapter, &scoped).await }),
            ));
        }

        let (ops, joins): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (op, joined) in ops.into_iter().zip(join_all(joins).await) {
            match joined {
                Ok(result) => outcome.results.push(result),
                Err(join_err) => outcome.results.push(RunResult::failed(
                    op.clone(),
                    OpError::new(
                        op.store,
                        op.op_kind,
                        OpErrorKind::Other,
                        format!("operation task failed: {}", join_err),
                    ),
                    0.0,
                )),
            }
        }
    }

    /// Walk the sequential tail in plan order. Start order equals
    /// completion order here; operations past the deadline are recorded as
    /// timed out without being started.
    async fn run_sequential_tail(
        &self,
        ops: &[DatabaseOperation],
        registry: &AdapterRegistry,
        deadline: Instant,
        outcome: &mut CoordinationOutcome,
    ) {
        for op in ops {
            let remaining = remaining_ms(deadline);
            if remaining == 0 {
                outcome.results.push(RunResult::failed(
                    op.clone(),
                    OpError::new(
                        op.store,
                        op.op_kind,
                        OpErrorKind::Timeout,
                        "outer deadline exceeded before operation start",
                    ),
                    0.0,
                ));
                continue;
            }

            let Some(adapter) = registry.get(op.store) else {
                outcome.results.push(RunResult::failed(
                    op.clone(),
                    OpError::new(
                        op.store,
                        op.op_kind,
                        OpErrorKind::Unavailable,
                        "no adapter registered",
                    ),
                    0.0,
                ));
                continue;
            };

            let mut scoped = op.clone();
            scoped.timeout_ms = scoped.timeout_ms.min(remaining);
            let result = self.runner.run(adapter, &scoped).await;
            if !result.success {
                outcome
                    .warnings
                    .push(format!("sequential {} operation failed; continuing", op.store));
            }
            outcome.results.push(result);
        }
    }
}

fn remaining_ms(deadline: Instant) -> u64 {
    deadline
        .saturating_duration_since(Instant::now())
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{
        AdapterPayload, AdapterResponse, DocumentRecord, HealthStatus, StoreAdapter,
    };
    use crate::common::{ExecutionMode, OperationKind, QueryKind, StoreKind};
    use crate::error::StoreError;
    use crate::planner::{OperationParams, VectorParams};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct StubAdapter {
        kind: StoreKind,
        delay: Duration,
        fail: Option<StoreError>,
    }

    #[async_trait]
    impl StoreAdapter for StubAdapter {
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
            tokio::time::sleep(self.delay).await;
            if let Some(err) = &self.fail {
                return Err(err.clone());
            }
            Ok(AdapterResponse::new(AdapterPayload::Documents(vec![
                DocumentRecord {
                    id: format!("{}-doc", self.kind),
                    content: format!("content from {}", self.kind),
                    score: Some(0.8),
                    ..Default::default()
                },
            ])))
        }
    }

    fn op(store: StoreKind, mode: ExecutionMode, timeout_ms: u64) -> DatabaseOperation {
        DatabaseOperation {
            store,
            op_kind: OperationKind::VectorSearch,
            params: OperationParams::Vector(VectorParams {
                query: "q".into(),
                k: 5,
            }),
            estimated_cost_ms: 10.0,
            mode,
            priority: 0,
            timeout_ms,
            retries: 0,
        }
    }

    fn plan(parallel: Vec<DatabaseOperation>, sequential: Vec<DatabaseOperation>) -> ExecutionPlan {
        ExecutionPlan {
            query_kind: QueryKind::Memory,
            parallel_ops: parallel,
            sequential_ops: sequential,
            estimated_total_ms: 0.0,
            notes: vec![],
        }
    }

    fn registry(adapters: Vec<StubAdapter>) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        for adapter in adapters {
            registry.register(Arc::new(adapter));
        }
        registry
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn parallel_failures_do_not_abort_siblings() {
        let registry = registry(vec![
            StubAdapter {
                kind: StoreKind::Vector,
                delay: Duration::ZERO,
                fail: Some(StoreError::Connection("refused".into())),
            },
            StubAdapter {
                kind: StoreKind::Relational,
                delay: Duration::ZERO,
                fail: None,
            },
        ]);
        let plan = plan(
            vec![
                op(StoreKind::Vector, ExecutionMode::Parallel, 200),
                op(StoreKind::Relational, ExecutionMode::Parallel, 200),
            ],
            vec![],
        );

        let coordinator = Coordinator::new();
        let outcome = coordinator.coordinate(&plan, &registry, far_deadline()).await;

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.successful_results(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].store, StoreKind::Vector);
    }

    #[tokio::test]
    async fn per_operation_timeouts_are_enforced() {
        let registry = registry(vec![StubAdapter {
            kind: StoreKind::Vector,
            delay: Duration::from_millis(500),
            fail: None,
        }]);
        let plan = plan(vec![op(StoreKind::Vector, ExecutionMode::Parallel, 30)], vec![]);

        let outcome = Coordinator::new()
            .coordinate(&plan, &registry, far_deadline())
            .await;
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, OpErrorKind::Timeout);
        // Scheduling slack allowance on top of the 30ms timeout.
        assert!(outcome.results[0].duration_ms < 200.0);
    }

    #[tokio::test]
    async fn outer_deadline_skips_unstarted_sequential_ops() {
        let registry = registry(vec![
            StubAdapter {
                kind: StoreKind::Relational,
                delay: Duration::from_millis(60),
                fail: None,
            },
            StubAdapter {
                kind: StoreKind::Graph,
                delay: Duration::from_millis(60),
                fail: None,
            },
        ]);
        let plan = plan(
            vec![],
            vec![
                op(StoreKind::Relational, ExecutionMode::Sequential, 500),
                op(StoreKind::Graph, ExecutionMode::Sequential, 500),
            ],
        );

        let deadline = Instant::now() + Duration::from_millis(80);
        let outcome = Coordinator::new().coordinate(&plan, &registry, deadline).await;

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results[0].success, "first op fits the deadline");
        assert!(!outcome.results[1].success, "second op is past the deadline");
        assert_eq!(
            outcome.results[1].error.as_ref().unwrap().kind,
            OpErrorKind::Timeout
        );
    }

    #[tokio::test]
    async fn missing_adapter_is_an_unavailable_error() {
        let registry = registry(vec![]);
        let plan = plan(vec![op(StoreKind::Kv, ExecutionMode::Parallel, 100)], vec![]);
        let outcome = Coordinator::new()
            .coordinate(&plan, &registry, far_deadline())
            .await;
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, OpErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn sequential_ops_complete_in_plan_order() {
        let registry = registry(vec![
            StubAdapter {
                kind: StoreKind::Relational,
                delay: Duration::from_millis(20),
                fail: None,
            },
            StubAdapter {
                kind: StoreKind::Graph,
                delay: Duration::ZERO,
                fail: None,
            },
        ]);
        let plan = plan(
            vec![],
            vec![
                op(StoreKind::Relational, ExecutionMode::Sequential, 200),
                op(StoreKind::Graph, ExecutionMode::Sequential, 200),
            ],
        );

        let outcome = Coordinator::new()
            .coordinate(&plan, &registry, far_deadline())
            .await;
        let stores: Vec<StoreKind> = outcome.results.iter().map(|r| r.op.store).collect();
        assert_eq!(stores, vec![StoreKind::Relational, StoreKind::Graph]);
    }
}
