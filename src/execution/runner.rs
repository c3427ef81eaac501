// Operation runner
//
// Executes a single `DatabaseOperation` against its adapter, enforces the
// per-operation timeout and normalizes the typed payload into
// `ResultItem`s. Adapter failures come back as values, never panics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::adapter::{
    AdapterPayload, CacheValueRecord, DocumentRecord, FileRecord, NodeRecord, StoreAdapter,
};
use crate::common::{ContentHash, ItemKind, ResultItem, StoreKind};
use crate::error::OpError;
use crate::planner::DatabaseOperation;

use super::RunResult;

/// Stateless executor for single operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct OperationRunner;

impl OperationRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run one operation under its timeout.
    pub async fn run(&self, adapter: Arc<dyn StoreAdapter>, op: &DatabaseOperation) -> RunResult {
        let started = Instant::now();
        let timeout = Duration::from_millis(op.timeout_ms);

        let outcome = tokio::time::timeout(timeout, adapter.execute(op.op_kind, &op.params)).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1_000.0;

        match outcome {
            Ok(Ok(response)) => {
                let items = normalize(response.payload, op.store);
                RunResult {
                    op: op.clone(),
                    success: true,
                    items,
                    raw: Some(response.raw),
                    error: None,
                    duration_ms,
                }
            }
            Ok(Err(store_err)) => {
                tracing::warn!(store = %op.store, op = %op.op_kind, error = %store_err, "operation failed");
                let error = OpError::new(op.store, op.op_kind, store_err.kind(), store_err.to_string());
                RunResult::failed(op.clone(), error, duration_ms)
            }
            Err(_) => {
                tracing::warn!(store = %op.store, op = %op.op_kind, timeout_ms = op.timeout_ms, "operation timed out");
                let error = OpError::timeout(op.store, op.op_kind, op.timeout_ms);
                RunResult::failed(op.clone(), error, duration_ms)
            }
        }
    }
}

/// Normalize an adapter payload into uniform result items.
pub fn normalize(payload: AdapterPayload, store: StoreKind) -> Vec<ResultItem> {
    match payload {
        AdapterPayload::Documents(docs) => docs
            .into_iter()
            .map(|doc| normalize_document(doc, store))
            .collect(),
        AdapterPayload::Files(files) => files
            .into_iter()
            .map(|file| normalize_file(file, store))
            .collect(),
        AdapterPayload::Nodes(nodes) => nodes
            .into_iter()
            .map(|node| normalize_node(node, store))
            .collect(),
        AdapterPayload::CacheValues(values) => values
            .into_iter()
            .map(|value| normalize_cache_value(value, store))
            .collect(),
        AdapterPayload::Generic(values) => values
            .into_iter()
            .map(|value| normalize_generic(value, store))
            .collect(),
    }
}

fn normalize_document(doc: DocumentRecord, store: StoreKind) -> ResultItem {
    let score = doc.similarity_score.or(doc.score).unwrap_or(0.0);
    let title = doc
        .title
        .or(doc.file_name)
        .unwrap_or_else(|| "Untitled".to_string());
    let id = if doc.id.is_empty() {
        ContentHash::of(&doc.content).to_hex()
    } else {
        doc.id
    };
    ResultItem::new(id, ItemKind::Document, title, doc.content, score, store, doc.metadata)
}

fn normalize_file(file: FileRecord, store: StoreKind) -> ResultItem {
    let title = file.name.clone().unwrap_or_else(|| file.path.clone());
    let content = file.content.clone().unwrap_or_else(|| file.path.clone());

    let mut metadata = Map::new();
    metadata.insert("path".into(), Value::String(file.path.clone()));
    metadata.insert("size_bytes".into(), Value::from(file.size_bytes));
    if let Some(modified) = file.modified {
        metadata.insert("timestamp".into(), Value::String(modified.to_rfc3339()));
    }

    ResultItem::new(file.path, ItemKind::File, title, content, 0.5, store, metadata)
}

fn normalize_node(node: NodeRecord, store: StoreKind) -> ResultItem {
    let title = node
        .label
        .clone()
        .or(node.name.clone())
        .unwrap_or_else(|| "Graph node".to_string());
    let content = node
        .properties
        .get("content")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            serde_json::to_string(&node.properties).unwrap_or_else(|_| node.id.clone())
        });

    let mut metadata = node.properties;
    if let Some(label) = node.label {
        metadata.insert("label".into(), Value::String(label));
    }
    if let Some(name) = node.name {
        metadata.insert("name".into(), Value::String(name));
    }

    ResultItem::new(node.id, ItemKind::Node, title, content, 0.6, store, metadata)
}

fn normalize_cache_value(record: CacheValueRecord, store: StoreKind) -> ResultItem {
    let mut metadata = Map::new();
    metadata.insert("cache_key".into(), Value::String(record.key.clone()));

    ResultItem::new(
        format!("kv:{}", record.key),
        ItemKind::CacheEntry,
        format!("Cache: {}", record.key),
        record.value,
        0.4,
        store,
        metadata,
    )
}

fn normalize_generic(value: Value, store: StoreKind) -> ResultItem {
    let content = match &value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let mut metadata = Map::new();
    metadata.insert("raw_item".into(), value);

    ResultItem::new(
        ContentHash::of(&content).to_hex(),
        ItemKind::Generic,
        format!("Result from {}", store),
        content,
        0.5,
        store,
        metadata,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ExecutionMode, OperationKind};
    use crate::error::{OpErrorKind, StoreError};
    use crate::planner::{OperationParams, VectorParams};
    use async_trait::async_trait;
    use crate::adapter::{AdapterResponse, HealthStatus};

    /// Adapter that sleeps then fails, for timeout and error-path tests.
    struct ScriptedAdapter {
        delay: Duration,
        result: Result<AdapterPayload, StoreError>,
    }

    #[async_trait]
    impl StoreAdapter for ScriptedAdapter {
        fn kind(&self) -> StoreKind {
            StoreKind::Vector
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
            self.result.clone().map(AdapterResponse::new)
        }
    }

    fn vector_op(timeout_ms: u64) -> DatabaseOperation {
        DatabaseOperation {
            store: StoreKind::Vector,
            op_kind: OperationKind::VectorSearch,
            params: OperationParams::Vector(VectorParams {
                query: "q".into(),
                k: 5,
            }),
            estimated_cost_ms: 10.0,
            mode: ExecutionMode::Parallel,
            priority: 0,
            timeout_ms,
            retries: 0,
        }
    }

    #[tokio::test]
    async fn slow_adapter_times_out() {
        let adapter = Arc::new(ScriptedAdapter {
            delay: Duration::from_millis(200),
            result: Ok(AdapterPayload::Documents(vec![])),
        });
        let result = OperationRunner::new().run(adapter, &vector_op(20)).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, OpErrorKind::Timeout);
    }

    #[tokio::test]
    async fn adapter_errors_are_wrapped_not_raised() {
        let adapter = Arc::new(ScriptedAdapter {
            delay: Duration::ZERO,
            result: Err(StoreError::Connection("refused".into())),
        });
        let result = OperationRunner::new().run(adapter, &vector_op(100)).await;
        assert!(!result.success);
        let error = result.error.unwrap();
        assert_eq!(error.kind, OpErrorKind::Connection);
        assert_eq!(error.store, StoreKind::Vector);
    }

    #[test]
    fn documents_normalize_with_similarity_over_score() {
        let doc = DocumentRecord {
            id: "d1".into(),
            title: Some("Title".into()),
            content: "body text".into(),
            similarity_score: Some(0.9),
            score: Some(0.1),
            ..Default::default()
        };
        let items = normalize(AdapterPayload::Documents(vec![doc]), StoreKind::Vector);
        assert_eq!(items[0].kind, ItemKind::Document);
        assert_eq!(items[0].score, 0.9);
        assert_eq!(items[0].title, "Title");
    }

    #[test]
    fn documents_without_scores_default_to_zero() {
        let doc = DocumentRecord {
            id: "d2".into(),
            file_name: Some("notes.md".into()),
            content: "body".into(),
            ..Default::default()
        };
        let items = normalize(AdapterPayload::Documents(vec![doc]), StoreKind::Relational);
        assert_eq!(items[0].score, 0.0);
        assert_eq!(items[0].title, "notes.md");
    }

    #[test]
    fn files_default_to_half_score_and_carry_path() {
        let file = FileRecord {
            name: Some("guide.md".into()),
            path: "/docs/guide.md".into(),
            content: Some("guide body".into()),
            size_bytes: 10,
            modified: None,
        };
        let items = normalize(AdapterPayload::Files(vec![file]), StoreKind::Filesystem);
        assert_eq!(items[0].kind, ItemKind::File);
        assert_eq!(items[0].score, 0.5);
        assert_eq!(items[0].metadata["path"], Value::String("/docs/guide.md".into()));
    }

    #[test]
    fn nodes_and_cache_values_use_their_defaults() {
        let node = NodeRecord {
            id: "n1".into(),
            label: Some("Document".into()),
            name: Some("planner".into()),
            properties: Map::new(),
        };
        let items = normalize(AdapterPayload::Nodes(vec![node]), StoreKind::Graph);
        assert_eq!(items[0].score, 0.6);
        assert_eq!(items[0].title, "Document");

        let value = CacheValueRecord {
            key: "session:a".into(),
            value: "payload".into(),
        };
        let items = normalize(AdapterPayload::CacheValues(vec![value]), StoreKind::Kv);
        assert_eq!(items[0].score, 0.4);
        assert_eq!(items[0].title, "Cache: session:a");
        assert_eq!(items[0].id, "kv:session:a");
    }

    #[test]
    fn generic_values_score_half() {
        let items = normalize(
            AdapterPayload::Generic(vec![Value::String("anything".into())]),
            StoreKind::Relational,
        );
        assert_eq!(items[0].kind, ItemKind::Generic);
        assert_eq!(items[0].score, 0.5);
        assert_eq!(items[0].content, "anything");
    }
}
