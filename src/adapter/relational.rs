// In-memory relational store adapter
//
// Reference implementation of the relational capability contract: substring
// match across content and tags, temporal filter on creation time, rows
// ordered newest-first. The reported score is the matched-term ratio.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::common::{OperationKind, StoreKind};
use crate::error::StoreError;
use crate::planner::operation::OperationParams;

use super::{AdapterPayload, AdapterResponse, DocumentRecord, HealthStatus, StoreAdapter};

/// A stored row with metadata and a creation timestamp.
#[derive(Debug, Clone)]
pub struct RelationalRow {
    pub id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub resource_type: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory relational store.
#[derive(Default)]
pub struct MemoryRelationalStore {
    rows: RwLock<Vec<RelationalRow>>,
}

impl MemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_row(
        &self,
        id: impl Into<String>,
        content: impl Into<String>,
        tags: Vec<String>,
        resource_type: impl Into<String>,
        created_at: DateTime<Utc>,
    ) {
        self.rows.write().push(RelationalRow {
            id: id.into(),
            content: content.into(),
            tags,
            resource_type: resource_type.into(),
            created_at,
        });
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }
}

#[async_trait]
impl StoreAdapter for MemoryRelationalStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Relational
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::healthy(self.rows.read().len())
    }

    async fn execute(
        &self,
        op: OperationKind,
        params: &OperationParams,
    ) -> Result<AdapterResponse, StoreError> {
        if !matches!(op, OperationKind::Retrieve | OperationKind::Search) {
            return Err(StoreError::Syntax(format!(
                "relational store does not implement {}",
                op
            )));
        }
        let params = match params {
            OperationParams::Relational(p) => p,
            _ => {
                return Err(StoreError::Syntax(
                    "relational operation requires relational parameters".into(),
                ))
            }
        };

        let terms: Vec<String> = params
            .search_terms
            .iter()
            .map(|t| t.to_lowercase())
            .collect();

        let mut hits: Vec<(RelationalRow, f64)> = self
            .rows
            .read()
            .iter()
            .filter(|row| {
                params
                    .resource_type
                    .as_ref()
                    .map_or(true, |rt| row.resource_type == *rt)
            })
            .filter(|row| {
                params
                    .temporal
                    .map_or(true, |window| window.contains(row.created_at))
            })
            .filter_map(|row| {
                let haystack = format!("{} {}", row.content, row.tags.join(" ")).to_lowercase();
                let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                if matched == 0 && !terms.is_empty() {
                    return None;
                }
                let score = if terms.is_empty() {
                    0.0
                } else {
                    matched as f64 / terms.len() as f64
                };
                Some((row.clone(), score))
            })
            .collect();

        hits.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at));
        hits.truncate(params.limit);

        let documents = hits
            .into_iter()
            .map(|(row, score)| {
                let mut metadata = Map::new();
                metadata.insert("timestamp".into(), Value::String(row.created_at.to_rfc3339()));
                metadata.insert("resource_type".into(), Value::String(row.resource_type));
                metadata.insert(
                    "tags".into(),
                    Value::Array(row.tags.into_iter().map(Value::String).collect()),
                );
                DocumentRecord {
                    id: row.id,
                    title: None,
                    file_name: None,
                    content: row.content,
                    similarity_score: None,
                    score: Some(score),
                    metadata,
                }
            })
            .collect();

        Ok(AdapterResponse::new(AdapterPayload::Documents(documents)))
    }
}
