// In-memory dense-vector store adapter
//
// Documents are embedded with a deterministic bag-of-tokens projection and
// searched by cosine similarity. Good enough to exercise the pipeline's
// vector path end to end; a production deployment fronts a real vector
// database behind the same trait.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::common::{OperationKind, StoreKind};
use crate::error::StoreError;
use crate::planner::operation::OperationParams;

use super::{AdapterPayload, AdapterResponse, DocumentRecord, HealthStatus, StoreAdapter};

const EMBEDDING_DIMS: usize = 64;

#[derive(Debug, Clone)]
struct VectorDoc {
    id: String,
    title: String,
    content: String,
    embedding: Vec<f32>,
    metadata: Map<String, Value>,
}

/// In-memory vector store with hashed bag-of-tokens embeddings.
#[derive(Default)]
pub struct MemoryVectorStore {
    docs: RwLock<Vec<VectorDoc>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(
        &self,
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) {
        let content = content.into();
        let embedding = embed(&content);
        self.docs.write().push(VectorDoc {
            id: id.into(),
            title: title.into(),
            content,
            embedding,
            metadata,
        });
    }

    pub fn document_count(&self) -> usize {
        self.docs.read().len()
    }
}

#[async_trait]
impl StoreAdapter for MemoryVectorStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Vector
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::healthy(self.docs.read().len())
    }

    async fn execute(
        &self,
        op: OperationKind,
        params: &OperationParams,
    ) -> Result<AdapterResponse, StoreError> {
        if op != OperationKind::VectorSearch {
            return Err(StoreError::Syntax(format!(
                "vector store does not implement {}",
                op
            )));
        }
        let params = match params {
            OperationParams::Vector(p) => p,
            _ => {
                return Err(StoreError::Syntax(
                    "vector search requires vector parameters".into(),
                ))
            }
        };

        let query_embedding = embed(&params.query);
        let mut scored: Vec<(f64, VectorDoc)> = self
            .docs
            .read()
            .iter()
            .map(|doc| (cosine(&query_embedding, &doc.embedding), doc.clone()))
            .filter(|(similarity, _)| *similarity > 0.0)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(params.k);

        let documents = scored
            .into_iter()
            .map(|(similarity, doc)| DocumentRecord {
                id: doc.id,
                title: Some(doc.title),
                file_name: None,
                content: doc.content,
                similarity_score: Some((similarity * 10_000.0).round() / 10_000.0),
                score: None,
                metadata: doc.metadata,
            })
            .collect();

        Ok(AdapterResponse::new(AdapterPayload::Documents(documents)))
    }
}

/// Deterministic bag-of-tokens embedding: each token hashes to a dimension,
/// the vector is L2-normalized.
fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIMS];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let dim = (hasher.finish() % EMBEDDING_DIMS as u64) as usize;
        vector[dim] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x * y) as f64).sum()
}
