// In-memory property-graph store adapter
//
// Nodes carry a label, a display name and open properties; edges are typed
// and directed. Pattern queries run a case-insensitive regex over node
// names and content properties. Traversals are breadth-first, bounded at
// depth 5.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Map, Value};

use crate::common::{OperationKind, StoreKind};
use crate::error::StoreError;
use crate::planner::operation::{GraphParams, OperationParams, MAX_GRAPH_DEPTH};

use super::{AdapterPayload, AdapterResponse, HealthStatus, NodeRecord, StoreAdapter};

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub name: String,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone)]
struct GraphEdge {
    from: String,
    to: String,
    rel_type: String,
}

/// In-memory property graph.
#[derive(Default)]
pub struct MemoryGraphStore {
    nodes: RwLock<HashMap<String, GraphNode>>,
    edges: RwLock<Vec<GraphEdge>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(
        &self,
        id: impl Into<String>,
        label: impl Into<String>,
        name: impl Into<String>,
        properties: Map<String, Value>,
    ) {
        let id = id.into();
        self.nodes.write().insert(
            id.clone(),
            GraphNode {
                id,
                label: label.into(),
                name: name.into(),
                properties,
            },
        );
    }

    pub fn insert_edge(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        rel_type: impl Into<String>,
    ) {
        self.edges.write().push(GraphEdge {
            from: from.into(),
            to: to.into(),
            rel_type: rel_type.into(),
        });
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    fn pattern_query(&self, pattern: &str) -> Result<Vec<GraphNode>, StoreError> {
        let regex = Regex::new(pattern)
            .map_err(|e| StoreError::Syntax(format!("invalid graph pattern: {}", e)))?;
        let nodes = self.nodes.read();
        let mut hits: Vec<GraphNode> = nodes
            .values()
            .filter(|node| {
                let content = node
                    .properties
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                regex.is_match(&node.name) || regex.is_match(content)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits)
    }

    fn traverse(
        &self,
        start_id: &str,
        rel_types: &[String],
        max_depth: usize,
    ) -> Result<Vec<GraphNode>, StoreError> {
        let nodes = self.nodes.read();
        if !nodes.contains_key(start_id) {
            return Err(StoreError::Unavailable(format!(
                "start node '{}' does not exist",
                start_id
            )));
        }

        let edges = self.edges.read();
        let mut visited: HashSet<String> = HashSet::from([start_id.to_string()]);
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(start_id.to_string(), 0)]);
        let mut reached = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in edges.iter().filter(|e| e.from == current) {
                if !rel_types.is_empty() && !rel_types.contains(&edge.rel_type) {
                    continue;
                }
                if visited.insert(edge.to.clone()) {
                    if let Some(node) = nodes.get(&edge.to) {
                        reached.push(node.clone());
                    }
                    queue.push_back((edge.to.clone(), depth + 1));
                }
            }
        }

        Ok(reached)
    }
}

#[async_trait]
impl StoreAdapter for MemoryGraphStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Graph
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::healthy(self.nodes.read().len())
    }

    async fn execute(
        &self,
        op: OperationKind,
        params: &OperationParams,
    ) -> Result<AdapterResponse, StoreError> {
        if op != OperationKind::GraphQuery {
            return Err(StoreError::Syntax(format!(
                "graph store does not implement {}",
                op
            )));
        }

        let hits = match params {
            OperationParams::Graph(GraphParams::Pattern(pattern)) => self.pattern_query(pattern)?,
            OperationParams::Graph(GraphParams::Traverse {
                start_id,
                rel_types,
                max_depth,
            }) => {
                if *max_depth > MAX_GRAPH_DEPTH {
                    return Err(StoreError::Syntax(format!(
                        "traversal depth {} exceeds limit {}",
                        max_depth, MAX_GRAPH_DEPTH
                    )));
                }
                self.traverse(start_id, rel_types, *max_depth)?
            }
            _ => {
                return Err(StoreError::Syntax(
                    "graph query requires graph parameters".into(),
                ))
            }
        };

        let records = hits
            .into_iter()
            .map(|node| NodeRecord {
                id: node.id,
                label: Some(node.label),
                name: Some(node.name),
                properties: node.properties,
            })
            .collect();

        Ok(AdapterResponse::new(AdapterPayload::Nodes(records)))
    }
}
