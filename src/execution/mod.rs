// # Execution Layer
//
// Runs execution plans against the adapter registry:
//
// - `runner` executes a single operation under its timeout and normalizes
//   the adapter payload into uniform `ResultItem`s
// - `coordinator` drives a whole plan: fan-out/gather for the parallel
//   group, an awaited chain for the sequential tail, and the outer SLA
//   deadline with partial-result delivery
// - `stats` tracks coordination counters for the metrics sink

pub mod coordinator;
pub mod runner;
pub mod stats;

use serde_json::Value;

use crate::common::ResultItem;
use crate::error::OpError;
use crate::planner::DatabaseOperation;

pub use coordinator::{CoordinationOutcome, Coordinator};
pub use runner::OperationRunner;
pub use stats::{CoordinationSnapshot, CoordinationStatistics};

/// Outcome of one operation run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub op: DatabaseOperation,
    pub success: bool,
    pub items: Vec<ResultItem>,
    pub raw: Option<Value>,
    pub error: Option<OpError>,
    pub duration_ms: f64,
}

impl RunResult {
    pub fn failed(op: DatabaseOperation, error: OpError, duration_ms: f64) -> Self {
        Self {
            op,
            success: false,
            items: Vec::new(),
            raw: None,
            error: Some(error),
            duration_ms,
        }
    }
}
