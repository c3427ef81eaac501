// # Result Aggregation
//
// Merges per-operation results into a single candidate list and removes
// duplicates by content hash. For each duplicate group the representative
// with the best (raw score, store weight) pair survives and records every
// source store that produced a member of the group.

pub mod ranking;

use std::collections::HashMap;

use serde_json::Value;

use crate::common::{ContentHash, ResultItem};
use crate::config::EngineConfig;
use crate::execution::RunResult;

pub use ranking::{apply_diversity_filter, rank};

/// Flatten run results into one candidate list, preserving per-operation
/// order (the adapter's natural order holds until ranking re-sorts).
pub fn collect(results: &[RunResult]) -> Vec<ResultItem> {
    results
        .iter()
        .filter(|r| r.success)
        .flat_map(|r| r.items.iter().cloned())
        .collect()
}

/// Outcome of deduplication.
#[derive(Debug)]
pub struct Deduplicated {
    pub items: Vec<ResultItem>,
    pub duplicates_removed: usize,
}

/// Group by content hash and keep the best representative per group.
pub fn deduplicate(items: Vec<ResultItem>, config: &EngineConfig) -> Deduplicated {
    let mut order: Vec<ContentHash> = Vec::new();
    let mut groups: HashMap<ContentHash, Vec<ResultItem>> = HashMap::new();

    for item in items {
        if !groups.contains_key(&item.content_hash) {
            order.push(item.content_hash);
        }
        groups.entry(item.content_hash).or_default().push(item);
    }

    let mut deduplicated = Vec::with_capacity(order.len());
    let mut duplicates_removed = 0;

    for hash in order {
        let Some(group) = groups.remove(&hash) else {
            continue;
        };
        if group.len() == 1 {
            deduplicated.extend(group);
            continue;
        }

        duplicates_removed += group.len() - 1;
        let sources: Vec<Value> = group
            .iter()
            .map(|item| Value::String(item.source_store.as_str().to_string()))
            .collect();

        let mut best_index = 0;
        let mut best_key = (f64::MIN, f64::MIN);
        for (index, item) in group.iter().enumerate() {
            let key = (item.score, config.store_weight(item.source_store));
            if key.0 > best_key.0 || (key.0 == best_key.0 && key.1 > best_key.1) {
                best_key = key;
                best_index = index;
            }
        }

        let mut winner = group.into_iter().nth(best_index).unwrap_or_else(|| {
            unreachable!("duplicate group is non-empty")
        });
        winner
            .metadata
            .insert("duplicate_sources".into(), Value::Array(sources));
        deduplicated.push(winner);
    }

    Deduplicated {
        items: deduplicated,
        duplicates_removed,
    }
}
