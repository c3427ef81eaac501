// Composite scoring and ranking
//
// composite = raw * store_weight * content_boost * recency_boost * term_boost
//
// Term relevance is capped at 2x; title hits weigh more than content hits.
// After sorting, the optional diversity filter caps how many items a single
// store contributes to the head of the list; overflow items are marked and
// sunk, never discarded.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::common::ResultItem;
use crate::config::EngineConfig;

/// Score and sort items in place, assigning 1-based rank positions.
pub fn rank(items: &mut [ResultItem], search_terms: &[String], config: &EngineConfig, now: DateTime<Utc>) {
    for item in items.iter_mut() {
        let weight = config.store_weight(item.source_store);
        let composite = item.score
            * weight
            * content_boost(&item.content)
            * recency_boost(item, now)
            * term_relevance_boost(item, search_terms);
        item.composite_score = (composite * 10_000.0).round() / 10_000.0;
    }

    items.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
    for (index, item) in items.iter_mut().enumerate() {
        item.rank_position = index + 1;
    }
}

fn content_boost(content: &str) -> f64 {
    let len = content.len();
    if len > 200 {
        1.2
    } else if len > 50 {
        1.1
    } else {
        1.0
    }
}

fn recency_boost(item: &ResultItem, now: DateTime<Utc>) -> f64 {
    match item.timestamp() {
        Some(ts) if now - ts < Duration::hours(24) && ts <= now => 1.05,
        _ => 1.0,
    }
}

/// `1 + 0.3 * title_hit_ratio + 0.2 * content_hit_ratio`, capped at 2.0.
fn term_relevance_boost(item: &ResultItem, search_terms: &[String]) -> f64 {
    if search_terms.is_empty() {
        return 1.0;
    }

    let title = item.title.to_lowercase();
    let content = item.content.to_lowercase();
    let total = search_terms.len() as f64;

    let title_hits = search_terms
        .iter()
        .filter(|t| title.contains(&t.to_lowercase()))
        .count() as f64;
    let content_hits = search_terms
        .iter()
        .filter(|t| content.contains(&t.to_lowercase()))
        .count() as f64;

    let boost = 1.0 + 0.3 * (title_hits / total) + 0.2 * (content_hits / total);
    boost.min(2.0)
}

/// Cap per-store items at `max_per_source`. Overflow items are marked
/// `diversity_filtered` and sunk below unmarked items, preserving relative
/// order; nothing is discarded. Rank positions are reassigned.
pub fn apply_diversity_filter(items: &mut [ResultItem], max_per_source: usize) {
    if max_per_source == 0 || items.is_empty() {
        return;
    }

    let mut counts = std::collections::HashMap::new();
    for item in items.iter_mut() {
        let count = counts.entry(item.source_store).or_insert(0usize);
        if *count >= max_per_source {
            item.metadata
                .insert("diversity_filtered".into(), Value::Bool(true));
        } else {
            *count += 1;
        }
    }

    items.sort_by_key(|item| item.metadata.contains_key("diversity_filtered"));
    for (index, item) in items.iter_mut().enumerate() {
        item.rank_position = index + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ItemKind, StoreKind};
    use serde_json::Map;

    fn item(id: &str, content: &str, score: f64, store: StoreKind) -> ResultItem {
        ResultItem::new(id, ItemKind::Document, id, content, score, store, Map::new())
    }

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn items_sort_descending_with_rank_positions() {
        let config = EngineConfig::default();
        let mut items = vec![
            item("low", "x", 0.2, StoreKind::Relational),
            item("high", "x", 0.9, StoreKind::Relational),
            item("mid", "x", 0.5, StoreKind::Relational),
        ];
        rank(&mut items, &[], &config, Utc::now());

        assert_eq!(items[0].id, "high");
        assert_eq!(items[2].id, "low");
        assert_eq!(items[0].rank_position, 1);
        assert_eq!(items[2].rank_position, 3);
        assert!(items[0].composite_score >= items[1].composite_score);
    }

    #[test]
    fn same_store_ordering_follows_raw_score() {
        let config = EngineConfig::default();
        let mut items = vec![
            item("a", "identical", 0.9, StoreKind::Vector),
            item("b", "identical", 0.3, StoreKind::Vector),
        ];
        rank(&mut items, &[], &config, Utc::now());
        assert!(items[0].composite_score >= items[1].composite_score);
        assert_eq!(items[0].id, "a");
    }

    #[test]
    fn store_weights_separate_equal_raw_scores() {
        let config = EngineConfig::default();
        let mut items = vec![
            item("kv", "same text", 0.5, StoreKind::Kv),
            item("vec", "same text", 0.5, StoreKind::Vector),
        ];
        rank(&mut items, &[], &config, Utc::now());
        assert_eq!(items[0].id, "vec");
    }

    #[test]
    fn long_content_earns_a_boost() {
        let config = EngineConfig::default();
        let long = "x".repeat(250);
        let mut items = vec![
            item("short", "tiny", 0.5, StoreKind::Relational),
            item("long", &long, 0.5, StoreKind::Relational),
        ];
        rank(&mut items, &[], &config, Utc::now());
        assert_eq!(items[0].id, "long");
    }

    #[test]
    fn recent_timestamps_earn_a_boost() {
        let config = EngineConfig::default();
        let now = Utc::now();

        let mut fresh = item("fresh", "same body", 0.5, StoreKind::Relational);
        fresh.metadata.insert(
            "timestamp".into(),
            Value::String((now - Duration::hours(2)).to_rfc3339()),
        );
        let mut stale = item("stale", "same body", 0.5, StoreKind::Relational);
        stale.metadata.insert(
            "timestamp".into(),
            Value::String((now - Duration::days(3)).to_rfc3339()),
        );

        let mut items = vec![stale, fresh];
        rank(&mut items, &[], &config, now);
        assert_eq!(items[0].id, "fresh");
    }

    #[test]
    fn title_hits_outweigh_content_hits() {
        let config = EngineConfig::default();
        let in_title = ResultItem::new(
            "title-hit",
            ItemKind::Document,
            "rollback guide",
            "unrelated body",
            0.5,
            StoreKind::Relational,
            Map::new(),
        );
        let in_content = ResultItem::new(
            "content-hit",
            ItemKind::Document,
            "unrelated title",
            "rollback body",
            0.5,
            StoreKind::Relational,
            Map::new(),
        );

        let mut items = vec![in_content, in_title];
        rank(&mut items, &terms(&["rollback"]), &config, Utc::now());
        assert_eq!(items[0].id, "title-hit");
    }

    #[test]
    fn relevance_boost_is_capped() {
        let config = EngineConfig::default();
        let mut items = vec![ResultItem::new(
            "both",
            ItemKind::Document,
            "rollback deploy",
            "rollback deploy",
            1.0,
            StoreKind::Relational,
            Map::new(),
        )];
        rank(&mut items, &terms(&["rollback", "deploy"]), &config, Utc::now());
        // weight 1.0, no content/recency boost, term boost 1.5 < cap
        assert!(items[0].composite_score <= 2.0);
    }

    #[test]
    fn diversity_filter_marks_and_sinks_overflow() {
        let config = EngineConfig::default();
        let mut items: Vec<ResultItem> = (0..4)
            .map(|i| item(&format!("rel-{}", i), &format!("content {}", i), 0.9 - i as f64 * 0.1, StoreKind::Relational))
            .collect();
        items.push(item("kv-0", "kv content", 0.1, StoreKind::Kv));
        rank(&mut items, &[], &config, Utc::now());

        apply_diversity_filter(&mut items, 2);

        assert_eq!(items.len(), 5, "nothing is discarded");
        let marked: Vec<&str> = items
            .iter()
            .filter(|i| i.metadata.contains_key("diversity_filtered"))
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(marked, vec!["rel-2", "rel-3"]);
        // Overflow sinks below the kv item despite its lower score.
        let kv_pos = items.iter().position(|i| i.id == "kv-0").unwrap();
        let rel2_pos = items.iter().position(|i| i.id == "rel-2").unwrap();
        assert!(kv_pos < rel2_pos);
        assert_eq!(items[0].rank_position, 1);
        assert_eq!(items[4].rank_position, 5);
    }

    #[test]
    fn zero_cap_disables_diversity_filter() {
        let config = EngineConfig::default();
        let mut items: Vec<ResultItem> = (0..4)
            .map(|i| item(&format!("rel-{}", i), &format!("content {}", i), 0.5, StoreKind::Relational))
            .collect();
        rank(&mut items, &[], &config, Utc::now());
        apply_diversity_filter(&mut items, 0);
        assert!(items.iter().all(|i| !i.metadata.contains_key("diversity_filtered")));
    }
}
