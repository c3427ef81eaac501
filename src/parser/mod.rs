// # Semantic Query Parser
//
// Turns a raw query string into a `SemanticQuery`. Two grammars are
// accepted:
//
// - Structured: `kind%part[%part]*` where `kind` is one of
//   memory/chat/document, parts are whitespace- or comma-separated token
//   lists, and the trailing part may carry a temporal keyword
//   (recent/today/yesterday/last_week/last_month).
// - Natural language: anything without a `%` separator goes through the
//   lightweight NLP fallback in `natural`.
//
// Unrecognized tokens and ambiguous temporals degrade silently; only empty
// input, an unknown kind and a term-less query are hard errors.

pub mod natural;

use std::collections::HashSet;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::common::{QueryKind, SemanticQuery, StoreKind, TemporalFilter, TemporalKind};
use crate::error::ParseError;

/// Keyword patterns that pull the graph store into a query's target set.
static RELATIONSHIP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(related|connected|linked|depends|references)\b").expect("valid regex")
});

/// Keyword patterns that imply content search for document queries.
static CONTENT_SEARCH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(readme|documentation|config|test|example)\b").expect("valid regex")
});

/// Concept vocabulary used for store routing and topic-filter extraction.
const SEMANTIC_CONCEPTS: [&str; 16] = [
    "architecture",
    "implementation",
    "design",
    "pattern",
    "algorithm",
    "database",
    "vector",
    "embedding",
    "graph",
    "index",
    "cache",
    "schema",
    "workflow",
    "coordination",
    "session",
    "state",
];

/// Parser for structured and natural-language queries.
#[derive(Debug, Default, Clone)]
pub struct QueryParser;

impl QueryParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw query string into a `SemanticQuery`.
    pub fn parse(&self, raw: &str) -> Result<SemanticQuery, ParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }
        if trimmed.contains('%') {
            self.parse_structured(trimmed, raw)
        } else {
            natural::parse_natural(trimmed, raw)
        }
    }

    fn parse_structured(&self, trimmed: &str, original: &str) -> Result<SemanticQuery, ParseError> {
        let parts: Vec<&str> = trimmed
            .split('%')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let head = parts
            .first()
            .ok_or_else(|| ParseError::UnknownKind(String::new()))?;
        let kind =
            QueryKind::parse_keyword(head).ok_or_else(|| ParseError::UnknownKind(head.to_string()))?;

        let body = &parts[1..];
        if body.is_empty() {
            return Err(ParseError::NoTerms);
        }

        // Temporal keywords collapse into the filter only from the trailer
        // slot; the same token in a middle part stays an ordinary term.
        let trailer_index = body.len() - 1;
        let mut temporal_kind: Option<TemporalKind> = None;
        let mut terms: Vec<String> = Vec::new();

        for (index, part) in body.iter().enumerate() {
            for token in tokenize(part) {
                if index == trailer_index {
                    if let Some(tk) = TemporalKind::parse_keyword(&token) {
                        if temporal_kind.is_none() {
                            temporal_kind = Some(tk);
                        }
                        continue;
                    }
                }
                terms.push(token);
            }
        }

        let search_terms = dedup_preserving_order(terms);
        if search_terms.is_empty() {
            return Err(ParseError::NoTerms);
        }

        let temporal = temporal_kind.map(|tk| TemporalFilter::from_kind(tk, Utc::now()));
        let topic_filters = extract_topic_filters(body, trailer_index, temporal_kind.is_some());
        let target_stores = route_stores(kind, &search_terms);

        Ok(SemanticQuery {
            kind,
            search_terms,
            temporal,
            topic_filters,
            target_stores,
            original: original.to_string(),
        })
    }
}

fn tokenize(part: &str) -> Vec<String> {
    part.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedup_preserving_order(terms: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Body parts that read as whole-phrase topics rather than bare search
/// terms. Concept vocabulary words are already carried as terms.
fn extract_topic_filters(body: &[&str], trailer_index: usize, trailer_is_temporal: bool) -> Vec<String> {
    let mut filters = Vec::new();
    for (index, part) in body.iter().enumerate() {
        if trailer_is_temporal && index == trailer_index {
            continue;
        }
        let clean = part.trim().to_lowercase();
        if clean.len() <= 2 {
            continue;
        }
        if TemporalKind::parse_keyword(&clean).is_some() {
            continue;
        }
        if SEMANTIC_CONCEPTS.iter().any(|c| clean.contains(c)) {
            continue;
        }
        if !filters.contains(&clean) {
            filters.push(clean);
        }
    }
    filters
}

/// Propose target stores from the query kind and term patterns. The planner
/// may still add, drop or reorder.
fn route_stores(kind: QueryKind, terms: &[String]) -> Vec<StoreKind> {
    let text = terms.join(" ").to_lowercase();
    match kind {
        QueryKind::Memory => {
            let mut stores = vec![StoreKind::Vector, StoreKind::Relational];
            if RELATIONSHIP_PATTERN.is_match(&text) {
                stores.push(StoreKind::Graph);
            }
            stores
        }
        QueryKind::Chat => vec![StoreKind::Relational],
        QueryKind::Document => {
            let mut stores = vec![StoreKind::Filesystem];
            if CONTENT_SEARCH_PATTERN.is_match(&text)
                || SEMANTIC_CONCEPTS.iter().any(|c| text.contains(c))
            {
                stores.push(StoreKind::Vector);
            }
            stores
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<SemanticQuery, ParseError> {
        QueryParser::new().parse(raw)
    }

    #[test]
    fn parses_structured_query_with_temporal_trailer() {
        let q = parse("memory%architecture%recent").unwrap();
        assert_eq!(q.kind, QueryKind::Memory);
        assert_eq!(q.search_terms, vec!["architecture"]);
        assert_eq!(q.temporal.unwrap().kind, TemporalKind::Recent);
        assert_eq!(
            q.target_stores,
            vec![StoreKind::Vector, StoreKind::Relational]
        );
    }

    #[test]
    fn splits_terms_on_whitespace_and_commas() {
        let q = parse("chat%deployment rollback,incident%yesterday").unwrap();
        assert_eq!(q.search_terms, vec!["deployment", "rollback", "incident"]);
        assert_eq!(q.temporal.unwrap().kind, TemporalKind::Yesterday);
        assert_eq!(q.target_stores, vec![StoreKind::Relational]);
    }

    #[test]
    fn kind_is_case_insensitive() {
        let q = parse("MEMORY%architecture").unwrap();
        assert_eq!(q.kind, QueryKind::Memory);
    }

    #[test]
    fn empty_query_is_rejected() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert_eq!(
            parse("timeline%architecture"),
            Err(ParseError::UnknownKind("timeline".into()))
        );
    }

    #[test]
    fn temporal_only_query_has_no_terms() {
        assert_eq!(parse("memory%recent"), Err(ParseError::NoTerms));
        assert_eq!(parse("memory%"), Err(ParseError::NoTerms));
    }

    #[test]
    fn duplicate_terms_are_removed_preserving_order() {
        let q = parse("memory%alpha beta alpha%beta gamma").unwrap();
        assert_eq!(q.search_terms, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn temporal_token_in_middle_part_stays_a_term() {
        let q = parse("memory%recent architecture%alpha").unwrap();
        assert!(q.search_terms.contains(&"recent".to_string()));
        assert!(q.temporal.is_none());
    }

    #[test]
    fn relationship_terms_pull_in_the_graph_store() {
        let q = parse("memory%related architecture").unwrap();
        assert!(q.target_stores.contains(&StoreKind::Graph));
    }

    #[test]
    fn document_queries_prefer_filesystem() {
        let q = parse("document%*.md readme").unwrap();
        assert_eq!(q.target_stores[0], StoreKind::Filesystem);
        assert!(q.target_stores.contains(&StoreKind::Vector));
        assert_eq!(q.search_terms, vec!["*.md", "readme"]);
    }

    #[test]
    fn structured_round_trip_preserves_kind_terms_and_temporal() {
        for raw in [
            "memory%architecture%recent",
            "chat%deployment rollback%yesterday",
            "document%readme notes",
            "memory%alpha beta gamma%last_week",
        ] {
            let first = parse(raw).unwrap();
            let second = parse(&first.format()).unwrap();
            assert_eq!(first.kind, second.kind);
            assert_eq!(first.search_terms, second.search_terms);
            assert_eq!(
                first.temporal.map(|t| t.kind),
                second.temporal.map(|t| t.kind)
            );
            assert_eq!(first.target_stores, second.target_stores);
        }
    }

    #[test]
    fn no_temporal_keywords_survive_in_terms_of_grammar_queries() {
        let q = parse("memory%architecture design%last_month").unwrap();
        for term in &q.search_terms {
            assert!(TemporalKind::parse_keyword(term).is_none());
        }
    }
}
