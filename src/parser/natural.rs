// Natural-language query fallback
//
// Lightweight NLP for queries that do not match the structured grammar:
// intent and content-type recognition by keyword, temporal expression
// detection, stop-word filtered keyword extraction and store-routing hints.

use std::collections::HashSet;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::common::{QueryKind, SemanticQuery, StoreKind, TemporalFilter, TemporalKind};
use crate::error::ParseError;

/// Intent recognized in a natural-language query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Search,
    Retrieve,
    Show,
    Analyze,
    Count,
}

/// Content type classified from a natural-language query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Chat,
    Memory,
    Document,
    Relationship,
}

static INTENT_PATTERNS: Lazy<Vec<(Intent, Regex)>> = Lazy::new(|| {
    vec![
        (Intent::Search, regex(r"\b(search|look for|find|locate|query)\b")),
        (Intent::Retrieve, regex(r"\b(retrieve|get|fetch|pull|load)\b")),
        (Intent::Show, regex(r"\b(show|display|present|list|view)\b")),
        (Intent::Analyze, regex(r"\b(analyze|examine|inspect|investigate)\b")),
        (Intent::Count, regex(r"\b(count|how many|number of|total)\b")),
    ]
});

static CONTENT_PATTERNS: Lazy<Vec<(ContentType, Regex)>> = Lazy::new(|| {
    vec![
        (ContentType::Chat, regex(r"\b(chat|conversation|discussion|talk|message)\b")),
        (ContentType::Memory, regex(r"\b(memory|memories|stored|saved|recorded)\b")),
        (
            ContentType::Document,
            regex(r"\b(document|documents|file|files|code|script|config|readme)\b"),
        ),
        (
            ContentType::Relationship,
            regex(r"\b(related|connected|linked|associated|depends)\b"),
        ),
    ]
});

static TEMPORAL_PATTERNS: Lazy<Vec<(TemporalKind, Regex)>> = Lazy::new(|| {
    vec![
        (TemporalKind::Yesterday, regex(r"\byesterday\b")),
        (TemporalKind::Today, regex(r"\btoday\b")),
        (TemporalKind::LastWeek, regex(r"\b(last week|past week|previous week)\b")),
        (TemporalKind::LastMonth, regex(r"\b(last month|past month|previous month)\b")),
        (TemporalKind::Recent, regex(r"\b(recent|recently|latest|newest)\b")),
    ]
});

static FILE_EXTENSION: Lazy<Regex> = Lazy::new(|| regex(r"\.\w{2,4}\b"));
static QUOTED: Lazy<Regex> = Lazy::new(|| regex(r#""([^"]+)""#));
static TECHNICAL_TOKEN: Lazy<Regex> =
    Lazy::new(|| regex(r"\b[a-zA-Z]+(?:[_-][a-zA-Z]+)+\b|\b[a-z]+[A-Z][a-zA-Z]*\b"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| regex(r"[^\w\s-]"));

const CONTRACTIONS: [(&str, &str); 7] = [
    ("what's", "what is"),
    ("where's", "where is"),
    ("it's", "it is"),
    ("i've", "i have"),
    ("we've", "we have"),
    ("didn't", "did not"),
    ("wasn't", "was not"),
];

const STOP_WORDS: [&str; 49] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "about", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do",
    "does", "did", "will", "would", "should", "could", "may", "might", "must", "can", "shall",
    "need", "find", "show", "get", "search", "retrieve", "me", "all", "where", "we", "mentioning",
];

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

/// Structured view of a natural-language query before conversion.
#[derive(Debug, Clone)]
pub struct NaturalQuery {
    pub normalized: String,
    pub intent: Intent,
    pub content_type: Option<ContentType>,
    pub temporal: Option<TemporalFilter>,
    pub keywords: Vec<String>,
    pub store_hints: Vec<StoreKind>,
    pub confidence: f64,
}

impl NaturalQuery {
    /// Run the fallback analysis over a raw query.
    pub fn analyze(raw: &str) -> Self {
        let normalized = normalize(raw);
        let intent = extract_intent(&normalized);
        let temporal = detect_temporal(&normalized);
        let content_type = classify_content(&normalized);
        let keywords = extract_keywords(&normalized, raw);
        let store_hints = store_hints(content_type, temporal.as_ref(), &keywords);
        let confidence = confidence(intent, &keywords, temporal.as_ref(), content_type);

        Self {
            normalized,
            intent,
            content_type,
            temporal,
            keywords,
            store_hints,
            confidence,
        }
    }

    pub fn query_kind(&self) -> QueryKind {
        match self.content_type {
            Some(ContentType::Chat) => QueryKind::Chat,
            Some(ContentType::Document) => QueryKind::Document,
            _ => QueryKind::Memory,
        }
    }
}

/// Parse a natural-language query into a `SemanticQuery`.
pub(crate) fn parse_natural(trimmed: &str, original: &str) -> Result<SemanticQuery, ParseError> {
    let analysis = NaturalQuery::analyze(trimmed);
    if analysis.keywords.is_empty() {
        return Err(ParseError::NoTerms);
    }

    Ok(SemanticQuery {
        kind: analysis.query_kind(),
        topic_filters: analysis.keywords.clone(),
        search_terms: analysis.keywords,
        temporal: analysis.temporal,
        target_stores: analysis.store_hints,
        original: original.to_string(),
    })
}

fn normalize(raw: &str) -> String {
    let mut text = raw.trim().to_lowercase();
    for (contraction, expansion) in CONTRACTIONS {
        text = text.replace(contraction, expansion);
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_intent(normalized: &str) -> Intent {
    for (intent, pattern) in INTENT_PATTERNS.iter() {
        if pattern.is_match(normalized) {
            return *intent;
        }
    }
    let question_start = ["what", "where", "when", "how", "which"]
        .iter()
        .any(|w| normalized.starts_with(w));
    if question_start {
        Intent::Search
    } else {
        Intent::Retrieve
    }
}

fn detect_temporal(normalized: &str) -> Option<TemporalFilter> {
    for (kind, pattern) in TEMPORAL_PATTERNS.iter() {
        if pattern.is_match(normalized) {
            return Some(TemporalFilter::from_kind(*kind, Utc::now()));
        }
    }
    None
}

fn classify_content(normalized: &str) -> Option<ContentType> {
    for (content_type, pattern) in CONTENT_PATTERNS.iter() {
        if pattern.is_match(normalized) {
            return Some(*content_type);
        }
    }
    if FILE_EXTENSION.is_match(normalized) {
        return Some(ContentType::Document);
    }
    None
}

fn extract_keywords(normalized: &str, raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    let mut push = |token: String| {
        if !token.is_empty() && seen.insert(token.clone()) {
            keywords.push(token);
        }
    };

    for word in normalized.split_whitespace() {
        let clean = NON_WORD.replace_all(word, "").trim().to_string();
        if clean.len() >= 3 && !STOP_WORDS.contains(&clean.as_str()) {
            push(clean);
        }
    }

    // Quoted phrases and technical identifiers survive regardless of length
    // or stop-word status; pulled from the raw text so casing is preserved.
    for capture in QUOTED.captures_iter(raw) {
        push(capture[1].to_string());
    }
    for token in TECHNICAL_TOKEN.find_iter(raw) {
        push(token.as_str().to_string());
    }

    keywords
}

fn store_hints(
    content_type: Option<ContentType>,
    temporal: Option<&TemporalFilter>,
    keywords: &[String],
) -> Vec<StoreKind> {
    let mut hints = Vec::new();
    let mut add = |store: StoreKind, hints: &mut Vec<StoreKind>| {
        if !hints.contains(&store) {
            hints.push(store);
        }
    };

    match content_type {
        Some(ContentType::Chat) => add(StoreKind::Relational, &mut hints),
        Some(ContentType::Memory) => {
            add(StoreKind::Vector, &mut hints);
            add(StoreKind::Relational, &mut hints);
        }
        Some(ContentType::Document) => {
            add(StoreKind::Filesystem, &mut hints);
            add(StoreKind::Vector, &mut hints);
        }
        Some(ContentType::Relationship) => add(StoreKind::Graph, &mut hints),
        None => {}
    }

    if let Some(temporal) = temporal {
        add(StoreKind::Relational, &mut hints);
        if temporal.kind == TemporalKind::Recent {
            add(StoreKind::Kv, &mut hints);
        }
    }

    let keyword_hints: [(StoreKind, &[&str]); 4] = [
        (StoreKind::Graph, &["related", "connected", "linked", "graph", "relationship"]),
        (StoreKind::Vector, &["similar", "semantic", "embedding", "vector", "concept"]),
        (StoreKind::Kv, &["cached", "session", "temporary", "realtime"]),
        (StoreKind::Relational, &["id", "timestamp", "created", "modified", "status"]),
    ];
    for (store, patterns) in keyword_hints {
        let matched = keywords
            .iter()
            .any(|kw| patterns.iter().any(|p| kw.to_lowercase().contains(p)));
        if matched {
            add(store, &mut hints);
        }
    }

    if hints.is_empty() {
        hints = vec![StoreKind::Relational, StoreKind::Vector];
    }
    hints
}

fn confidence(
    intent: Intent,
    keywords: &[String],
    temporal: Option<&TemporalFilter>,
    content_type: Option<ContentType>,
) -> f64 {
    let mut score: f64 = 0.5;
    if matches!(intent, Intent::Search | Intent::Retrieve | Intent::Show) {
        score += 0.1;
    }
    if !keywords.is_empty() {
        score += (keywords.len() as f64 * 0.05).min(0.2);
    }
    if temporal.is_some() {
        score += 0.15;
    }
    if content_type.is_some() {
        score += 0.15;
    }
    score.min(1.0)
}
