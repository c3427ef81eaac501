// Shared data model for the federated query pipeline
//
// Enumerations, the parsed query representation, temporal filters and the
// uniform result item that every store's output is normalized into.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

// ============================================================================
// Enumerations
// ============================================================================

/// Backing stores the engine can federate across.
///
/// `Filesystem` is optional; deployments without it simply never register an
/// adapter for it and the planner skips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Relational,
    Vector,
    Graph,
    Kv,
    Filesystem,
}

impl StoreKind {
    pub const ALL: [StoreKind; 5] = [
        StoreKind::Relational,
        StoreKind::Vector,
        StoreKind::Graph,
        StoreKind::Kv,
        StoreKind::Filesystem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Relational => "relational",
            StoreKind::Vector => "vector",
            StoreKind::Graph => "graph",
            StoreKind::Kv => "kv",
            StoreKind::Filesystem => "filesystem",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relational" => Ok(StoreKind::Relational),
            "vector" => Ok(StoreKind::Vector),
            "graph" => Ok(StoreKind::Graph),
            "kv" => Ok(StoreKind::Kv),
            "filesystem" => Ok(StoreKind::Filesystem),
            other => Err(format!("unknown store kind: '{}'", other)),
        }
    }
}

/// Kinds of semantic queries the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Memory,
    Chat,
    Document,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Memory => "memory",
            QueryKind::Chat => "chat",
            QueryKind::Document => "document",
        }
    }

    pub fn parse_keyword(s: &str) -> Option<QueryKind> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Some(QueryKind::Memory),
            "chat" => Some(QueryKind::Chat),
            "document" => Some(QueryKind::Document),
            _ => None,
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations a store adapter may be asked to execute. Not every store
/// supports every kind; see `planner::operation::supports`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Retrieve,
    Search,
    VectorSearch,
    GraphQuery,
    FileSearch,
    CacheLookup,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Retrieve => "retrieve",
            OperationKind::Search => "search",
            OperationKind::VectorSearch => "vector_search",
            OperationKind::GraphQuery => "graph_query",
            OperationKind::FileSearch => "file_search",
            OperationKind::CacheLookup => "cache_lookup",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an operation participates in plan execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Parallel,
    Sequential,
}

/// Caller-facing execution strategies (see the engine's `QueryOptions`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStrategy {
    Parallel,
    Sequential,
    Hybrid,
    Selective,
    Cached,
}

impl QueryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStrategy::Parallel => "parallel",
            QueryStrategy::Sequential => "sequential",
            QueryStrategy::Hybrid => "hybrid",
            QueryStrategy::Selective => "selective",
            QueryStrategy::Cached => "cached",
        }
    }
}

impl Default for QueryStrategy {
    fn default() -> Self {
        QueryStrategy::Hybrid
    }
}

impl FromStr for QueryStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parallel" => Ok(QueryStrategy::Parallel),
            "sequential" => Ok(QueryStrategy::Sequential),
            "hybrid" => Ok(QueryStrategy::Hybrid),
            "selective" => Ok(QueryStrategy::Selective),
            "cached" => Ok(QueryStrategy::Cached),
            other => Err(format!("unknown strategy: '{}'", other)),
        }
    }
}

/// Supported temporal filter windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalKind {
    Recent,
    Today,
    Yesterday,
    LastWeek,
    LastMonth,
    Custom,
}

impl TemporalKind {
    /// Keywords accepted by the structured grammar's trailer slot.
    pub const KEYWORDS: [(&'static str, TemporalKind); 5] = [
        ("recent", TemporalKind::Recent),
        ("today", TemporalKind::Today),
        ("yesterday", TemporalKind::Yesterday),
        ("last_week", TemporalKind::LastWeek),
        ("last_month", TemporalKind::LastMonth),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalKind::Recent => "recent",
            TemporalKind::Today => "today",
            TemporalKind::Yesterday => "yesterday",
            TemporalKind::LastWeek => "last_week",
            TemporalKind::LastMonth => "last_month",
            TemporalKind::Custom => "custom",
        }
    }

    pub fn parse_keyword(token: &str) -> Option<TemporalKind> {
        let token = token.trim().to_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(kw, _)| *kw == token)
            .map(|(_, kind)| *kind)
    }
}

// ============================================================================
// Temporal filters and queries
// ============================================================================

/// A resolved temporal window, always in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalFilter {
    pub kind: TemporalKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TemporalFilter {
    /// Resolve a temporal keyword into a concrete window relative to `now`.
    pub fn from_kind(kind: TemporalKind, now: DateTime<Utc>) -> Self {
        let midnight = |ts: DateTime<Utc>| ts.date_naive().and_time(NaiveTime::MIN).and_utc();
        let (start, end) = match kind {
            TemporalKind::Recent => (now - Duration::hours(24), now),
            TemporalKind::Today => (midnight(now), now),
            TemporalKind::Yesterday => {
                let day_start = midnight(now - Duration::days(1));
                (day_start, day_start + Duration::seconds(86_399))
            }
            TemporalKind::LastWeek => (now - Duration::days(7), now),
            TemporalKind::LastMonth => (now - Duration::days(30), now),
            TemporalKind::Custom => (now, now),
        };
        Self { kind, start, end }
    }

    pub fn custom(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            kind: TemporalKind::Custom,
            start,
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// A parsed semantic query. Immutable once created by the parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticQuery {
    pub kind: QueryKind,
    pub search_terms: Vec<String>,
    pub temporal: Option<TemporalFilter>,
    pub topic_filters: Vec<String>,
    pub target_stores: Vec<StoreKind>,
    pub original: String,
}

impl SemanticQuery {
    /// All search terms joined into a single search string.
    pub fn search_text(&self) -> String {
        self.search_terms.join(" ")
    }

    /// Render the query back into the structured grammar. For any query this
    /// can express, `Parser::parse(q.format())` reproduces `q`'s kind, terms
    /// and temporal kind.
    pub fn format(&self) -> String {
        let mut out = format!("{}%{}", self.kind.as_str(), self.search_terms.join(" "));
        if let Some(temporal) = &self.temporal {
            if temporal.kind != TemporalKind::Custom {
                out.push('%');
                out.push_str(temporal.kind.as_str());
            }
        }
        out
    }

    /// The single store best suited to this query's kind, restricted to the
    /// targeted set.
    pub fn primary_store(&self) -> StoreKind {
        let preferred = match self.kind {
            QueryKind::Memory => StoreKind::Vector,
            QueryKind::Chat => StoreKind::Relational,
            QueryKind::Document => StoreKind::Filesystem,
        };
        if self.target_stores.contains(&preferred) {
            preferred
        } else {
            self.target_stores
                .first()
                .copied()
                .unwrap_or(StoreKind::Relational)
        }
    }
}

// ============================================================================
// Result items
// ============================================================================

/// Shape of a normalized result item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Document,
    File,
    Node,
    CacheEntry,
    Generic,
}

/// 16-byte MD5 fingerprint of normalized content, used for deduplication
/// and cache keys. Collision risk is accepted.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Hash of trimmed, lowercased content.
    pub fn of(content: &str) -> Self {
        let normalized = content.trim().to_lowercase();
        Self(md5::compute(normalized.as_bytes()).0)
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// A single result normalized out of a store adapter's payload. Flows from
/// the runner through aggregation; immutable after ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultItem {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    pub content: String,
    /// Store-reported relevance, or the per-kind default.
    pub score: f64,
    pub source_store: StoreKind,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub content_hash: ContentHash,
    /// Final ranking value; filled in by the ranker.
    pub composite_score: f64,
    /// 1-based position after ranking; 0 until ranked.
    pub rank_position: usize,
}

impl ResultItem {
    pub fn new(
        id: impl Into<String>,
        kind: ItemKind,
        title: impl Into<String>,
        content: impl Into<String>,
        score: f64,
        source_store: StoreKind,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let content = content.into();
        let content_hash = ContentHash::of(&content);
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            content,
            score,
            source_store,
            metadata,
            content_hash,
            composite_score: 0.0,
            rank_position: 0,
        }
    }

    /// Timestamp attached by the producing store, when present and parseable.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }
}
