// Error taxonomy for the query pipeline
//
// Every fallible boundary returns a typed error; panics are reserved for
// invariant violations. Per-operation failures are carried as `OpError`
// values in response metadata rather than aborting sibling operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::{OperationKind, StoreKind};

pub type Result<T> = std::result::Result<T, QueryError>;

/// Top-level error type returned by the engine façade.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Operation(#[from] OpError),

    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Terminal parse failures, returned to the caller verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("query cannot be empty")]
    Empty,

    #[error("unknown query kind: '{0}'")]
    UnknownKind(String),

    #[error("no search terms found in query")]
    NoTerms,
}

/// Planning failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("no stores available for query")]
    NoStores,
}

/// Classification of a single operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpErrorKind {
    Timeout,
    Connection,
    Unavailable,
    Permission,
    ResourceExhausted,
    Syntax,
    Other,
}

impl OpErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpErrorKind::Timeout => "timeout",
            OpErrorKind::Connection => "connection",
            OpErrorKind::Unavailable => "unavailable",
            OpErrorKind::Permission => "permission",
            OpErrorKind::ResourceExhausted => "resource_exhausted",
            OpErrorKind::Syntax => "syntax",
            OpErrorKind::Other => "other",
        }
    }
}

/// A single operation's failure. Accumulated in response metadata and fed
/// to the recovery layer; never raised across the runner boundary.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{store} {op} failed ({}): {message}", .kind.as_str())]
pub struct OpError {
    pub store: StoreKind,
    pub op: OperationKind,
    pub kind: OpErrorKind,
    pub message: String,
}

impl OpError {
    pub fn new(
        store: StoreKind,
        op: OperationKind,
        kind: OpErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            store,
            op,
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(store: StoreKind, op: OperationKind, timeout_ms: u64) -> Self {
        Self::new(
            store,
            op,
            OpErrorKind::Timeout,
            format!("operation timed out after {}ms", timeout_ms),
        )
    }
}

/// Summary of a plan execution outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    #[error("{failed} of {total} operations failed")]
    Partial { failed: usize, total: usize },

    #[error("all operations failed")]
    Total,
}

/// Store-specific failures raised by adapters. The runner wraps these into
/// `OpError` with the operation context attached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("query syntax error: {0}")]
    Syntax(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn kind(&self) -> OpErrorKind {
        match self {
            StoreError::Connection(_) => OpErrorKind::Connection,
            StoreError::Unavailable(_) => OpErrorKind::Unavailable,
            StoreError::Permission(_) => OpErrorKind::Permission,
            StoreError::ResourceExhausted(_) => OpErrorKind::ResourceExhausted,
            StoreError::Syntax(_) => OpErrorKind::Syntax,
            StoreError::Other(_) => OpErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_error_display_includes_context() {
        let err = OpError::timeout(StoreKind::Vector, OperationKind::VectorSearch, 250);
        let rendered = err.to_string();
        assert!(rendered.contains("vector"));
        assert!(rendered.contains("timed out after 250ms"));
    }

    #[test]
    fn store_error_maps_to_op_error_kind() {
        assert_eq!(
            StoreError::Connection("refused".into()).kind(),
            OpErrorKind::Connection
        );
        assert_eq!(
            StoreError::Syntax("bad pattern".into()).kind(),
            OpErrorKind::Syntax
        );
    }
}
