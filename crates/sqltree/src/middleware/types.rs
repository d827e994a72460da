use crate::error::OrmResult;
use crate::relation::RelationRegistry;
use crate::row::Row;
use crate::statement::{Statement, StatementKind};
use crate::value::Value;
use std::fmt;
use std::time::Duration;

/// Maximum length for error messages in `QueryResult::Error`.
const MAX_ERROR_LEN: usize = 512;

/// Outcome of one statement execution, reported to [`Timed`] middlewares.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Select materialized `n` rows from the backend.
    Rows(usize),
    /// Select served `n` rows from a cache provider.
    Cached(usize),
    /// Select handed to the caller as a backend cursor; the row count is not known yet.
    Streamed,
    /// Mutation affected `n` rows.
    Affected(u64),
    /// Execution failed (message truncated to 512 bytes).
    Error(String),
}

impl QueryResult {
    /// Create an error result, truncating the message to avoid log explosion.
    pub fn error(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if msg.len() > MAX_ERROR_LEN {
            Self::Error(format!("{}...", super::truncate_sql_bytes(&msg, MAX_ERROR_LEN)))
        } else {
            Self::Error(msg)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error(_))
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, QueryResult::Cached(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(n) => write!(f, "{n} rows"),
            QueryResult::Cached(n) => write!(f, "{n} rows (cached)"),
            QueryResult::Streamed => f.write_str("streamed"),
            QueryResult::Affected(n) => write!(f, "{n} affected"),
            QueryResult::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Action to take after a middleware inspects a statement.
#[derive(Debug, Clone)]
pub enum HookAction {
    /// Continue with the current statement.
    Continue,
    /// Continue with a rewritten statement of the same kind.
    Replace(Statement),
    /// Abort execution with a validation error.
    Abort(String),
}

/// A unit in the [`Pipeline`](super::Pipeline).
///
/// `invoke` sees every compiled statement before it reaches the backend.
/// Optional capabilities are exposed through the `as_*` accessors; the
/// executor only calls a capability when the accessor returns `Some`.
pub trait Middleware: Send + Sync {
    /// Short name used in log events.
    fn name(&self) -> &str {
        "middleware"
    }

    /// Inspect, rewrite or abort a statement. Called for every statement kind.
    fn invoke(&self, stmt: &Statement) -> OrmResult<HookAction> {
        let _ = stmt;
        Ok(HookAction::Continue)
    }

    fn as_cache(&self) -> Option<&dyn CacheProvider> {
        None
    }

    fn as_timed(&self) -> Option<&dyn Timed> {
        None
    }

    fn as_validator(&self) -> Option<&dyn ChangeValidator> {
        None
    }

    fn as_relations(&self) -> Option<&dyn RelationProvider> {
        None
    }
}

/// Read-through result cache for Select statements.
pub trait CacheProvider: Send + Sync {
    /// Cached rows for `stmt`, if any.
    fn fetch(&self, stmt: &Statement) -> OrmResult<Option<Vec<Row>>>;

    /// Store the rows freshly read for `stmt`.
    fn save(&self, stmt: &Statement, rows: &[Row]) -> OrmResult<()>;

    /// Drop every cached entry.
    fn invalidate(&self) -> OrmResult<()>;
}

/// Post-execution observer.
pub trait Timed: Send + Sync {
    /// Called after every execution, failures included.
    fn after_execute(&self, stmt: &Statement, elapsed: Duration, result: &QueryResult);
}

/// Pre-compilation validator for INSERT/UPDATE payloads.
pub trait ChangeValidator: Send + Sync {
    fn validate(&self, kind: StatementKind, table: &str, changes: &[(String, Value)]) -> OrmResult<()>;
}

/// Source of relation declarations merged into the executor's registry.
pub trait RelationProvider: Send + Sync {
    fn relations(&self) -> &RelationRegistry;
}
