use super::truncate_sql_bytes;
use super::types::{HookAction, Middleware, QueryResult, Timed};
use crate::config::ExecutorConfig;
use crate::error::OrmResult;
use crate::statement::Statement;
use std::time::Duration;

/// Emits a `tracing` event before and after every statement.
///
/// Before execution: `debug` with the (truncated) SQL. After execution:
/// `info` on success, `warn` on failure, plus a `warn` for statements slower
/// than the configured threshold.
#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    /// Truncate long SQL strings (in bytes, at a char boundary). `None` disables truncation.
    pub max_sql_length: Option<usize>,
    /// Statements at or above this duration are reported as slow.
    pub slow_threshold: Option<Duration>,
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self {
            max_sql_length: Some(200),
            slow_threshold: None,
        }
    }
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            max_sql_length: config.max_sql_log_length,
            slow_threshold: config.slow_query_threshold(),
        }
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    pub(crate) fn is_slow(&self, elapsed: Duration) -> bool {
        self.slow_threshold.is_some_and(|t| elapsed >= t)
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    fn invoke(&self, stmt: &Statement) -> OrmResult<HookAction> {
        tracing::debug!(
            target: "sqltree.sql",
            kind = %stmt.kind(),
            param_count = stmt.value_count(),
            sql = %self.truncate_sql(stmt.text()),
            "executing statement"
        );
        Ok(HookAction::Continue)
    }

    fn as_timed(&self) -> Option<&dyn Timed> {
        Some(self)
    }
}

impl Timed for LoggingMiddleware {
    fn after_execute(&self, stmt: &Statement, elapsed: Duration, result: &QueryResult) {
        let sql = self.truncate_sql(stmt.text());
        if result.is_error() {
            tracing::warn!(
                target: "sqltree.sql",
                kind = %stmt.kind(),
                elapsed = ?elapsed,
                outcome = %result,
                sql = %sql,
                "statement failed"
            );
        } else {
            tracing::info!(
                target: "sqltree.sql",
                kind = %stmt.kind(),
                elapsed = ?elapsed,
                outcome = %result,
                sql = %sql,
                "statement finished"
            );
        }
        if self.is_slow(elapsed) {
            tracing::warn!(
                target: "sqltree.sql",
                kind = %stmt.kind(),
                elapsed = ?elapsed,
                sql = %sql,
                "slow query"
            );
        }
    }
}
