use super::types::{
    CacheProvider, ChangeValidator, HookAction, Middleware, QueryResult, RelationProvider, Timed,
};
use crate::error::{OrmError, OrmResult};
use crate::relation::RelationRegistry;
use crate::row::Row;
use crate::statement::{Statement, StatementKind};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Ordered list of middlewares; every stage runs in registration order.
#[derive(Clone, Default)]
pub struct Pipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware.
    #[allow(clippy::should_implement_trait)]
    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Add an Arc-wrapped middleware (e.g. to keep a handle on a stats collector).
    pub fn add_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run `invoke` on every middleware, threading replacements through.
    ///
    /// A replacement must keep the statement kind. An abort stops the chain.
    pub fn invoke(&self, stmt: Statement) -> OrmResult<Statement> {
        let mut current = stmt;
        for middleware in &self.middlewares {
            match middleware.invoke(&current)? {
                HookAction::Continue => {}
                HookAction::Replace(next) => {
                    if next.kind() != current.kind() {
                        return Err(OrmError::structural(format!(
                            "middleware '{}' replaced a {} statement with a {}",
                            middleware.name(),
                            current.kind(),
                            next.kind()
                        )));
                    }
                    current = next;
                }
                HookAction::Abort(reason) => {
                    tracing::debug!(
                        target: "sqltree.sql",
                        middleware = middleware.name(),
                        reason = %reason,
                        "statement aborted"
                    );
                    return Err(OrmError::validation(format!("Query aborted by hook: {reason}")));
                }
            }
        }
        Ok(current)
    }

    pub fn has_cache(&self) -> bool {
        self.caches().next().is_some()
    }

    /// Rows from the first cache provider that has `stmt`.
    pub fn fetch(&self, stmt: &Statement) -> OrmResult<Option<Vec<Row>>> {
        for cache in self.caches() {
            if let Some(rows) = cache.fetch(stmt)? {
                return Ok(Some(rows));
            }
        }
        Ok(None)
    }

    /// Hand freshly read rows to every cache provider.
    pub fn save(&self, stmt: &Statement, rows: &[Row]) -> OrmResult<()> {
        for cache in self.caches() {
            cache.save(stmt, rows)?;
        }
        Ok(())
    }

    pub fn invalidate(&self) -> OrmResult<()> {
        for cache in self.caches() {
            cache.invalidate()?;
        }
        Ok(())
    }

    pub fn after_execute(&self, stmt: &Statement, elapsed: Duration, result: &QueryResult) {
        for timed in self.timed() {
            timed.after_execute(stmt, elapsed, result);
        }
    }

    /// Run every validator; the first failure wins.
    pub fn validate(&self, kind: StatementKind, table: &str, changes: &[(String, Value)]) -> OrmResult<()> {
        for validator in self.validators() {
            validator.validate(kind, table, changes)?;
        }
        Ok(())
    }

    /// Union of all relation providers' registries, later providers overriding earlier ones.
    pub fn relations(&self) -> RelationRegistry {
        let mut merged = RelationRegistry::new();
        for provider in self.relation_providers() {
            merged.merge(provider.relations());
        }
        merged
    }

    fn caches(&self) -> impl Iterator<Item = &dyn CacheProvider> {
        self.middlewares.iter().filter_map(|m| m.as_cache())
    }

    fn validators(&self) -> impl Iterator<Item = &dyn ChangeValidator> {
        self.middlewares.iter().filter_map(|m| m.as_validator())
    }

    fn relation_providers(&self) -> impl Iterator<Item = &dyn RelationProvider> {
        self.middlewares.iter().filter_map(|m| m.as_relations())
    }

    fn timed(&self) -> impl Iterator<Item = &dyn Timed> {
        self.middlewares.iter().filter_map(|m| m.as_timed())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.middlewares.iter().map(|m| m.name()))
            .finish()
    }
}
