//! Runs compiled statements through the middleware pipeline and the backend.

use crate::client::{Connection, RowIter};
use crate::config::ExecutorConfig;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::middleware::{CacheMiddleware, Middleware, Pipeline, QueryResult};
use crate::relation::RelationRegistry;
use crate::row::Row;
use crate::statement::{Statement, StatementKind};
use crate::stream::ResultStream;
use crate::tree::QueryTree;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Row transform applied to every produced row, before relations are attached.
pub type RowMapper = Arc<dyn Fn(Row) -> OrmResult<Row> + Send + Sync>;

/// Executes query trees against a [`Connection`].
///
/// Cloning is cheap: the connection, middlewares and relation registry are shared.
///
/// ```ignore
/// let executor = Executor::new(SqliteConnection::open_in_memory()?)
///     .with_middleware(LoggingMiddleware::new())
///     .with_relations(registry);
///
/// let users = executor.table("users").filter(filters! { "active" => true })?;
/// for row in executor.select(&users)?.iter() {
///     let row = row?;
///     let posts = row.relation("posts")?;
/// }
/// ```
#[derive(Clone)]
pub struct Executor {
    conn: Arc<dyn Connection>,
    pipeline: Pipeline,
    config: ExecutorConfig,
    relations: Arc<RelationRegistry>,
    mappers: Vec<RowMapper>,
}

impl Executor {
    pub fn new<C: Connection + 'static>(conn: C) -> Self {
        Self::from_arc(Arc::new(conn))
    }

    pub fn from_arc(conn: Arc<dyn Connection>) -> Self {
        Self {
            conn,
            pipeline: Pipeline::new(),
            config: ExecutorConfig::default(),
            relations: Arc::new(RelationRegistry::new()),
            mappers: Vec::new(),
        }
    }

    // ==================== Composition ====================

    /// Replace the configuration. A `cache` section installs an in-memory
    /// [`CacheMiddleware`] unless the pipeline already has a cache.
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        let cache = config.cache.clone();
        self.config = config;
        match cache {
            Some(cache) if !self.pipeline.has_cache() => {
                self.with_middleware(CacheMiddleware::in_memory(&cache))
            }
            _ => self,
        }
    }

    /// Append a middleware. Its relation declarations, if any, are merged now.
    pub fn with_middleware<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.with_middleware_arc(Arc::new(middleware))
    }

    pub fn with_middleware_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        if let Some(provider) = middleware.as_relations() {
            Arc::make_mut(&mut self.relations).merge(provider.relations());
        }
        self.pipeline = self.pipeline.add_arc(middleware);
        self
    }

    /// Merge relation declarations into the executor's registry.
    pub fn with_relations(mut self, registry: RelationRegistry) -> Self {
        Arc::make_mut(&mut self.relations).merge(&registry);
        self
    }

    /// Append a row mapper; mappers run in registration order.
    pub fn with_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(Row) -> OrmResult<Row> + Send + Sync + 'static,
    {
        self.mappers.push(Arc::new(mapper));
        self
    }

    // ==================== Accessors ====================

    /// Configured dialect, falling back to the connection's.
    pub fn dialect(&self) -> Dialect {
        self.config.dialect.unwrap_or_else(|| self.conn.dialect())
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn relations(&self) -> &Arc<RelationRegistry> {
        &self.relations
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    pub(crate) fn mappers(&self) -> &[RowMapper] {
        &self.mappers
    }

    pub fn last_insert_id(&self) -> Option<i64> {
        self.conn.last_insert_id()
    }

    /// A query tree on `table` carrying this executor's dialect and relations.
    pub fn table(&self, table: impl Into<String>) -> QueryTree {
        QueryTree::table(table)
            .with_dialect(self.dialect())
            .with_relations(self.relations.clone())
    }

    // The executor's dialect always wins; a tree without relations inherits ours.
    fn prepare(&self, tree: &QueryTree) -> QueryTree {
        let tree = tree.with_dialect(self.dialect());
        match tree.relations() {
            Some(_) => tree,
            None => tree.with_relations(self.relations.clone()),
        }
    }

    // ==================== SELECT ====================

    /// Compile `tree` into a lazily executed [`ResultStream`].
    pub fn select(&self, tree: &QueryTree) -> OrmResult<ResultStream> {
        let tree = self.prepare(tree);
        let stmt = tree.build_select()?;
        Ok(ResultStream::new(self.clone(), stmt, &tree))
    }

    pub fn fetch_all(&self, tree: &QueryTree) -> OrmResult<Vec<Row>> {
        self.select(tree)?.all()
    }

    /// First row of `tree` with its limit forced to 1.
    pub fn fetch_one(&self, tree: &QueryTree) -> OrmResult<Option<Row>> {
        self.select(&tree.limit(1))?.first()
    }

    /// Run an already compiled Select through the pipeline and return its raw rows.
    ///
    /// Mappers and relations are not applied.
    pub fn fetch_statement(&self, stmt: Statement) -> OrmResult<Vec<Row>> {
        self.run_select(&stmt)?.collect()
    }

    /// Execute a Select: pipeline, then cache providers, then the backend.
    ///
    /// With a cache in the pipeline the rows are materialized so they can be
    /// saved; otherwise the backend cursor is returned as-is.
    pub(crate) fn run_select(&self, stmt: &Statement) -> OrmResult<RowIter<'_>> {
        let stmt = self.pipeline.invoke(stmt.clone())?;
        if self.config.strict_placeholders {
            stmt.check_placeholders()?;
        }

        let start = Instant::now();
        if let Some(rows) = self.pipeline.fetch(&stmt)? {
            tracing::debug!(
                target: "sqltree.sql",
                rows = rows.len(),
                sql = %stmt.text(),
                "served from cache"
            );
            self.pipeline
                .after_execute(&stmt, start.elapsed(), &QueryResult::Cached(rows.len()));
            return Ok(Box::new(rows.into_iter().map(Ok)));
        }

        self.log_statement(&stmt);
        if self.pipeline.has_cache() {
            let rows = self.observe(&stmt, start, self.conn.query(stmt.text(), stmt.values()), |rows| {
                QueryResult::Rows(rows.len())
            })?;
            self.pipeline.save(&stmt, &rows)?;
            Ok(Box::new(rows.into_iter().map(Ok)))
        } else {
            self.observe(&stmt, start, self.conn.query_iter(stmt.text(), stmt.values()), |_| {
                QueryResult::Streamed
            })
        }
    }

    // ==================== Mutations ====================

    /// INSERT `changes` (merged over the tree's change slot) into the primary table.
    ///
    /// Validators run before the statement is compiled.
    pub fn insert<I, K, V>(&self, tree: &QueryTree, changes: I) -> OrmResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.mutate(StatementKind::Insert, tree, changes)
    }

    /// UPDATE the rows matched by `tree` with `changes`.
    pub fn update<I, K, V>(&self, tree: &QueryTree, changes: I) -> OrmResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.mutate(StatementKind::Update, tree, changes)
    }

    pub fn delete(&self, tree: &QueryTree) -> OrmResult<u64> {
        let stmt = self.prepare(tree).build_delete()?;
        self.execute_statement(stmt)
    }

    fn mutate<I, K, V>(&self, kind: StatementKind, tree: &QueryTree, changes: I) -> OrmResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let changes: Vec<(String, Value)> = changes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let merged = changes
            .iter()
            .cloned()
            .fold(tree.change_node().clone(), |node, (k, v)| node.set(k, v));
        let table = tree
            .primary_table()
            .ok_or_else(|| OrmError::structural(format!("{kind} requires a table")))?;
        self.pipeline.validate(kind, table, merged.changes())?;

        let tree = self.prepare(tree);
        let stmt = match kind {
            StatementKind::Insert => tree.build_insert(changes)?,
            _ => tree.build_update(changes)?,
        };
        self.execute_statement(stmt)
    }

    /// Run a compiled statement through the pipeline and the backend's `execute`.
    pub fn execute_statement(&self, stmt: Statement) -> OrmResult<u64> {
        let stmt = self.pipeline.invoke(stmt)?;
        if self.config.strict_placeholders {
            stmt.check_placeholders()?;
        }
        self.log_statement(&stmt);
        let start = Instant::now();
        let result = self.conn.execute(stmt.text(), stmt.values());
        self.observe(&stmt, start, result, |n| QueryResult::Affected(*n))
    }

    // ==================== Transactions ====================

    pub fn begin(&self) -> OrmResult<()> {
        tracing::debug!(target: "sqltree.sql", "BEGIN");
        self.conn.begin()
    }

    pub fn commit(&self) -> OrmResult<()> {
        tracing::debug!(target: "sqltree.sql", "COMMIT");
        self.conn.commit()
    }

    pub fn rollback(&self) -> OrmResult<()> {
        tracing::debug!(target: "sqltree.sql", "ROLLBACK");
        self.conn.rollback()
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// A failed rollback is logged; the error from `f` is returned.
    pub fn transaction<T, F>(&self, f: F) -> OrmResult<T>
    where
        F: FnOnce(&Executor) -> OrmResult<T>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback() {
                    tracing::warn!(
                        target: "sqltree.sql",
                        error = %rollback_err,
                        "rollback failed"
                    );
                }
                Err(err)
            }
        }
    }

    // ==================== Internals ====================

    fn log_statement(&self, stmt: &Statement) {
        tracing::debug!(
            target: "sqltree.sql",
            kind = %stmt.kind(),
            param_count = stmt.value_count(),
            sql = %stmt.text(),
            "execute"
        );
    }

    /// Report the outcome to timed middlewares and pass it through unchanged.
    fn observe<T>(
        &self,
        stmt: &Statement,
        start: Instant,
        result: OrmResult<T>,
        describe: impl FnOnce(&T) -> QueryResult,
    ) -> OrmResult<T> {
        let outcome = match &result {
            Ok(value) => describe(value),
            Err(err) => QueryResult::error(err.to_string()),
        };
        self.pipeline.after_execute(stmt, start.elapsed(), &outcome);
        result
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("dialect", &self.dialect())
            .field("pipeline", &self.pipeline)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
