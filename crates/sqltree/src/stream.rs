//! Lazily executed result sets.

use crate::client::RowIter;
use crate::error::OrmResult;
use crate::executor::{Executor, RowMapper};
use crate::filter::{Conjunction, FilterCondition, FilterNode, Operator};
use crate::relation::{LazyRelation, Relation, RelationValue};
use crate::row::{FromRow, Row};
use crate::statement::Statement;
use crate::tree::QueryTree;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// A compiled Select bound to an executor.
///
/// Nothing runs until the stream is consumed. Every consumer re-executes the
/// statement, so a stream can be iterated any number of times.
///
/// Each produced row goes through the row mappers in registration order, then
/// gets a [`LazyRelation`] for every relation of the primary table that was not
/// joined through `QueryTree::with`.
#[derive(Clone)]
pub struct ResultStream {
    executor: Executor,
    statement: Statement,
    primary: Option<String>,
    eager: Vec<String>,
    mappers: Vec<RowMapper>,
}

impl ResultStream {
    pub(crate) fn new(executor: Executor, statement: Statement, tree: &QueryTree) -> Self {
        let mappers = executor.mappers().to_vec();
        Self {
            executor,
            statement,
            primary: tree.primary_table().map(str::to_string),
            eager: tree.eager(),
            mappers,
        }
    }

    /// The compiled statement, before middlewares see it.
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Append a row mapper for this stream only.
    pub fn map_rows<F>(mut self, mapper: F) -> Self
    where
        F: Fn(Row) -> OrmResult<Row> + Send + Sync + 'static,
    {
        self.mappers.push(Arc::new(mapper));
        self
    }

    // ==================== Lazy consumption ====================

    /// Execute and yield rows one at a time.
    pub fn iter(&self) -> Rows<'_> {
        Rows {
            stream: self,
            state: RowsState::Pending,
        }
    }

    /// Call `f` for every row; stops at the first error.
    pub fn each<F>(&self, mut f: F) -> OrmResult<()>
    where
        F: FnMut(Row) -> OrmResult<()>,
    {
        for row in self.iter() {
            f(row?)?;
        }
        Ok(())
    }

    /// The first row; the cursor is not drained.
    pub fn first(&self) -> OrmResult<Option<Row>> {
        self.iter().next().transpose()
    }

    // ==================== Materialization ====================

    pub fn all(&self) -> OrmResult<Vec<Row>> {
        self.iter().collect()
    }

    pub fn all_as<T: FromRow>(&self) -> OrmResult<Vec<T>> {
        self.iter().map(|row| T::from_row(&row?)).collect()
    }

    pub fn last(&self) -> OrmResult<Option<Row>> {
        let mut last = None;
        for row in self.iter() {
            last = Some(row?);
        }
        Ok(last)
    }

    pub fn count(&self) -> OrmResult<usize> {
        let mut n = 0;
        for row in self.iter() {
            row?;
            n += 1;
        }
        Ok(n)
    }

    /// Partition rows by the value of `field` (missing columns group under NULL).
    pub fn group_by(&self, field: &str) -> OrmResult<GroupedRows<Value>> {
        self.group_by_key(|row| row.get(field).cloned().unwrap_or(Value::Null))
    }

    /// Partition rows by `key`. Groups keep first-seen order; rows keep source order.
    pub fn group_by_key<K, F>(&self, mut key: F) -> OrmResult<GroupedRows<K>>
    where
        K: PartialEq,
        F: FnMut(&Row) -> K,
    {
        let mut grouped = GroupedRows::new();
        for row in self.iter() {
            let row = row?;
            grouped.push(key(&row), row);
        }
        Ok(grouped)
    }

    /// All rows as a JSON array of objects (relations are not loaded).
    pub fn to_json(&self) -> OrmResult<serde_json::Value> {
        let rows = self
            .iter()
            .map(|row| row.map(|r| r.to_json()))
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(serde_json::Value::Array(rows))
    }

    // ==================== Row processing ====================

    fn process(&self, row: Row) -> OrmResult<Row> {
        let mut row = self
            .mappers
            .iter()
            .try_fold(row, |row, mapper| mapper(row))?;
        self.attach_relations(&mut row);
        Ok(row)
    }

    fn attach_relations(&self, row: &mut Row) {
        let Some(primary) = self.primary.as_deref() else {
            return;
        };
        for relation in self.executor.relations().for_table(primary) {
            if self.eager.iter().any(|name| *name == relation.name) {
                continue;
            }
            row.attach_relation(self.lazy_relation(relation, row.get(&relation.local_key)));
        }
    }

    fn lazy_relation(&self, relation: &Relation, local: Option<&Value>) -> LazyRelation {
        let Some(local) = local else {
            return LazyRelation::unresolvable(
                &relation.name,
                format!("row has no '{}' column", relation.local_key),
            );
        };
        if local.is_null() {
            let empty = if relation.kind.is_single() {
                RelationValue::One(None)
            } else {
                RelationValue::Many(Vec::new())
            };
            return LazyRelation::resolved(&relation.name, empty);
        }

        let executor = self.executor.clone();
        let relation = relation.clone();
        let local = local.clone();
        let name = relation.name.clone();
        LazyRelation::new(name, move || load_relation(&executor, &relation, &local))
    }
}

fn load_relation(executor: &Executor, relation: &Relation, local: &Value) -> OrmResult<RelationValue> {
    let key = FilterCondition::new(relation.foreign_key.as_str(), Operator::Eq, local.clone())?;
    let mut tree = executor
        .table(relation.table.as_str())
        .filter_node(FilterNode::condition(key));
    if let Some(on) = &relation.on_condition {
        tree = tree.filter_node(on.clone().with_conjunction(Conjunction::And));
    }
    tracing::debug!(
        target: "sqltree.sql",
        relation = relation.name.as_str(),
        table = relation.table.as_str(),
        "loading lazy relation"
    );
    if relation.kind.is_single() {
        Ok(RelationValue::One(executor.fetch_one(&tree)?))
    } else {
        Ok(RelationValue::Many(executor.fetch_all(&tree)?))
    }
}

impl fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream")
            .field("statement", &self.statement)
            .field("primary", &self.primary)
            .field("eager", &self.eager)
            .field("mappers", &self.mappers.len())
            .finish()
    }
}

impl<'s> IntoIterator for &'s ResultStream {
    type Item = OrmResult<Row>;
    type IntoIter = Rows<'s>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ==================== Rows ====================

/// Iterator returned by [`ResultStream::iter`]. Executes on the first `next()`.
pub struct Rows<'s> {
    stream: &'s ResultStream,
    state: RowsState<'s>,
}

enum RowsState<'s> {
    Pending,
    Running(RowIter<'s>),
    Done,
}

impl Iterator for Rows<'_> {
    type Item = OrmResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if let RowsState::Pending = self.state {
            match self.stream.executor.run_select(&self.stream.statement) {
                Ok(rows) => self.state = RowsState::Running(rows),
                Err(err) => {
                    self.state = RowsState::Done;
                    return Some(Err(err));
                }
            }
        }
        let RowsState::Running(rows) = &mut self.state else {
            return None;
        };
        match rows.next() {
            Some(Ok(row)) => Some(self.stream.process(row)),
            Some(Err(err)) => Some(Err(err)),
            None => {
                self.state = RowsState::Done;
                None
            }
        }
    }
}

impl fmt::Debug for Rows<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            RowsState::Pending => "pending",
            RowsState::Running(_) => "running",
            RowsState::Done => "done",
        };
        f.debug_struct("Rows").field("state", &state).finish()
    }
}

// ==================== GroupedRows ====================

/// Rows partitioned by key, in first-seen key order.
#[derive(Debug, Clone)]
pub struct GroupedRows<K> {
    groups: Vec<(K, Vec<Row>)>,
}

impl<K: PartialEq> GroupedRows<K> {
    fn new() -> Self {
        Self { groups: Vec::new() }
    }

    fn push(&mut self, key: K, row: Row) {
        match self.groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, rows)) => rows.push(row),
            None => self.groups.push((key, vec![row])),
        }
    }

    pub fn get(&self, key: &K) -> Option<&[Row]> {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, rows)| rows.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.groups.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &[Row])> {
        self.groups.iter().map(|(k, rows)| (k, rows.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn into_inner(self) -> Vec<(K, Vec<Row>)> {
        self.groups
    }
}

impl<K> IntoIterator for GroupedRows<K> {
    type Item = (K, Vec<Row>);
    type IntoIter = std::vec::IntoIter<(K, Vec<Row>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}
