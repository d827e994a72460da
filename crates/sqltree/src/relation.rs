//! Relation declarations and lazily-resolved relation values.
//!
//! Relations are declared per owner table in a [`RelationRegistry`]. A query
//! that names a relation in `with(...)` joins it eagerly; every other declared
//! relation of the primary table is attached to each result row as a
//! [`LazyRelation`] that runs its query on first access.

use crate::error::{OrmError, OrmResult};
use crate::filter::FilterNode;
use crate::node::JoinKind;
use crate::row::Row;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasOne,
    HasMany,
    BelongsTo,
}

impl RelationKind {
    /// Whether the relation resolves to at most one row.
    pub fn is_single(&self) -> bool {
        !matches!(self, RelationKind::HasMany)
    }
}

/// A declared association from an owner table to `table`.
///
/// The join condition is `{owner}.{local_key} = {table}.{foreign_key}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub name: String,
    pub table: String,
    pub kind: RelationKind,
    pub local_key: String,
    pub foreign_key: String,
    pub join_type: JoinKind,
    /// Extra ON condition. Lazy loads apply it too, so it should only
    /// reference columns of the related table.
    pub on_condition: Option<FilterNode>,
}

impl Relation {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        kind: RelationKind,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            kind,
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
            join_type: JoinKind::Left,
            on_condition: None,
        }
    }

    pub fn has_one(
        name: impl Into<String>,
        table: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, table, RelationKind::HasOne, local_key, foreign_key)
    }

    pub fn has_many(
        name: impl Into<String>,
        table: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, table, RelationKind::HasMany, local_key, foreign_key)
    }

    pub fn belongs_to(
        name: impl Into<String>,
        table: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, table, RelationKind::BelongsTo, local_key, foreign_key)
    }

    pub fn join_type(mut self, join_type: JoinKind) -> Self {
        self.join_type = join_type;
        self
    }

    pub fn on(mut self, condition: FilterNode) -> Self {
        self.on_condition = Some(condition);
        self
    }
}

/// Relations keyed by owner table, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationRegistry {
    by_table: BTreeMap<String, Vec<Relation>>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a relation on `owner`. A relation with the same name is replaced.
    pub fn register(mut self, owner: impl Into<String>, relation: Relation) -> Self {
        self.insert(owner, relation);
        self
    }

    pub fn insert(&mut self, owner: impl Into<String>, relation: Relation) {
        let relations = self.by_table.entry(owner.into()).or_default();
        match relations.iter().position(|r| r.name == relation.name) {
            Some(idx) => relations[idx] = relation,
            None => relations.push(relation),
        }
    }

    pub fn get(&self, owner: &str, name: &str) -> Option<&Relation> {
        self.by_table.get(owner)?.iter().find(|r| r.name == name)
    }

    pub fn for_table(&self, owner: &str) -> &[Relation] {
        self.by_table.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Copy every relation of `other` into this registry (later wins on name clashes).
    pub fn merge(&mut self, other: &RelationRegistry) {
        for (owner, relations) in &other.by_table {
            for relation in relations {
                self.insert(owner.clone(), relation.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_table.values().all(Vec::is_empty)
    }
}

/// Resolved value of a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationValue {
    One(Option<Row>),
    Many(Vec<Row>),
}

impl RelationValue {
    pub fn as_one(&self) -> Option<&Row> {
        match self {
            RelationValue::One(row) => row.as_ref(),
            RelationValue::Many(rows) => rows.first(),
        }
    }

    pub fn as_many(&self) -> &[Row] {
        match self {
            RelationValue::One(Some(row)) => std::slice::from_ref(row),
            RelationValue::One(None) => &[],
            RelationValue::Many(rows) => rows,
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            RelationValue::One(row) => row.into_iter().collect(),
            RelationValue::Many(rows) => rows,
        }
    }

    pub fn len(&self) -> usize {
        self.as_many().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RelationValue::One(Some(row)) => row.to_json(),
            RelationValue::One(None) => serde_json::Value::Null,
            RelationValue::Many(rows) => rows.iter().map(Row::to_json).collect(),
        }
    }
}

type Loader = Box<dyn Fn() -> OrmResult<RelationValue> + Send + Sync>;

enum LazyState {
    Unresolved(Loader),
    Resolved(RelationValue),
}

/// A relation value that is loaded on first access and memoized.
///
/// Clones share state: resolving through one clone resolves all of them.
#[derive(Clone)]
pub struct LazyRelation {
    name: String,
    state: Arc<Mutex<LazyState>>,
}

impl LazyRelation {
    pub fn new<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> OrmResult<RelationValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(LazyState::Unresolved(Box::new(loader)))),
        }
    }

    /// A relation that can never resolve; every access returns the same error.
    pub fn unresolvable(name: impl Into<String>, message: impl Into<String>) -> Self {
        let name = name.into();
        let message = message.into();
        let relation = name.clone();
        Self::new(name, move || Err(OrmError::relation(relation.clone(), message.clone())))
    }

    /// Already-resolved value (no query will run).
    pub fn resolved(name: impl Into<String>, value: RelationValue) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(LazyState::Resolved(value))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.state.lock(), LazyState::Resolved(_))
    }

    /// Resolve the relation. The loader runs at most once successfully; a
    /// failed load leaves the relation unresolved so a later call retries.
    pub fn get(&self) -> OrmResult<RelationValue> {
        let mut state = self.state.lock();
        let value = match &*state {
            LazyState::Resolved(value) => return Ok(value.clone()),
            LazyState::Unresolved(loader) => loader()?,
        };
        *state = LazyState::Resolved(value.clone());
        Ok(value)
    }
}

impl fmt::Debug for LazyRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRelation")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn registry_replaces_by_name_and_merges() {
        let mut registry = RelationRegistry::new()
            .register("users", Relation::has_many("posts", "posts", "id", "user_id"))
            .register("users", Relation::has_one("profile", "profiles", "id", "user_id"));
        assert_eq!(registry.for_table("users").len(), 2);

        let other = RelationRegistry::new().register(
            "users",
            Relation::has_many("posts", "articles", "id", "author_id").join_type(JoinKind::Inner),
        );
        registry.merge(&other);
        let posts = registry.get("users", "posts").unwrap();
        assert_eq!(posts.table, "articles");
        assert_eq!(posts.join_type, JoinKind::Inner);
        assert!(registry.get("posts", "users").is_none());
        assert!(registry.for_table("nobody").is_empty());
    }

    #[test]
    fn lazy_relation_resolves_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy = LazyRelation::new("posts", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(RelationValue::Many(vec![Row::from_pairs([("id", Value::Int(1))])]))
        });
        assert!(!lazy.is_resolved());
        let first = lazy.get().unwrap();
        let second = lazy.clone().get().unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lazy.is_resolved());
    }

    #[test]
    fn failed_load_stays_unresolved() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy = LazyRelation::new("posts", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(OrmError::backend("connection reset"))
            } else {
                Ok(RelationValue::One(None))
            }
        });
        assert!(lazy.get().is_err());
        assert!(!lazy.is_resolved());
        assert_eq!(lazy.get().unwrap(), RelationValue::One(None));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unresolvable_reports_relation_name() {
        let lazy = LazyRelation::unresolvable("author", "row has no column 'user_id'");
        let err = lazy.get().unwrap_err();
        assert!(err.is_relation_resolution());
        assert!(err.to_string().contains("author"));
    }

    #[test]
    fn relation_value_views() {
        let row = Row::from_pairs([("id", Value::Int(1))]);
        let one = RelationValue::One(Some(row.clone()));
        assert_eq!(one.as_one(), Some(&row));
        assert_eq!(one.len(), 1);
        assert!(RelationValue::One(None).is_empty());
        assert_eq!(RelationValue::Many(vec![row.clone(), row]).into_rows().len(), 2);
    }
}
