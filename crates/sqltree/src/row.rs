//! Result rows and row mapping traits

use crate::error::{OrmError, OrmResult};
use crate::relation::{LazyRelation, RelationValue};
use crate::value::{FromValue, Value};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// One result row: ordered `(column, value)` pairs plus any lazy relations
/// attached by the result stream.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
    relations: BTreeMap<String, LazyRelation>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            columns: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            relations: BTreeMap::new(),
        }
    }

    /// Append a column. Does not check for duplicates; use [`Row::set`] for upserts.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((column.into(), value.into()));
    }

    /// Set a column, replacing an existing value of the same name.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Remove a column, returning its value.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let idx = self.columns.iter().position(|(name, _)| name == column)?;
        Some(self.columns.remove(idx).1)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Typed column access, returning `OrmError::Decode` when the column is
    /// missing or has the wrong type.
    pub fn try_get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        match self.get(column) {
            Some(value) => T::from_value(value, column),
            None => Err(OrmError::decode(column, "column not found")),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, v)| (name.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub(crate) fn attach_relation(&mut self, relation: LazyRelation) {
        self.relations.insert(relation.name().to_string(), relation);
    }

    /// Names of the lazy relations attached to this row.
    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Whether a lazy relation with this name is attached.
    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Resolve a lazy relation. The first access runs the deferred query;
    /// later accesses return the memoized value.
    pub fn relation(&self, name: &str) -> OrmResult<RelationValue> {
        match self.relations.get(name) {
            Some(lazy) => lazy.get(),
            None => Err(OrmError::relation(name, "relation is not attached to this row")),
        }
    }

    /// Plain JSON object of the columns (relations are not included).
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .map(|(name, v)| (name.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }

    /// Deserialize the row's columns into any serde type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> OrmResult<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.columns
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row::from_pairs(iter)
    }
}

/// Trait for types that can be constructed from a result [`Row`].
pub trait FromRow: Sized {
    /// Convert a result row into Self
    fn from_row(row: &Row) -> OrmResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row.clone())
    }
}

impl FromRow for serde_json::Value {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
        email: Option<String>,
    }

    fn sample() -> Row {
        Row::from_pairs([
            ("id", Value::Int(7)),
            ("name", Value::from("Ada")),
            ("email", Value::Null),
        ])
    }

    #[test]
    fn typed_access() {
        let row = sample();
        assert_eq!(row.try_get::<i64>("id").unwrap(), 7);
        assert_eq!(row.try_get::<Option<String>>("email").unwrap(), None);
        assert!(row.try_get::<i64>("missing").is_err());
    }

    #[test]
    fn set_replaces_in_place() {
        let mut row = sample();
        row.set("name", "Grace");
        row.set("age", 36);
        assert_eq!(row.columns().collect::<Vec<_>>(), ["id", "name", "email", "age"]);
        assert_eq!(row.get("name"), Some(&Value::from("Grace")));
    }

    #[test]
    fn deserialize_into_struct() {
        let user: User = sample().deserialize().unwrap();
        assert_eq!(
            user,
            User {
                id: 7,
                name: "Ada".into(),
                email: None
            }
        );
    }

    #[test]
    fn missing_relation_is_a_resolution_error() {
        let err = sample().relation("posts").unwrap_err();
        assert!(err.is_relation_resolution());
    }
}
