use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::statement::{Statement, StatementKind};
use crate::value::Value;

/// Limit/offset request; the SQL is chosen by the dialect at send time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitNode {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl LimitNode {
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> Self {
        Self { limit, offset }
    }

    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.offset.is_none()
    }

    pub(crate) fn send(&self, stmt: Statement, dialect: Dialect) -> Statement {
        match dialect.limit_clause(self.limit, self.offset) {
            Some((sql, values)) => stmt.insert_after(&sql, " ").add_values(values),
            None => stmt,
        }
    }
}

/// Column/value payload of an INSERT or UPDATE.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeNode {
    changes: Vec<(String, Value)>,
}

impl ChangeNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pairs. A repeated column keeps its first position and last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |node, (k, v)| node.set(k, v))
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.changes.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.changes.push((column, value)),
        }
        self
    }

    pub fn changes(&self) -> &[(String, Value)] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub(crate) fn send(&self, stmt: Statement) -> OrmResult<Statement> {
        if self.changes.is_empty() {
            return Err(OrmError::structural(format!(
                "{} needs at least one column to change",
                stmt.kind()
            )));
        }
        let columns: Vec<&str> = self.changes.iter().map(|(c, _)| c.as_str()).collect();
        let values = self.changes.iter().map(|(_, v)| v.clone());
        let sql = match stmt.kind() {
            StatementKind::Insert => format!(
                "({}) VALUES ({})",
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            ),
            StatementKind::Update => {
                let sets: Vec<String> = columns.iter().map(|c| format!("{c} = ?")).collect();
                format!("SET {}", sets.join(", "))
            }
            other => {
                return Err(OrmError::structural(format!(
                    "change payload cannot be sent to a {other} statement"
                )));
            }
        };
        Ok(stmt.insert_after(&sql, " ").add_values(values))
    }
}
