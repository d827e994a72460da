//! Compiled SQL statements.
//!
//! A [`Statement`] pairs SQL text using `?` positional placeholders with the
//! ordered bind values that fill them. It is a value object: every
//! transformation consumes the receiver and returns a new statement, so nodes
//! can thread one through their `send` calls without shared mutation.
//!
//! ```ignore
//! use sqltree::{Statement, StatementKind};
//!
//! let stmt = Statement::with_text(StatementKind::Select, "FROM users", vec![])
//!     .insert_before("SELECT *", " ")
//!     .insert_after("WHERE id = ?", " ")
//!     .add_values([7]);
//! assert_eq!(stmt.text(), "SELECT * FROM users WHERE id = ?");
//! ```

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of SQL statement being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        }
    }

    /// Whether this kind modifies data.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, StatementKind::Select)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SQL text plus ordered bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    kind: StatementKind,
    text: String,
    values: Vec<Value>,
}

impl Statement {
    /// Create an empty statement of the given kind.
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            text: String::new(),
            values: Vec::new(),
        }
    }

    pub fn with_text(kind: StatementKind, text: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            kind,
            text: text.into(),
            values,
        }
    }

    /// Prepend `text`, separated by `sep`.
    pub fn insert_before(mut self, text: &str, sep: &str) -> Self {
        if text.is_empty() {
            return self;
        }
        if self.text.is_empty() {
            self.text = text.to_string();
        } else {
            self.text = format!("{text}{sep}{}", self.text);
        }
        self
    }

    /// Append `text`, separated by `sep`.
    pub fn insert_after(mut self, text: &str, sep: &str) -> Self {
        if text.is_empty() {
            return self;
        }
        if !self.text.is_empty() {
            self.text.push_str(sep);
        }
        self.text.push_str(text);
        self
    }

    /// Replace every occurrence of `old` in the text.
    pub fn replace(mut self, old: &str, new: &str) -> Self {
        if !old.is_empty() {
            self.text = self.text.replace(old, new);
        }
        self
    }

    /// Concatenate two statements of the same kind.
    ///
    /// Text becomes `self + sep + other` (just `other` when `self` is empty),
    /// values are appended in order.
    pub fn join(self, other: Statement, sep: &str) -> OrmResult<Self> {
        if self.kind != other.kind {
            return Err(OrmError::KindMismatch {
                left: self.kind,
                right: other.kind,
            });
        }
        let Statement { text, values, .. } = other;
        Ok(self.insert_after(&text, sep).add_values(values))
    }

    /// Append bind values.
    pub fn add_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Length of the SQL text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of `?` placeholders outside quoted literals and identifiers.
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.text)
    }

    /// Fail when the placeholder count and the value count disagree.
    pub fn check_placeholders(&self) -> OrmResult<()> {
        let placeholders = self.placeholder_count();
        if placeholders != self.values.len() {
            return Err(OrmError::structural(format!(
                "statement has {placeholders} placeholders but {} bind values: {}",
                self.values.len(),
                self.text
            )));
        }
        Ok(())
    }

    pub fn into_parts(self) -> (StatementKind, String, Vec<Value>) {
        (self.kind, self.text, self.values)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Count `?` placeholders, skipping `'...'`, `"..."` and `` `...` `` quoted runs.
pub(crate) fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            // Doubled quotes ('it''s') close and reopen, which nets out.
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => count += 1,
                _ => {}
            },
        }
    }
    count
}
