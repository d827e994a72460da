use crate::error::{OrmError, OrmResult};
use std::collections::BTreeMap;
use std::fmt;

/// Filter operator, resolved from a key suffix at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `field = ?`
    Eq,
    /// `field != ?`
    Ne,
    /// `field > ?`
    Gt,
    /// `field < ?`
    Lt,
    /// `field >= ?`
    Ge,
    /// `field <= ?`
    Le,
    /// `field in (?, ...)` or `field in (<subquery>)`
    In,
    /// `(field between ? AND ?)`
    Between,
    /// `field LIKE ?`
    Like,
    /// `field = <other field>`, no bound value
    Eqf,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
        Operator::Ge,
        Operator::Le,
        Operator::In,
        Operator::Between,
        Operator::Like,
        Operator::Eqf,
    ];

    /// Canonical suffix name.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Ge => "ge",
            Operator::Le => "le",
            Operator::In => "in",
            Operator::Between => "between",
            Operator::Like => "like",
            Operator::Eqf => "eqf",
        }
    }

    /// Comparison symbol for the single-value operators.
    pub(crate) fn symbol(&self) -> Option<&'static str> {
        match self {
            Operator::Eq => Some("="),
            Operator::Ne => Some("!="),
            Operator::Gt => Some(">"),
            Operator::Lt => Some("<"),
            Operator::Ge => Some(">="),
            Operator::Le => Some("<="),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable operator table used to parse `field__operator` keys.
///
/// Build one with [`FilterGrammar::default`] or [`FilterGrammar::builder`]
/// and hand it to the parser; there is no process-wide registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGrammar {
    separator: String,
    operators: BTreeMap<String, Operator>,
}

impl Default for FilterGrammar {
    fn default() -> Self {
        Self {
            separator: "__".to_string(),
            operators: Operator::ALL
                .iter()
                .map(|op| (op.name().to_string(), *op))
                .collect(),
        }
    }
}

impl FilterGrammar {
    pub fn builder() -> FilterGrammarBuilder {
        FilterGrammarBuilder {
            grammar: FilterGrammar::default(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Look up an operator by suffix name (aliases included).
    pub fn operator(&self, name: &str) -> Option<Operator> {
        self.operators.get(name).copied()
    }

    /// Split a filter key into field and operator.
    ///
    /// `"age__ge"` parses to `("age", Ge)`; a key without the separator is an
    /// equality test. An unknown suffix is rejected with
    /// [`OrmError::UnknownFilterOperator`].
    pub fn parse_key<'k>(&self, key: &'k str) -> OrmResult<(&'k str, Operator)> {
        let (field, op) = match key.rsplit_once(self.separator.as_str()) {
            Some((field, suffix)) => {
                let op = self
                    .operator(suffix)
                    .ok_or_else(|| OrmError::UnknownFilterOperator(suffix.to_string()))?;
                (field, op)
            }
            None => (key, Operator::Eq),
        };
        if field.trim().is_empty() {
            return Err(OrmError::grammar(format!("filter key '{key}' has no field")));
        }
        Ok((field, op))
    }
}

/// Builder for a customized [`FilterGrammar`].
#[derive(Debug, Clone)]
pub struct FilterGrammarBuilder {
    grammar: FilterGrammar,
}

impl FilterGrammarBuilder {
    /// Use a different field/operator separator (default `"__"`).
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.grammar.separator = separator.into();
        self
    }

    /// Register an additional suffix for an operator, e.g. `alias("gte", Operator::Ge)`.
    pub fn alias(mut self, name: impl Into<String>, op: Operator) -> Self {
        self.grammar.operators.insert(name.into(), op);
        self
    }

    pub fn build(self) -> OrmResult<FilterGrammar> {
        if self.grammar.separator.is_empty() {
            return Err(OrmError::grammar("filter separator must not be empty"));
        }
        Ok(self.grammar)
    }
}
