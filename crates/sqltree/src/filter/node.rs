use super::condition::{FilterCondition, FilterValue};
use super::grammar::FilterGrammar;
use crate::error::{OrmError, OrmResult};
use crate::statement::count_placeholders;
use crate::value::Value;
use std::fmt;

/// How a filter part attaches to the part before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl Conjunction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FilterPart {
    Condition(FilterCondition),
    Group(FilterNode),
    Raw { sql: String, values: Vec<Value> },
}

/// An ordered group of filter parts.
///
/// Each part carries the conjunction linking it to the previous part; the
/// node itself carries the conjunction linking it to its preceding sibling
/// inside a WHERE/HAVING container or a parent group.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterNode {
    conjunction: Conjunction,
    parts: Vec<(Conjunction, FilterPart)>,
}

impl FilterNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse key/value pairs into one node whose conditions are alternatives (OR).
    pub fn parse<I, K, V>(grammar: &FilterGrammar, pairs: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        let mut node = FilterNode::new();
        for (key, value) in pairs {
            let condition = FilterCondition::parse(grammar, key.as_ref(), value)?;
            node = node.push_condition(Conjunction::Or, condition);
        }
        Ok(node)
    }

    /// Node holding a single condition.
    pub fn condition(condition: FilterCondition) -> Self {
        FilterNode::new().push_condition(Conjunction::And, condition)
    }

    /// Set the conjunction towards the preceding sibling.
    pub fn with_conjunction(mut self, conjunction: Conjunction) -> Self {
        self.conjunction = conjunction;
        self
    }

    pub fn conjunction(&self) -> Conjunction {
        self.conjunction
    }

    pub fn push_condition(mut self, conjunction: Conjunction, condition: FilterCondition) -> Self {
        self.parts.push((conjunction, FilterPart::Condition(condition)));
        self
    }

    /// Nest another node as a group. Its own conjunction is replaced by `conjunction`.
    pub fn push_group(mut self, conjunction: Conjunction, group: FilterNode) -> Self {
        let group = group.with_conjunction(conjunction);
        self.parts.push((conjunction, FilterPart::Group(group)));
        self
    }

    /// Add a literal SQL fragment. Its `?` count must match `values`.
    pub fn push_raw<I, V>(mut self, conjunction: Conjunction, sql: impl Into<String>, values: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let sql = sql.into();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let placeholders = count_placeholders(&sql);
        if placeholders != values.len() {
            return Err(OrmError::structural(format!(
                "raw filter '{sql}' has {placeholders} placeholders but {} values",
                values.len()
            )));
        }
        self.parts.push((conjunction, FilterPart::Raw { sql, values }));
        Ok(self)
    }

    /// Open an AND-joined group, populated by `f`.
    pub fn and_group<F>(self, grammar: &FilterGrammar, f: F) -> OrmResult<Self>
    where
        F: for<'g> FnOnce(FilterScope<'g>) -> OrmResult<FilterScope<'g>>,
    {
        let group = f(FilterScope::new(grammar))?.finish();
        Ok(self.push_group(Conjunction::And, group))
    }

    /// Open an OR-joined group, populated by `f`.
    pub fn or_group<F>(self, grammar: &FilterGrammar, f: F) -> OrmResult<Self>
    where
        F: for<'g> FnOnce(FilterScope<'g>) -> OrmResult<FilterScope<'g>>,
    {
        let group = f(FilterScope::new(grammar))?.finish();
        Ok(self.push_group(Conjunction::Or, group))
    }

    /// Number of parts that render to something (empty groups excluded).
    pub fn effective_len(&self) -> usize {
        self.parts
            .iter()
            .filter(|(_, part)| match part {
                FilterPart::Group(group) => !group.is_empty(),
                FilterPart::Raw { sql, .. } => !sql.trim().is_empty(),
                FilterPart::Condition(_) => true,
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.effective_len() == 0
    }

    /// Render without outer parentheses. `None` when the node is empty.
    pub fn render(&self) -> Option<(String, Vec<Value>)> {
        let mut sql = String::new();
        let mut values = Vec::new();
        for (conjunction, part) in &self.parts {
            let (fragment, part_values) = match part {
                FilterPart::Condition(condition) => condition.render(),
                FilterPart::Group(group) => match group.render_wrapped() {
                    Some(rendered) => rendered,
                    None => continue,
                },
                FilterPart::Raw { sql: raw, values: raw_values } if !raw.trim().is_empty() => {
                    (raw.clone(), raw_values.clone())
                }
                FilterPart::Raw { .. } => continue,
            };
            if !sql.is_empty() {
                sql.push(' ');
                sql.push_str(conjunction.as_sql());
                sql.push(' ');
            }
            sql.push_str(&fragment);
            values.extend(part_values);
        }
        if sql.is_empty() {
            None
        } else {
            Some((sql, values))
        }
    }

    /// Render, parenthesized when more than one part is effective.
    pub fn render_wrapped(&self) -> Option<(String, Vec<Value>)> {
        let (sql, values) = self.render()?;
        if self.effective_len() > 1 {
            Some((format!("({sql})"), values))
        } else {
            Some((sql, values))
        }
    }
}

/// Scope handed to group callbacks. Parses keys with the owning tree's grammar.
#[derive(Debug)]
pub struct FilterScope<'g> {
    grammar: &'g FilterGrammar,
    node: FilterNode,
}

impl<'g> FilterScope<'g> {
    pub(crate) fn new(grammar: &'g FilterGrammar) -> Self {
        Self {
            grammar,
            node: FilterNode::new(),
        }
    }

    /// AND in the parsed pairs (alternatives among themselves).
    pub fn filter<I, K, V>(self, pairs: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        self.append(Conjunction::And, pairs)
    }

    /// OR in the parsed pairs.
    pub fn or_filter<I, K, V>(self, pairs: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        self.append(Conjunction::Or, pairs)
    }

    /// AND a single `key => value` condition.
    pub fn condition(self, key: &str, value: impl Into<FilterValue>) -> OrmResult<Self> {
        let condition = FilterCondition::parse(self.grammar, key, value)?;
        Ok(Self {
            node: self.node.push_condition(Conjunction::And, condition),
            ..self
        })
    }

    /// AND a raw fragment.
    pub fn raw<I, V>(self, sql: impl Into<String>, values: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Ok(Self {
            node: self.node.push_raw(Conjunction::And, sql, values)?,
            ..self
        })
    }

    pub fn and_group<F>(self, f: F) -> OrmResult<Self>
    where
        F: for<'h> FnOnce(FilterScope<'h>) -> OrmResult<FilterScope<'h>>,
    {
        let node = self.node.and_group(self.grammar, f)?;
        Ok(Self { node, ..self })
    }

    pub fn or_group<F>(self, f: F) -> OrmResult<Self>
    where
        F: for<'h> FnOnce(FilterScope<'h>) -> OrmResult<FilterScope<'h>>,
    {
        let node = self.node.or_group(self.grammar, f)?;
        Ok(Self { node, ..self })
    }

    pub fn finish(self) -> FilterNode {
        self.node
    }

    fn append<I, K, V>(self, conjunction: Conjunction, pairs: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        let parsed = FilterNode::parse(self.grammar, pairs)?;
        Ok(Self {
            node: self.node.push_group(conjunction, parsed),
            ..self
        })
    }
}
