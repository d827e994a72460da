use crate::error::{OrmError, OrmResult};
use crate::filter::{FilterCondition, FilterNode};
use crate::statement::{Statement, StatementKind};
use crate::value::Value;
use std::fmt;

/// One table reference, optionally aliased (`"users u"`).
#[derive(Debug, Clone, PartialEq)]
pub struct TableNode {
    name: String,
}

impl TableNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name without its alias.
    pub fn base_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }

    /// Name used to qualify columns: the alias when one is given.
    pub fn qualifier(&self) -> &str {
        self.name.split_whitespace().last().unwrap_or("")
    }
}

/// Sort direction for ORDER BY entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One output expression of a SELECT (also used for GROUP BY / ORDER BY entries).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldNode {
    /// Raw column name or expression, emitted as-is.
    Column(String),
    /// `expr AS alias`
    Aliased { expr: String, alias: String },
    /// `(subquery) [AS alias]`, with the subquery's values spliced in place.
    SubQuery {
        statement: Statement,
        alias: Option<String>,
    },
    /// `CASE WHEN ... END [AS alias]`
    Case(CaseNode),
    /// `expr ASC|DESC`
    Sorted {
        expr: String,
        direction: SortDirection,
    },
}

impl FieldNode {
    pub fn column(expr: impl Into<String>) -> Self {
        FieldNode::Column(expr.into())
    }

    pub fn aliased(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        FieldNode::Aliased {
            expr: expr.into(),
            alias: alias.into(),
        }
    }

    pub fn subquery(statement: Statement, alias: impl Into<String>) -> Self {
        FieldNode::SubQuery {
            statement,
            alias: Some(alias.into()),
        }
    }

    pub fn sorted(expr: impl Into<String>, direction: SortDirection) -> Self {
        FieldNode::Sorted {
            expr: expr.into(),
            direction,
        }
    }

    /// SQL fragment and the values it binds.
    pub fn render(&self) -> OrmResult<(String, Vec<Value>)> {
        match self {
            FieldNode::Column(expr) => Ok((expr.clone(), Vec::new())),
            FieldNode::Aliased { expr, alias } => Ok((format!("{expr} AS {alias}"), Vec::new())),
            FieldNode::SubQuery { statement, alias } => {
                if statement.kind() != StatementKind::Select {
                    return Err(OrmError::structural(format!(
                        "field subquery must be a SELECT, got {}",
                        statement.kind()
                    )));
                }
                let sql = match alias {
                    Some(alias) => format!("({}) AS {alias}", statement.text()),
                    None => format!("({})", statement.text()),
                };
                Ok((sql, statement.values().to_vec()))
            }
            FieldNode::Case(case) => case.render(),
            FieldNode::Sorted { expr, direction } => {
                Ok((format!("{expr} {}", direction.as_sql()), Vec::new()))
            }
        }
    }
}

impl From<&str> for FieldNode {
    fn from(expr: &str) -> Self {
        FieldNode::Column(expr.to_string())
    }
}

impl From<String> for FieldNode {
    fn from(expr: String) -> Self {
        FieldNode::Column(expr)
    }
}

impl From<&String> for FieldNode {
    fn from(expr: &String) -> Self {
        FieldNode::Column(expr.clone())
    }
}

impl From<CaseNode> for FieldNode {
    fn from(case: CaseNode) -> Self {
        FieldNode::Case(case)
    }
}

/// `CASE WHEN <filter> THEN ? ... [ELSE ?] END [AS alias]`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaseNode {
    branches: Vec<(FilterNode, Value)>,
    otherwise: Option<Value>,
    alias: Option<String>,
}

impl CaseNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when(mut self, condition: FilterNode, then: impl Into<Value>) -> Self {
        self.branches.push((condition, then.into()));
        self
    }

    /// Convenience for a single-condition branch.
    pub fn when_condition(self, condition: FilterCondition, then: impl Into<Value>) -> Self {
        self.when(FilterNode::condition(condition), then)
    }

    pub fn otherwise(mut self, value: impl Into<Value>) -> Self {
        self.otherwise = Some(value.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn render(&self) -> OrmResult<(String, Vec<Value>)> {
        let mut sql = String::from("CASE");
        let mut values = Vec::new();
        let mut arms = 0;
        for (condition, then) in &self.branches {
            let Some((cond_sql, cond_values)) = condition.render() else {
                continue;
            };
            sql.push_str(&format!(" WHEN {cond_sql} THEN ?"));
            values.extend(cond_values);
            values.push(then.clone());
            arms += 1;
        }
        if arms == 0 {
            return Err(OrmError::structural("CASE expression needs at least one WHEN branch"));
        }
        if let Some(otherwise) = &self.otherwise {
            sql.push_str(" ELSE ?");
            values.push(otherwise.clone());
        }
        sql.push_str(" END");
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(alias);
        }
        Ok((sql, values))
    }
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    #[default]
    Left,
    Right,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// `<kind> JOIN table ON <conditions>`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinNode {
    kind: JoinKind,
    table: String,
    conditions: Vec<FilterNode>,
}

impl JoinNode {
    pub fn new(kind: JoinKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            conditions: Vec::new(),
        }
    }

    /// Add an ON condition, joined to the previous one by the node's conjunction.
    pub fn on(mut self, condition: FilterNode) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Column-to-column ON condition.
    pub fn on_columns(self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.on(FilterNode::condition(FilterCondition::eqf(left, right)))
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn render(&self) -> (String, Vec<Value>) {
        let mut sql = format!("{} {}", self.kind.as_sql(), self.table);
        let (on_sql, values) = render_filter_list(&self.conditions);
        if !on_sql.is_empty() {
            sql.push_str(" ON ");
            sql.push_str(&on_sql);
        }
        (sql, values)
    }
}

/// Join sibling filter nodes by their conjunctions. A lone node is emitted bare;
/// with siblings each multi-part node is parenthesized.
pub(crate) fn render_filter_list<'a, I>(nodes: I) -> (String, Vec<Value>)
where
    I: IntoIterator<Item = &'a FilterNode>,
{
    let live: Vec<&FilterNode> = nodes.into_iter().filter(|n| !n.is_empty()).collect();
    let mut sql = String::new();
    let mut values = Vec::new();
    for node in &live {
        let rendered = if live.len() == 1 {
            node.render()
        } else {
            node.render_wrapped()
        };
        let Some((fragment, node_values)) = rendered else {
            continue;
        };
        if !sql.is_empty() {
            sql.push(' ');
            sql.push_str(node.conjunction().as_sql());
            sql.push(' ');
        }
        sql.push_str(&fragment);
        values.extend(node_values);
    }
    (sql, values)
}
