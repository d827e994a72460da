//! Fluent, immutable query builder over the node AST.
//!
//! Every builder method takes `&self` and returns a new [`QueryTree`] with one
//! more child in the relevant slot; the receiver is never modified, so a base
//! query can be reused to derive any number of statements.
//!
//! ```ignore
//! use sqltree::{filters, QueryTree};
//!
//! let base = QueryTree::new().from("users").filter(filters! { "active" => true })?;
//! let page = base.desc("created_at").limit(20).build_select()?;
//! let count = base.build_select_fields(["COUNT(*) AS n"])?;
//! ```

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::filter::{Conjunction, FilterGrammar, FilterNode, FilterScope, FilterValue};
use crate::node::{
    ChangeNode, ContainerNode, FieldNode, JoinKind, JoinNode, LimitNode, Node, NodeKey, NodeKind,
    SortDirection, TableNode,
};
use crate::relation::RelationRegistry;
use crate::statement::{Statement, StatementKind};
use crate::value::Value;
use std::sync::Arc;

/// Named node slots of a [`QueryTree`], in SQL clause order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Tables,
    Fields,
    Joins,
    Where,
    Having,
    Group,
    Order,
    Limit,
    Change,
}

impl Slot {
    fn container_kind(&self) -> Option<NodeKind> {
        match self {
            Slot::Tables => Some(NodeKind::Tables),
            Slot::Fields => Some(NodeKind::Fields),
            Slot::Joins => Some(NodeKind::Joins),
            Slot::Where => Some(NodeKind::Where),
            Slot::Having => Some(NodeKind::Having),
            Slot::Group => Some(NodeKind::Group),
            Slot::Order => Some(NodeKind::Order),
            Slot::Limit | Slot::Change => None,
        }
    }
}

/// Immutable query AST plus the dialect and relation context used to compile it.
#[derive(Debug, Clone)]
pub struct QueryTree {
    tables: ContainerNode,
    fields: ContainerNode,
    joins: ContainerNode,
    where_: ContainerNode,
    having: ContainerNode,
    group: ContainerNode,
    order: ContainerNode,
    limit: LimitNode,
    change: ChangeNode,
    dialect: Dialect,
    grammar: Arc<FilterGrammar>,
    relations: Option<Arc<RelationRegistry>>,
    requested: Vec<String>,
}

impl Default for QueryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryTree {
    pub fn new() -> Self {
        Self {
            tables: ContainerNode::new(NodeKind::Tables),
            fields: ContainerNode::new(NodeKind::Fields),
            joins: ContainerNode::new(NodeKind::Joins),
            where_: ContainerNode::new(NodeKind::Where),
            having: ContainerNode::new(NodeKind::Having),
            group: ContainerNode::new(NodeKind::Group),
            order: ContainerNode::new(NodeKind::Order),
            limit: LimitNode::default(),
            change: ChangeNode::new(),
            dialect: Dialect::Generic,
            grammar: Arc::new(FilterGrammar::default()),
            relations: None,
            requested: Vec::new(),
        }
    }

    /// Shorthand for `QueryTree::new().from(table)`.
    pub fn table(table: impl Into<String>) -> Self {
        Self::new().from(table)
    }

    // ==================== Accessors ====================

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn grammar(&self) -> &FilterGrammar {
        &self.grammar
    }

    pub fn relations(&self) -> Option<&Arc<RelationRegistry>> {
        self.relations.as_ref()
    }

    fn primary(&self) -> Option<&TableNode> {
        self.tables.children().find_map(|(_, node)| match node {
            Node::Table(table) => Some(table),
            _ => None,
        })
    }

    /// The first registered table (without alias).
    pub fn primary_table(&self) -> Option<&str> {
        self.primary().map(TableNode::base_name)
    }

    /// Container behind a slot, or `None` for the limit/change slots.
    pub fn container(&self, slot: Slot) -> Option<&ContainerNode> {
        match slot {
            Slot::Tables => Some(&self.tables),
            Slot::Fields => Some(&self.fields),
            Slot::Joins => Some(&self.joins),
            Slot::Where => Some(&self.where_),
            Slot::Having => Some(&self.having),
            Slot::Group => Some(&self.group),
            Slot::Order => Some(&self.order),
            Slot::Limit | Slot::Change => None,
        }
    }

    pub fn limit_node(&self) -> LimitNode {
        self.limit
    }

    pub fn change_node(&self) -> &ChangeNode {
        &self.change
    }

    fn container_mut(&mut self, slot: Slot) -> Option<&mut ContainerNode> {
        match slot {
            Slot::Tables => Some(&mut self.tables),
            Slot::Fields => Some(&mut self.fields),
            Slot::Joins => Some(&mut self.joins),
            Slot::Where => Some(&mut self.where_),
            Slot::Having => Some(&mut self.having),
            Slot::Group => Some(&mut self.group),
            Slot::Order => Some(&mut self.order),
            Slot::Limit | Slot::Change => None,
        }
    }

    // ==================== Context ====================

    pub fn with_dialect(&self, dialect: Dialect) -> Self {
        let mut tree = self.clone();
        tree.dialect = dialect;
        tree
    }

    pub fn with_grammar(&self, grammar: FilterGrammar) -> Self {
        let mut tree = self.clone();
        tree.grammar = Arc::new(grammar);
        tree
    }

    pub fn with_relations(&self, relations: Arc<RelationRegistry>) -> Self {
        let mut tree = self.clone();
        tree.relations = Some(relations);
        tree
    }

    // ==================== Generic slot access ====================

    /// Append (or replace, for an existing key) a child in a slot.
    ///
    /// The limit and change slots take `Node::Limit` / `Node::Change` and are
    /// replaced wholesale; the key is ignored for them.
    pub fn with_slot_child(&self, slot: Slot, key: Option<NodeKey>, child: Node) -> OrmResult<Self> {
        let mut tree = self.clone();
        match (slot, child) {
            (Slot::Limit, Node::Limit(limit)) => tree.limit = limit,
            (Slot::Change, Node::Change(change)) => tree.change = change,
            (Slot::Limit | Slot::Change, other) => {
                return Err(OrmError::structural(format!(
                    "{slot:?} slot cannot hold a {:?} node",
                    other.kind()
                )));
            }
            (slot, child) => {
                if let Some(container) = tree.container_mut(slot) {
                    container.append_child(key, child)?;
                }
            }
        }
        Ok(tree)
    }

    /// Remove a child from a slot. Clearing the limit/change slot ignores the key.
    pub fn without_slot_child(&self, slot: Slot, key: &NodeKey) -> Self {
        let mut tree = self.clone();
        match slot {
            Slot::Limit => tree.limit = LimitNode::default(),
            Slot::Change => tree.change = ChangeNode::new(),
            slot => {
                if let Some(container) = tree.container_mut(slot) {
                    container.remove_child(key);
                }
            }
        }
        tree
    }

    fn push(&self, slot: Slot, child: Node) -> Self {
        let mut tree = self.clone();
        debug_assert!(slot.container_kind().is_some());
        if let Some(container) = tree.container_mut(slot) {
            container.push(child);
        }
        tree
    }

    // ==================== Tables & fields ====================

    /// Add a table. The first table added is the primary table.
    pub fn from(&self, table: impl Into<String>) -> Self {
        self.push(Slot::Tables, Node::table(table))
    }

    /// Add output fields (raw names/expressions, [`FieldNode`]s or [`crate::CaseNode`]s).
    pub fn select<I, F>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldNode>,
    {
        let mut tree = self.clone();
        for field in fields {
            tree.fields.push(Node::Field(field.into()));
        }
        tree
    }

    pub fn distinct(&self) -> Self {
        let mut tree = self.clone();
        tree.fields.set_distinct(true);
        tree
    }

    // ==================== WHERE ====================

    /// AND a filter node built from `pairs`. Pairs within one call are
    /// alternatives (joined with OR).
    pub fn filter<I, K, V>(&self, pairs: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        let node = FilterNode::parse(&self.grammar, pairs)?;
        Ok(self.filter_node(node.with_conjunction(Conjunction::And)))
    }

    /// OR a filter node built from `pairs`.
    ///
    /// Sibling nodes are joined flat, so `filter(a).or_filter(b).filter(c)`
    /// renders `a OR b AND c`, which SQL reads as `a OR (b AND c)`. Use
    /// [`QueryTree::or_group`] / [`QueryTree::and_group`] for other groupings.
    pub fn or_filter<I, K, V>(&self, pairs: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        let node = FilterNode::parse(&self.grammar, pairs)?;
        Ok(self.filter_node(node.with_conjunction(Conjunction::Or)))
    }

    /// Append a prepared filter node; its own conjunction links it to the previous one.
    pub fn filter_node(&self, node: FilterNode) -> Self {
        self.push(Slot::Where, Node::Filter(node))
    }

    /// AND a group populated by `f`.
    pub fn and_group<F>(&self, f: F) -> OrmResult<Self>
    where
        F: for<'g> FnOnce(FilterScope<'g>) -> OrmResult<FilterScope<'g>>,
    {
        let group = f(FilterScope::new(&self.grammar))?.finish();
        Ok(self.filter_node(group.with_conjunction(Conjunction::And)))
    }

    /// OR a group populated by `f`.
    pub fn or_group<F>(&self, f: F) -> OrmResult<Self>
    where
        F: for<'g> FnOnce(FilterScope<'g>) -> OrmResult<FilterScope<'g>>,
    {
        let group = f(FilterScope::new(&self.grammar))?.finish();
        Ok(self.filter_node(group.with_conjunction(Conjunction::Or)))
    }

    /// AND a literal SQL condition with its own `?` placeholders.
    pub fn filter_raw<I, V>(&self, sql: impl Into<String>, values: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let node = FilterNode::new().push_raw(Conjunction::And, sql, values)?;
        Ok(self.filter_node(node))
    }

    // ==================== GROUP BY / HAVING / ORDER BY ====================

    pub fn group(&self, field: impl Into<FieldNode>) -> Self {
        self.push(Slot::Group, Node::Field(field.into()))
    }

    pub fn having<I, K, V>(&self, pairs: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        let node = FilterNode::parse(&self.grammar, pairs)?;
        Ok(self.push(Slot::Having, Node::Filter(node)))
    }

    pub fn or_having<I, K, V>(&self, pairs: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        let node = FilterNode::parse(&self.grammar, pairs)?.with_conjunction(Conjunction::Or);
        Ok(self.push(Slot::Having, Node::Filter(node)))
    }

    pub fn order(&self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.push(Slot::Order, Node::Field(FieldNode::sorted(field, direction)))
    }

    pub fn asc(&self, field: impl Into<String>) -> Self {
        self.order(field, SortDirection::Asc)
    }

    pub fn desc(&self, field: impl Into<String>) -> Self {
        self.order(field, SortDirection::Desc)
    }

    // ==================== LIMIT / OFFSET ====================

    pub fn limit(&self, limit: u64) -> Self {
        let mut tree = self.clone();
        tree.limit.limit = Some(limit);
        tree
    }

    pub fn offset(&self, offset: u64) -> Self {
        let mut tree = self.clone();
        tree.limit.offset = Some(offset);
        tree
    }

    /// 1-based page of `per_page` rows.
    pub fn page(&self, page: u64, per_page: u64) -> OrmResult<Self> {
        if page < 1 {
            return Err(OrmError::validation("page must be >= 1"));
        }
        if per_page < 1 {
            return Err(OrmError::validation("per_page must be >= 1"));
        }
        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| OrmError::validation("page offset overflows"))?;
        Ok(self.limit(per_page).offset(offset))
    }

    // ==================== JOIN ====================

    pub fn join(&self, join: JoinNode) -> Self {
        self.push(Slot::Joins, Node::Join(join))
    }

    /// `<kind> JOIN table ON left = right` (column-to-column).
    pub fn join_on(
        &self,
        kind: JoinKind,
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.join(JoinNode::new(kind, table).on_columns(left, right))
    }

    pub fn inner_join(&self, table: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.join_on(JoinKind::Inner, table, left, right)
    }

    pub fn left_join(&self, table: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.join_on(JoinKind::Left, table, left, right)
    }

    pub fn right_join(&self, table: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.join_on(JoinKind::Right, table, left, right)
    }

    /// Eager-load relations of the primary table by joining them.
    ///
    /// Names are resolved when the tree is built, against whatever registry
    /// the tree carries by then (an executor attaches its own to trees that
    /// have none). Names not declared for the primary table are skipped.
    pub fn with<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = self.clone();
        for name in names {
            let name = name.as_ref();
            if !tree.requested.iter().any(|r| r == name) {
                tree.requested.push(name.to_string());
            }
        }
        tree
    }

    /// Names passed to `with(...)`, resolved or not.
    pub fn requested_eager(&self) -> &[String] {
        &self.requested
    }

    /// Relations from `with(...)` that resolve against the current registry.
    pub fn eager(&self) -> Vec<String> {
        self.eager_joins().into_iter().map(|(name, _)| name).collect()
    }

    fn eager_joins(&self) -> Vec<(String, JoinNode)> {
        if self.requested.is_empty() {
            return Vec::new();
        }
        let (Some(registry), Some(primary)) = (self.relations.as_deref(), self.primary()) else {
            tracing::debug!(
                target: "sqltree.sql",
                "with() used without a relation registry or primary table; ignored"
            );
            return Vec::new();
        };
        let mut joins = Vec::with_capacity(self.requested.len());
        for name in &self.requested {
            let Some(relation) = registry.get(primary.base_name(), name) else {
                tracing::debug!(
                    target: "sqltree.sql",
                    relation = name.as_str(),
                    table = primary.base_name(),
                    "skipping undeclared relation"
                );
                continue;
            };
            let mut join = JoinNode::new(relation.join_type, &relation.table).on_columns(
                format!("{}.{}", primary.qualifier(), relation.local_key),
                format!("{}.{}", relation.table, relation.foreign_key),
            );
            if let Some(on) = &relation.on_condition {
                join = join.on(on.clone());
            }
            joins.push((name.clone(), join));
        }
        joins
    }

    // ==================== Build ====================

    /// `SELECT [DISTINCT] fields FROM ... [JOIN] [eager JOIN] [WHERE] [GROUP BY] [HAVING] [ORDER BY] [LIMIT]`
    pub fn build_select(&self) -> OrmResult<Statement> {
        let mut stmt = Statement::new(StatementKind::Select);
        stmt = self.fields.send(stmt)?;
        stmt = self.tables.send(stmt)?;
        stmt = self.joins.send(stmt)?;
        for (_, join) in self.eager_joins() {
            let (sql, values) = join.render();
            stmt = stmt.insert_after(&sql, " ").add_values(values);
        }
        stmt = self.where_.send(stmt)?;
        stmt = self.group.send(stmt)?;
        stmt = self.having.send(stmt)?;
        stmt = self.order.send(stmt)?;
        Ok(self.limit.send(stmt, self.dialect))
    }

    /// Build a SELECT with `fields` in place of the fields slot. The receiver is unaffected.
    pub fn build_select_fields<I, F>(&self, fields: I) -> OrmResult<Statement>
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldNode>,
    {
        let mut tree = self.clone();
        let distinct = tree.fields.is_distinct();
        tree.fields = ContainerNode::new(NodeKind::Fields);
        tree.fields.set_distinct(distinct);
        tree.select(fields).build_select()
    }

    /// `INSERT INTO t (c1, ...) VALUES (?, ...)`
    pub fn build_insert<I, K, V>(&self, changes: I) -> OrmResult<Statement>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let change = self.merged_changes(changes);
        let stmt = self.tables.send(Statement::new(StatementKind::Insert))?;
        change.send(stmt)
    }

    /// `UPDATE t SET c1 = ?, ... [WHERE] [ORDER BY] [LIMIT]`
    pub fn build_update<I, K, V>(&self, changes: I) -> OrmResult<Statement>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let change = self.merged_changes(changes);
        let mut stmt = self.tables.send(Statement::new(StatementKind::Update))?;
        stmt = change.send(stmt)?;
        stmt = self.where_.send(stmt)?;
        stmt = self.order.send(stmt)?;
        Ok(self.limit.send(stmt, self.dialect))
    }

    /// `DELETE FROM t [WHERE] [ORDER BY] [LIMIT]`
    pub fn build_delete(&self) -> OrmResult<Statement> {
        let mut stmt = self.tables.send(Statement::new(StatementKind::Delete))?;
        stmt = self.where_.send(stmt)?;
        stmt = self.order.send(stmt)?;
        Ok(self.limit.send(stmt, self.dialect))
    }

    fn merged_changes<I, K, V>(&self, changes: I) -> ChangeNode
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        changes
            .into_iter()
            .fold(self.change.clone(), |node, (k, v)| node.set(k, v))
    }
}
