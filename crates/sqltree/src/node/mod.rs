//! The query AST.
//!
//! A [`Node`] knows how to append its SQL fragment (and bind values) to a
//! [`Statement`]. Leaf nodes hold one table, field, filter or join; container
//! nodes hold keyed children of exactly one kind and render a whole clause.
//! Nodes are plain owned data, so cloning a tree deep-copies it.

mod container;
mod leaf;
mod payload;

pub use container::ContainerNode;
pub use leaf::{CaseNode, FieldNode, JoinKind, JoinNode, SortDirection, TableNode};
pub use payload::{ChangeNode, LimitNode};

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::filter::FilterNode;
use crate::statement::Statement;
use std::fmt;

/// Returned by `get_child` for missing keys.
pub(crate) static EMPTY_NODE: Node = Node::Empty;

/// Discriminant of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Empty,
    Table,
    Field,
    Filter,
    Join,
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

impl NodeKind {
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            NodeKind::Tables
                | NodeKind::Fields
                | NodeKind::Joins
                | NodeKind::Where
                | NodeKind::Having
                | NodeKind::Group
                | NodeKind::Order
        )
    }
}

/// Child key inside a container: an explicit name or an auto-assigned index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Named(String),
    Index(usize),
}

impl From<&str> for NodeKey {
    fn from(name: &str) -> Self {
        NodeKey::Named(name.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(name: String) -> Self {
        NodeKey::Named(name)
    }
}

impl From<usize> for NodeKey {
    fn from(index: usize) -> Self {
        NodeKey::Index(index)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Named(name) => f.write_str(name),
            NodeKey::Index(i) => write!(f, "#{i}"),
        }
    }
}

/// A node of the query AST.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
    /// Renders nothing; stands in for missing or removed children.
    #[default]
    Empty,
    Table(TableNode),
    Field(FieldNode),
    Filter(FilterNode),
    Join(JoinNode),
    Tables(ContainerNode),
    Fields(ContainerNode),
    Joins(ContainerNode),
    Where(ContainerNode),
    Having(ContainerNode),
    Group(ContainerNode),
    Order(ContainerNode),
    Limit(LimitNode),
    Change(ChangeNode),
}

impl Node {
    /// Empty container node of the given container kind.
    pub fn container(kind: NodeKind) -> OrmResult<Node> {
        let inner = ContainerNode::new(kind);
        Ok(match kind {
            NodeKind::Tables => Node::Tables(inner),
            NodeKind::Fields => Node::Fields(inner),
            NodeKind::Joins => Node::Joins(inner),
            NodeKind::Where => Node::Where(inner),
            NodeKind::Having => Node::Having(inner),
            NodeKind::Group => Node::Group(inner),
            NodeKind::Order => Node::Order(inner),
            other => {
                return Err(OrmError::structural(format!("{other:?} is not a container kind")));
            }
        })
    }

    pub fn table(name: impl Into<String>) -> Node {
        Node::Table(TableNode::new(name))
    }

    pub fn field(field: impl Into<FieldNode>) -> Node {
        Node::Field(field.into())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Empty => NodeKind::Empty,
            Node::Table(_) => NodeKind::Table,
            Node::Field(_) => NodeKind::Field,
            Node::Filter(_) => NodeKind::Filter,
            Node::Join(_) => NodeKind::Join,
            Node::Tables(_) => NodeKind::Tables,
            Node::Fields(_) => NodeKind::Fields,
            Node::Joins(_) => NodeKind::Joins,
            Node::Where(_) => NodeKind::Where,
            Node::Having(_) => NodeKind::Having,
            Node::Group(_) => NodeKind::Group,
            Node::Order(_) => NodeKind::Order,
            Node::Limit(_) => NodeKind::Limit,
            Node::Change(_) => NodeKind::Change,
        }
    }

    pub fn as_container(&self) -> Option<&ContainerNode> {
        match self {
            Node::Tables(c)
            | Node::Fields(c)
            | Node::Joins(c)
            | Node::Where(c)
            | Node::Having(c)
            | Node::Group(c)
            | Node::Order(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut ContainerNode> {
        match self {
            Node::Tables(c)
            | Node::Fields(c)
            | Node::Joins(c)
            | Node::Where(c)
            | Node::Having(c)
            | Node::Group(c)
            | Node::Order(c) => Some(c),
            _ => None,
        }
    }

    /// Append this node's fragment to `stmt`.
    pub fn send(&self, stmt: Statement, dialect: Dialect) -> OrmResult<Statement> {
        match self {
            Node::Empty => Ok(stmt),
            Node::Table(table) => Ok(stmt.insert_after(table.name(), " ")),
            Node::Field(field) => {
                let (sql, values) = field.render()?;
                Ok(stmt.insert_after(&sql, " ").add_values(values))
            }
            Node::Filter(filter) => Ok(match filter.render_wrapped() {
                Some((sql, values)) => stmt.insert_after(&sql, " ").add_values(values),
                None => stmt,
            }),
            Node::Join(join) => {
                let (sql, values) = join.render();
                Ok(stmt.insert_after(&sql, " ").add_values(values))
            }
            Node::Limit(limit) => Ok(limit.send(stmt, dialect)),
            Node::Change(change) => change.send(stmt),
            Node::Tables(c)
            | Node::Fields(c)
            | Node::Joins(c)
            | Node::Where(c)
            | Node::Having(c)
            | Node::Group(c)
            | Node::Order(c) => c.send(stmt),
        }
    }

    /// Append a child to a container node.
    pub fn append_child(&mut self, key: Option<NodeKey>, child: Node) -> OrmResult<NodeKey> {
        let kind = self.kind();
        match self.as_container_mut() {
            Some(container) => container.append_child(key, child),
            None => Err(OrmError::structural(format!(
                "{kind:?} node does not accept children"
            ))),
        }
    }

    /// Child under `key`, or the canonical empty node.
    pub fn get_child(&self, key: &NodeKey) -> &Node {
        match self.as_container() {
            Some(container) => container.get_child(key),
            None => &EMPTY_NODE,
        }
    }

    /// Remove and return the child under `key` (the empty node when absent).
    pub fn remove_child(&mut self, key: &NodeKey) -> Node {
        match self.as_container_mut() {
            Some(container) => container.remove_child(key),
            None => Node::Empty,
        }
    }

    pub fn has_child(&self, key: &NodeKey) -> bool {
        self.as_container().is_some_and(|c| c.has_child(key))
    }

    /// Whether sending this node would emit nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Empty => true,
            Node::Table(t) => t.name().is_empty(),
            Node::Field(_) | Node::Join(_) => false,
            Node::Filter(f) => f.is_empty(),
            Node::Limit(l) => l.is_empty(),
            Node::Change(c) => c.is_empty(),
            Node::Tables(c)
            | Node::Fields(c)
            | Node::Joins(c)
            | Node::Where(c)
            | Node::Having(c)
            | Node::Group(c)
            | Node::Order(c) => c.is_empty(),
        }
    }
}

impl From<FilterNode> for Node {
    fn from(filter: FilterNode) -> Self {
        Node::Filter(filter)
    }
}

impl From<FieldNode> for Node {
    fn from(field: FieldNode) -> Self {
        Node::Field(field)
    }
}

impl From<JoinNode> for Node {
    fn from(join: JoinNode) -> Self {
        Node::Join(join)
    }
}

impl From<TableNode> for Node {
    fn from(table: TableNode) -> Self {
        Node::Table(table)
    }
}

#[cfg(test)]
mod tests;
