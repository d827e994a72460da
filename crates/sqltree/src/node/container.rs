use super::leaf::render_filter_list;
use super::{EMPTY_NODE, Node, NodeKey, NodeKind};
use crate::error::{OrmError, OrmResult};
use crate::statement::{Statement, StatementKind};
use crate::value::Value;

/// Keyed, ordered collection of child nodes of a single kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerNode {
    kind: NodeKind,
    children: Vec<(NodeKey, Node)>,
    next_index: usize,
    distinct: bool,
}

impl ContainerNode {
    /// Empty container of a container kind (`Tables`, `Fields`, `Where`, ...).
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            next_index: 0,
            distinct: false,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The only child kind this container accepts.
    pub fn accepts(&self) -> NodeKind {
        match self.kind {
            NodeKind::Tables => NodeKind::Table,
            NodeKind::Joins => NodeKind::Join,
            NodeKind::Where | NodeKind::Having => NodeKind::Filter,
            _ => NodeKind::Field,
        }
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub(crate) fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    /// Append a child. Without a key it gets the next auto index; an existing
    /// name is replaced in place.
    pub fn append_child(&mut self, key: Option<NodeKey>, child: Node) -> OrmResult<NodeKey> {
        if child.kind() != self.accepts() {
            return Err(OrmError::structural(format!(
                "{:?} container only accepts {:?} nodes, got {:?}",
                self.kind,
                self.accepts(),
                child.kind()
            )));
        }
        let key = match key {
            Some(key) => key,
            None => {
                let key = NodeKey::Index(self.next_index);
                self.next_index += 1;
                key
            }
        };
        if let NodeKey::Index(i) = &key {
            self.next_index = self.next_index.max(i + 1);
        }
        match self.children.iter().position(|(k, _)| *k == key) {
            Some(idx) => self.children[idx].1 = child,
            None => self.children.push((key.clone(), child)),
        }
        Ok(key)
    }

    /// Append a child of the accepted kind under the next auto index.
    pub(crate) fn push(&mut self, child: Node) {
        debug_assert_eq!(child.kind(), self.accepts());
        let key = NodeKey::Index(self.next_index);
        self.next_index += 1;
        self.children.push((key, child));
    }

    pub fn get_child(&self, key: &NodeKey) -> &Node {
        self.children
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, node)| node)
            .unwrap_or(&EMPTY_NODE)
    }

    pub fn remove_child(&mut self, key: &NodeKey) -> Node {
        match self.children.iter().position(|(k, _)| k == key) {
            Some(idx) => self.children.remove(idx).1,
            None => Node::Empty,
        }
    }

    pub fn has_child(&self, key: &NodeKey) -> bool {
        self.children.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.iter().all(|(_, node)| node.is_empty())
    }

    pub fn children(&self) -> impl Iterator<Item = (&NodeKey, &Node)> {
        self.children.iter().map(|(k, n)| (k, n))
    }

    pub(crate) fn send(&self, stmt: Statement) -> OrmResult<Statement> {
        match self.kind {
            NodeKind::Tables => self.send_tables(stmt),
            NodeKind::Fields => self.send_fields(stmt),
            NodeKind::Joins => {
                let mut stmt = stmt;
                for (_, child) in &self.children {
                    if let Node::Join(join) = child {
                        let (sql, values) = join.render();
                        stmt = stmt.insert_after(&sql, " ").add_values(values);
                    }
                }
                Ok(stmt)
            }
            NodeKind::Where => Ok(self.send_filters(stmt, "WHERE")),
            NodeKind::Having => Ok(self.send_filters(stmt, "HAVING")),
            NodeKind::Group => self.send_list(stmt, "GROUP BY"),
            NodeKind::Order => self.send_list(stmt, "ORDER BY"),
            other => Err(OrmError::structural(format!("{other:?} is not a container"))),
        }
    }

    fn table_names(&self) -> Vec<&str> {
        self.children
            .iter()
            .filter_map(|(_, node)| match node {
                Node::Table(t) => Some(t.name()),
                _ => None,
            })
            .collect()
    }

    fn send_tables(&self, stmt: Statement) -> OrmResult<Statement> {
        let names = self.table_names();
        let Some(primary) = names.first() else {
            return Err(OrmError::structural(format!(
                "{} statement has no table",
                stmt.kind()
            )));
        };
        let sql = match stmt.kind() {
            StatementKind::Select => format!("FROM {}", names.join(", ")),
            StatementKind::Insert => format!("INSERT INTO {primary}"),
            StatementKind::Update => format!("UPDATE {primary}"),
            StatementKind::Delete => format!("DELETE FROM {primary}"),
        };
        Ok(stmt.insert_after(&sql, " "))
    }

    fn send_fields(&self, stmt: Statement) -> OrmResult<Statement> {
        let (list, values) = self.render_fields()?;
        let list = if list.is_empty() { "*".to_string() } else { list };
        let sql = if self.distinct {
            format!("SELECT DISTINCT {list}")
        } else {
            format!("SELECT {list}")
        };
        Ok(stmt.insert_after(&sql, " ").add_values(values))
    }

    fn send_list(&self, stmt: Statement, keyword: &str) -> OrmResult<Statement> {
        let (list, values) = self.render_fields()?;
        if list.is_empty() {
            return Ok(stmt);
        }
        Ok(stmt
            .insert_after(&format!("{keyword} {list}"), " ")
            .add_values(values))
    }

    fn render_fields(&self) -> OrmResult<(String, Vec<Value>)> {
        let mut parts = Vec::with_capacity(self.children.len());
        let mut values = Vec::new();
        for (_, child) in &self.children {
            if let Node::Field(field) = child {
                let (sql, field_values) = field.render()?;
                parts.push(sql);
                values.extend(field_values);
            }
        }
        Ok((parts.join(", "), values))
    }

    fn send_filters(&self, stmt: Statement, keyword: &str) -> Statement {
        let nodes = self.children.iter().filter_map(|(_, node)| match node {
            Node::Filter(f) => Some(f),
            _ => None,
        });
        let (sql, values) = render_filter_list(nodes);
        if sql.is_empty() {
            return stmt;
        }
        stmt.insert_after(&format!("{keyword} {sql}"), " ")
            .add_values(values)
    }
}
