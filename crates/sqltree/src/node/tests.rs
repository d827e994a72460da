use super::*;
use crate::filter::{FilterCondition, FilterGrammar, Operator};
use crate::statement::StatementKind;
use crate::value::Value;

fn select() -> Statement {
    Statement::new(StatementKind::Select)
}

fn send(node: &Node) -> Statement {
    node.send(select(), Dialect::Generic).unwrap()
}

#[test]
fn container_rejects_foreign_kinds() {
    let mut tables = Node::container(NodeKind::Tables).unwrap();
    let err = tables
        .append_child(None, Node::field("id"))
        .unwrap_err();
    assert!(err.is_structural());
    assert!(tables.append_child(None, Node::table("users")).is_ok());
}

#[test]
fn leaf_nodes_have_no_children() {
    let mut table = Node::table("users");
    assert!(table.append_child(None, Node::table("x")).is_err());
    assert_eq!(table.get_child(&NodeKey::Index(0)), &Node::Empty);
    assert!(Node::container(NodeKind::Table).is_err());
}

#[test]
fn auto_index_and_named_keys() {
    let mut fields = Node::container(NodeKind::Fields).unwrap();
    let first = fields.append_child(None, Node::field("a")).unwrap();
    let named = fields
        .append_child(Some("total".into()), Node::field("COUNT(*) AS total"))
        .unwrap();
    let second = fields.append_child(None, Node::field("b")).unwrap();
    assert_eq!(first, NodeKey::Index(0));
    assert_eq!(named, NodeKey::Named("total".into()));
    assert_eq!(second, NodeKey::Index(1));
    assert_eq!(send(&fields).text(), "SELECT a, COUNT(*) AS total, b");

    // Re-using a name replaces in place.
    fields
        .append_child(Some("total".into()), Node::field("SUM(x) AS total"))
        .unwrap();
    assert_eq!(send(&fields).text(), "SELECT a, SUM(x) AS total, b");
}

#[test]
fn missing_and_removed_children_are_empty() {
    let mut order = Node::container(NodeKind::Order).unwrap();
    let key = order.append_child(None, Node::field("name")).unwrap();
    assert!(order.has_child(&key));
    assert_eq!(order.get_child(&NodeKey::from("nope")), &Node::Empty);

    let removed = order.remove_child(&key);
    assert_eq!(removed.kind(), NodeKind::Field);
    assert!(!order.has_child(&key));
    assert_eq!(order.remove_child(&key), Node::Empty);
    assert!(order.is_empty());
    // Empty ORDER BY sends nothing.
    assert_eq!(send(&order).text(), "");
}

#[test]
fn empty_node_send_is_identity() {
    let stmt = Statement::with_text(StatementKind::Select, "SELECT 1", vec![]);
    assert_eq!(Node::Empty.send(stmt.clone(), Dialect::Generic).unwrap(), stmt);
}

#[test]
fn fields_default_to_star_and_support_distinct() {
    let mut fields = Node::container(NodeKind::Fields).unwrap();
    assert_eq!(send(&fields).text(), "SELECT *");
    fields.as_container_mut().unwrap().set_distinct(true);
    fields.append_child(None, Node::field("city")).unwrap();
    assert_eq!(send(&fields).text(), "SELECT DISTINCT city");
}

#[test]
fn tables_render_per_statement_kind() {
    let mut tables = Node::container(NodeKind::Tables).unwrap();
    tables.append_child(None, Node::table("users")).unwrap();
    tables.append_child(None, Node::table("roles")).unwrap();

    let cases = [
        (StatementKind::Select, "FROM users, roles"),
        (StatementKind::Insert, "INSERT INTO users"),
        (StatementKind::Update, "UPDATE users"),
        (StatementKind::Delete, "DELETE FROM users"),
    ];
    for (kind, expected) in cases {
        let stmt = tables.send(Statement::new(kind), Dialect::Generic).unwrap();
        assert_eq!(stmt.text(), expected);
    }
}

#[test]
fn empty_tables_is_structural_error() {
    let tables = Node::container(NodeKind::Tables).unwrap();
    assert!(tables.send(select(), Dialect::Generic).unwrap_err().is_structural());
}

#[test]
fn where_joins_filter_nodes_by_conjunction() {
    let g = FilterGrammar::default();
    let mut where_ = Node::container(NodeKind::Where).unwrap();
    where_
        .append_child(
            None,
            FilterNode::parse(&g, [("a", 1), ("b", 2)]).unwrap().into(),
        )
        .unwrap();
    where_
        .append_child(
            None,
            FilterNode::parse(&g, [("c__gt", 3)])
                .unwrap()
                .with_conjunction(crate::filter::Conjunction::Or)
                .into(),
        )
        .unwrap();
    let stmt = send(&where_);
    assert_eq!(stmt.text(), "WHERE (a = ? OR b = ?) OR c > ?");
    assert_eq!(stmt.values(), &[Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[test]
fn join_renders_on_conditions() {
    let g = FilterGrammar::default();
    let join = JoinNode::new(JoinKind::Left, "posts")
        .on_columns("users.id", "posts.user_id")
        .on(FilterNode::parse(&g, [("posts.published", true)]).unwrap());
    let stmt = send(&Node::Join(join));
    assert_eq!(
        stmt.text(),
        "LEFT JOIN posts ON users.id = posts.user_id AND posts.published = ?"
    );
    assert_eq!(stmt.values(), &[Value::Bool(true)]);
}

#[test]
fn case_field_binds_then_and_else_values() {
    let cond = FilterCondition::new("age", Operator::Lt, 18).unwrap();
    let case = CaseNode::new()
        .when_condition(cond, "minor")
        .otherwise("adult")
        .alias("bracket");
    let stmt = send(&Node::field(case));
    assert_eq!(stmt.text(), "CASE WHEN age < ? THEN ? ELSE ? END AS bracket");
    assert_eq!(
        stmt.values(),
        &[Value::Int(18), Value::from("minor"), Value::from("adult")]
    );
    assert!(Node::field(CaseNode::new()).send(select(), Dialect::Generic).is_err());
}

#[test]
fn subquery_field_splices_values() {
    let sub = Statement::with_text(
        StatementKind::Select,
        "SELECT COUNT(*) FROM posts WHERE posts.user_id = users.id AND posts.score > ?",
        vec![Value::Int(10)],
    );
    let stmt = send(&Node::field(FieldNode::subquery(sub, "hot_posts")));
    assert!(stmt.text().ends_with(") AS hot_posts"));
    assert_eq!(stmt.values(), &[Value::Int(10)]);
}

#[test]
fn change_node_for_insert_and_update() {
    let change = Node::Change(ChangeNode::from_pairs([("name", Value::from("Bob")), ("age", Value::Int(3))]));
    let insert = change.send(Statement::new(StatementKind::Insert), Dialect::Generic).unwrap();
    assert_eq!(insert.text(), "(name, age) VALUES (?, ?)");
    let update = change.send(Statement::new(StatementKind::Update), Dialect::Generic).unwrap();
    assert_eq!(update.text(), "SET name = ?, age = ?");
    assert_eq!(update.values(), &[Value::from("Bob"), Value::Int(3)]);

    let empty = Node::Change(ChangeNode::new());
    assert!(empty.send(Statement::new(StatementKind::Update), Dialect::Generic).is_err());
    assert!(change.send(select(), Dialect::Generic).is_err());
}

#[test]
fn limit_defers_to_dialect() {
    let limit = Node::Limit(LimitNode::new(Some(10), Some(5)));
    let generic = limit.send(select(), Dialect::Generic).unwrap();
    assert_eq!(generic.text(), "LIMIT ? OFFSET ?");
    let mysql = limit.send(select(), Dialect::MySql).unwrap();
    assert_eq!(mysql.text(), "LIMIT ?, ?");
    assert_eq!(mysql.values(), &[Value::Int(5), Value::Int(10)]);
}

#[test]
fn cloned_nodes_do_not_share_children() {
    let mut a = Node::container(NodeKind::Group).unwrap();
    a.append_child(None, Node::field("x")).unwrap();
    let mut b = a.clone();
    b.append_child(None, Node::field("y")).unwrap();
    assert_eq!(send(&a).text(), "GROUP BY x");
    assert_eq!(send(&b).text(), "GROUP BY x, y");
}
