//! Tests for the filter grammar and filter nodes.

use super::*;
use crate::error::OrmError;
use crate::filters;
use crate::statement::{Statement, StatementKind};
use crate::value::Value;

fn grammar() -> FilterGrammar {
    FilterGrammar::default()
}

fn render_one(key: &str, value: impl Into<FilterValue>) -> (String, Vec<Value>) {
    FilterCondition::parse(&grammar(), key, value).unwrap().render()
}

#[test]
fn key_without_suffix_is_equality() {
    let (field, op) = grammar().parse_key("name").unwrap();
    assert_eq!(field, "name");
    assert_eq!(op, Operator::Eq);
}

#[test]
fn key_splits_on_last_separator() {
    let (field, op) = grammar().parse_key("users.created__at__ge").unwrap();
    assert_eq!(field, "users.created__at");
    assert_eq!(op, Operator::Ge);
}

#[test]
fn unknown_operator_names_the_token() {
    let err = grammar().parse_key("age__gte").unwrap_err();
    assert!(matches!(err, OrmError::UnknownFilterOperator(ref t) if t == "gte"));
    assert!(err.is_grammar());
}

#[test]
fn builder_aliases_extend_the_table() {
    let grammar = FilterGrammar::builder()
        .alias("gte", Operator::Ge)
        .build()
        .unwrap();
    assert_eq!(grammar.parse_key("age__gte").unwrap(), ("age", Operator::Ge));
    // Default table is untouched.
    assert!(FilterGrammar::default().parse_key("age__gte").is_err());
}

#[test]
fn custom_separator() {
    let grammar = FilterGrammar::builder().separator(":").build().unwrap();
    assert_eq!(grammar.parse_key("age:lt").unwrap(), ("age", Operator::Lt));
    assert!(FilterGrammar::builder().separator("").build().is_err());
}

#[test]
fn comparison_operators_render_one_placeholder() {
    let cases = [
        ("a", "a = ?"),
        ("a__eq", "a = ?"),
        ("a__ne", "a != ?"),
        ("a__gt", "a > ?"),
        ("a__lt", "a < ?"),
        ("a__ge", "a >= ?"),
        ("a__le", "a <= ?"),
        ("a__like", "a LIKE ?"),
    ];
    for (key, expected) in cases {
        let (sql, values) = render_one(key, 1);
        assert_eq!(sql, expected, "key {key}");
        assert_eq!(values, vec![Value::Int(1)]);
    }
}

#[test]
fn between_renders_two_values() {
    let (sql, values) = render_one("age__between", [18, 65]);
    assert_eq!(sql, "(age between ? AND ?)");
    assert_eq!(values, vec![Value::Int(18), Value::Int(65)]);
}

#[test]
fn between_rejects_wrong_arity() {
    for operand in [vec![18], vec![1, 2, 3]] {
        let err = FilterCondition::parse(&grammar(), "age__between", operand).unwrap_err();
        assert!(matches!(err, OrmError::Grammar(_)));
    }
    let err = FilterCondition::parse(&grammar(), "age__between", 18).unwrap_err();
    assert!(err.is_grammar());
}

#[test]
fn in_list_expands_placeholders() {
    let (sql, values) = render_one("id__in", vec![1, 2, 3]);
    assert_eq!(sql, "id in (?, ?, ?)");
    assert_eq!(values.len(), 3);

    let (sql, values) = render_one("id__in", 9);
    assert_eq!(sql, "id in (?)");
    assert_eq!(values, vec![Value::Int(9)]);
}

#[test]
fn empty_in_list_is_always_false() {
    let (sql, values) = render_one("id__in", Vec::<i64>::new());
    assert_eq!(sql, "1=0");
    assert!(values.is_empty());
}

#[test]
fn in_subquery_splices_values() {
    let sub = Statement::with_text(
        StatementKind::Select,
        "SELECT user_id FROM orders WHERE total > ?",
        vec![Value::Int(100)],
    );
    let (sql, values) = render_one("id__in", sub);
    assert_eq!(sql, "id in (SELECT user_id FROM orders WHERE total > ?)");
    assert_eq!(values, vec![Value::Int(100)]);
}

#[test]
fn in_subquery_must_be_select() {
    let sub = Statement::with_text(StatementKind::Delete, "DELETE FROM t", vec![]);
    assert!(FilterCondition::parse(&grammar(), "id__in", sub).is_err());
}

#[test]
fn eqf_binds_nothing() {
    let (sql, values) = render_one("users.id__eqf", FilterValue::field("posts.user_id"));
    assert_eq!(sql, "users.id = posts.user_id");
    assert!(values.is_empty());
}

#[test]
fn operand_shape_is_checked_at_parse_time() {
    let g = grammar();
    assert!(FilterCondition::parse(&g, "a__eq", vec![1, 2]).is_err());
    assert!(FilterCondition::parse(&g, "a__eqf", 1).is_err());
    assert!(FilterCondition::parse(&g, "a__like", FilterValue::field("b")).is_err());
    let sub = Statement::new(StatementKind::Select);
    assert!(FilterCondition::parse(&g, "a__like", sub).is_err());
}

#[test]
fn one_parse_call_joins_with_or() {
    let node = FilterNode::parse(&grammar(), filters! { "name__eq" => "Alice", "age__ge" => 21 })
        .unwrap();
    let (sql, values) = node.render().unwrap();
    assert_eq!(sql, "name = ? OR age >= ?");
    assert_eq!(values, vec![Value::from("Alice"), Value::Int(21)]);
    let (wrapped, _) = node.render_wrapped().unwrap();
    assert_eq!(wrapped, "(name = ? OR age >= ?)");
}

#[test]
fn single_part_is_not_parenthesized() {
    let node = FilterNode::parse(&grammar(), [("id", 1)]).unwrap();
    assert_eq!(node.render_wrapped().unwrap().0, "id = ?");
}

#[test]
fn nested_groups_keep_requested_conjunctions() {
    let g = grammar();
    let node = FilterNode::parse(&g, [("status", "active")])
        .unwrap()
        .or_group(&g, |s| s.condition("role", "admin")?.condition("level__gt", 3))
        .unwrap();
    let (sql, values) = node.render().unwrap();
    assert_eq!(sql, "status = ? OR (role = ? AND level > ?)");
    assert_eq!(values.len(), 3);
}

#[test]
fn empty_groups_are_dropped() {
    let g = grammar();
    let node = FilterNode::parse(&g, [("id", 1)])
        .unwrap()
        .and_group(&g, |s| Ok(s))
        .unwrap();
    assert_eq!(node.effective_len(), 1);
    assert_eq!(node.render_wrapped().unwrap().0, "id = ?");
    assert!(FilterNode::new().render().is_none());
}

#[test]
fn raw_fragment_counts_placeholders() {
    let node = FilterNode::new()
        .push_raw(Conjunction::And, "lower(email) = ?", ["a@b.c"])
        .unwrap();
    assert_eq!(node.render().unwrap().0, "lower(email) = ?");

    let err = FilterNode::new()
        .push_raw(Conjunction::And, "a = ? AND b = ?", [1])
        .unwrap_err();
    assert!(err.is_structural());
}

#[test]
fn placeholders_match_values_for_mixed_tree() {
    let g = grammar();
    let node = FilterNode::parse(&g, filters! { "a__in" => [1, 2], "b__between" => [3, 4] })
        .unwrap()
        .and_group(&g, |s| {
            s.filter(filters! { "c__eqf" => FilterValue::field("d"), "e__like" => "%x%" })
        })
        .unwrap();
    let (sql, values) = node.render().unwrap();
    let stmt = Statement::with_text(StatementKind::Select, sql, values);
    assert!(stmt.check_placeholders().is_ok());
    assert_eq!(stmt.value_count(), 5);
}
