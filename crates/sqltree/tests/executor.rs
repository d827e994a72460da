mod common;

use common::{ScriptedConnection, row};
use sqltree::{
    CacheConfig, CacheMiddleware, Dialect, Executor, ExecutorConfig, HookAction, Middleware,
    OrmError, OrmResult, QueryTree, Statement, StatementKind, StatsMiddleware, ValidationMiddleware,
    Value, changes, filters,
};
use std::sync::Arc;

fn users() -> Vec<sqltree::Row> {
    vec![
        row([("id", Value::Int(1)), ("name", Value::from("Ada")), ("city", Value::from("London"))]),
        row([("id", Value::Int(2)), ("name", Value::from("Bob")), ("city", Value::from("Paris"))]),
        row([("id", Value::Int(3)), ("name", Value::from("Cy")), ("city", Value::from("London"))]),
    ]
}

#[test]
fn cached_select_hits_backend_once_until_a_mutation() {
    let conn = Arc::new(ScriptedConnection::new().on("FROM users", users()));
    let executor = Executor::from_arc(conn.clone())
        .with_middleware(CacheMiddleware::in_memory(&CacheConfig::default()));
    let query = QueryTree::table("users").filter(filters! { "city" => "London" }).unwrap();

    let first = executor.fetch_all(&query).unwrap();
    let second = executor.fetch_all(&query).unwrap();
    assert_eq!(first, second);
    assert_eq!(conn.calls_matching("SELECT"), 1);

    executor
        .insert(&QueryTree::table("users"), changes! { "name" => "Dee" })
        .unwrap();
    executor.fetch_all(&query).unwrap();
    assert_eq!(conn.calls_matching("SELECT"), 2);
}

#[test]
fn cache_section_in_config_enables_caching() {
    let conn = Arc::new(ScriptedConnection::new().on("FROM users", users()));
    let config = ExecutorConfig::from_toml_str("[cache]\nprefix = \"app:\"\ncapacity = 16\n").unwrap();
    let executor = Executor::from_arc(conn.clone()).with_config(config);
    assert!(executor.pipeline().has_cache());

    let query = QueryTree::table("users");
    executor.fetch_all(&query).unwrap();
    executor.fetch_all(&query).unwrap();
    assert_eq!(conn.calls_matching("SELECT"), 1);

    let again = executor.with_config(ExecutorConfig::new().with_cache(CacheConfig::default()));
    assert_eq!(again.pipeline().len(), 1);
}

#[test]
fn cached_non_finite_floats_read_back() {
    let conn = Arc::new(ScriptedConnection::new().on("FROM m", vec![row([("x", Value::Float(f64::INFINITY))])]));
    let executor = Executor::from_arc(conn.clone())
        .with_config(ExecutorConfig::new().with_cache(CacheConfig::default()));
    let query = QueryTree::table("m");

    let live = executor.fetch_all(&query).unwrap();
    let cached = executor.fetch_all(&query).unwrap();
    assert_eq!(live, cached);
    assert_eq!(cached[0].get("x"), Some(&Value::Float(f64::INFINITY)));
    assert_eq!(conn.calls_matching("SELECT"), 1);
}

#[test]
fn different_bind_values_do_not_share_cache_entries() {
    let conn = Arc::new(ScriptedConnection::new().on("FROM users", users()));
    let executor = Executor::from_arc(conn.clone())
        .with_middleware(CacheMiddleware::in_memory(&CacheConfig::default()));
    let base = QueryTree::table("users");

    executor.fetch_all(&base.filter(filters! { "id" => 1 }).unwrap()).unwrap();
    executor.fetch_all(&base.filter(filters! { "id" => 2 }).unwrap()).unwrap();
    assert_eq!(conn.calls_matching("SELECT"), 2);
}

#[test]
fn update_compiles_set_before_where() {
    let conn = Arc::new(ScriptedConnection::new());
    let executor = Executor::from_arc(conn.clone());
    let tree = QueryTree::new().from("items").filter(filters! { "id__eq" => 5 }).unwrap();

    assert_eq!(executor.update(&tree, changes! { "name" => "Bob" }).unwrap(), 1);
    let (sql, params) = conn.calls().pop().unwrap();
    assert_eq!(sql, "UPDATE items SET name = ? WHERE id = ?");
    assert_eq!(params, vec![Value::from("Bob"), Value::Int(5)]);
}

#[test]
fn validation_blocks_before_the_backend() {
    let conn = Arc::new(ScriptedConnection::new());
    let executor = Executor::from_arc(conn.clone())
        .with_middleware(ValidationMiddleware::new().required("users", "name"));

    let err = executor
        .insert(&QueryTree::table("users"), changes! { "age" => 30 })
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(conn.call_count(), 0);

    executor
        .insert(&QueryTree::table("users"), changes! { "name" => "Ada" })
        .unwrap();
    assert_eq!(conn.call_count(), 1);
}

struct ReadOnly;

impl Middleware for ReadOnly {
    fn invoke(&self, stmt: &Statement) -> OrmResult<HookAction> {
        if stmt.kind().is_mutation() {
            Ok(HookAction::Abort("read-only replica".into()))
        } else {
            Ok(HookAction::Continue)
        }
    }
}

#[test]
fn hook_abort_surfaces_as_validation_error() {
    let conn = Arc::new(ScriptedConnection::new());
    let executor = Executor::from_arc(conn.clone()).with_middleware(ReadOnly);

    let err = executor.delete(&QueryTree::table("users")).unwrap_err();
    assert!(matches!(err, OrmError::Validation(ref msg) if msg.contains("read-only replica")));
    assert_eq!(conn.call_count(), 0);
    assert!(executor.fetch_all(&QueryTree::table("users")).is_ok());
}

#[test]
fn stats_observe_streamed_cached_and_failed_executions() {
    let conn = Arc::new(ScriptedConnection::new().on("FROM users", users()));
    let stats = Arc::new(StatsMiddleware::new());
    let executor = Executor::from_arc(conn)
        .with_middleware_arc(stats.clone())
        .with_middleware(CacheMiddleware::in_memory(&CacheConfig::default()));

    let query = QueryTree::table("users");
    executor.fetch_all(&query).unwrap();
    executor.fetch_all(&query).unwrap();
    let err = executor.fetch_all(&QueryTree::table("FAIL")).unwrap_err();
    assert!(err.is_backend());

    let snapshot = stats.stats();
    assert_eq!(snapshot.total_queries, 3);
    assert_eq!(snapshot.select_count, 3);
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.failed_queries, 1);
}

#[test]
fn stream_is_lazy_and_restartable() {
    let conn = Arc::new(ScriptedConnection::new().on("FROM users", users()));
    let executor = Executor::from_arc(conn.clone());
    let stream = executor.select(&QueryTree::table("users")).unwrap();
    assert_eq!(stream.statement().text(), "SELECT * FROM users");
    assert_eq!(conn.call_count(), 0);

    assert_eq!(stream.count().unwrap(), 3);
    assert_eq!(stream.first().unwrap().unwrap().get("name"), Some(&Value::from("Ada")));
    assert_eq!(stream.last().unwrap().unwrap().get("name"), Some(&Value::from("Cy")));
    assert_eq!(conn.call_count(), 3);
}

#[test]
fn group_by_keeps_first_seen_order() {
    let conn = Arc::new(ScriptedConnection::new().on("FROM users", users()));
    let executor = Executor::from_arc(conn);
    let stream = executor.select(&QueryTree::table("users")).unwrap();

    let grouped = stream.group_by("city").unwrap();
    let keys: Vec<_> = grouped.keys().cloned().collect();
    assert_eq!(keys, vec![Value::from("London"), Value::from("Paris")]);
    let london: Vec<_> = grouped
        .get(&Value::from("London"))
        .unwrap()
        .iter()
        .map(|r| r.try_get::<i64>("id").unwrap())
        .collect();
    assert_eq!(london, vec![1, 3]);

    let by_len = stream
        .group_by_key(|r| r.try_get::<String>("name").map(|n| n.len()).unwrap_or(0))
        .unwrap();
    assert_eq!(by_len.keys().copied().collect::<Vec<_>>(), vec![3, 2]);
}

#[test]
fn mappers_run_in_registration_order() {
    let conn = Arc::new(ScriptedConnection::new().on("FROM users", users()));
    let executor = Executor::from_arc(conn).with_mapper(|mut row| {
        row.set("tag", "a");
        Ok(row)
    });
    let stream = executor
        .select(&QueryTree::table("users"))
        .unwrap()
        .map_rows(|mut row| {
            let tag = row.try_get::<String>("tag")?;
            row.set("tag", format!("{tag}b"));
            Ok(row)
        });

    let json = stream.to_json().unwrap();
    assert_eq!(json[0]["tag"], "ab");
    assert_eq!(json[0]["name"], "Ada");
    assert_eq!(json.as_array().map(Vec::len), Some(3));
}

#[derive(Debug, serde::Deserialize, PartialEq)]
struct User {
    id: i64,
    name: String,
}

impl sqltree::FromRow for User {
    fn from_row(row: &sqltree::Row) -> OrmResult<Self> {
        row.deserialize()
    }
}

#[test]
fn all_as_maps_rows_into_types() {
    let conn = Arc::new(ScriptedConnection::new().on("FROM users", users()));
    let executor = Executor::from_arc(conn);
    let users: Vec<User> = executor.select(&QueryTree::table("users")).unwrap().all_as().unwrap();
    assert_eq!(users[1], User { id: 2, name: "Bob".into() });
}

#[test]
fn fetch_one_forces_limit_and_uses_executor_dialect() {
    let conn = Arc::new(ScriptedConnection::new().on("FROM users", users()));
    let executor = Executor::from_arc(conn.clone())
        .with_config(ExecutorConfig::new().with_dialect(Dialect::SqlServer));
    let row = executor.fetch_one(&QueryTree::table("users").asc("id")).unwrap();
    assert!(row.is_some());

    let (sql, params) = conn.calls().pop().unwrap();
    assert_eq!(sql, "SELECT * FROM users ORDER BY id ASC OFFSET 0 ROWS FETCH NEXT ? ROWS ONLY");
    assert_eq!(params, vec![Value::Int(1)]);
}

#[test]
fn strict_placeholders_reject_drifted_statements() {
    let conn = Arc::new(ScriptedConnection::new());
    let executor = Executor::from_arc(conn.clone());
    let drifted = Statement::with_text(StatementKind::Delete, "DELETE FROM t WHERE id = ?", vec![]);

    assert!(executor.execute_statement(drifted.clone()).unwrap_err().is_structural());
    assert_eq!(conn.call_count(), 0);

    let lenient = executor.with_config(ExecutorConfig::new().with_strict_placeholders(false));
    assert_eq!(lenient.execute_statement(drifted).unwrap(), 1);
}

#[test]
fn fetch_statement_returns_raw_rows() {
    let conn = Arc::new(ScriptedConnection::new().on("FROM users", users()));
    let executor = Executor::from_arc(conn);
    let stmt = Statement::with_text(StatementKind::Select, "SELECT * FROM users", vec![]);
    assert_eq!(executor.fetch_statement(stmt).unwrap().len(), 3);
}

#[test]
fn transaction_commits_or_rolls_back() {
    let conn = Arc::new(ScriptedConnection::new());
    let executor = Executor::from_arc(conn.clone());

    let n = executor
        .transaction(|tx| tx.delete(&QueryTree::table("sessions")))
        .unwrap();
    assert_eq!(n, 1);

    let err = executor
        .transaction(|tx| -> OrmResult<()> {
            tx.delete(&QueryTree::table("sessions"))?;
            Err(OrmError::validation("stop"))
        })
        .unwrap_err();
    assert!(err.is_validation());

    let log: Vec<String> = conn.calls().into_iter().map(|(sql, _)| sql).collect();
    assert_eq!(
        log,
        vec![
            "BEGIN",
            "DELETE FROM sessions",
            "COMMIT",
            "BEGIN",
            "DELETE FROM sessions",
            "ROLLBACK"
        ]
    );
}

#[test]
fn nested_begin_reports_backend_error() {
    let executor = Executor::new(ScriptedConnection::new());
    executor.begin().unwrap();
    assert!(executor.begin().unwrap_err().is_backend());
    executor.commit().unwrap();
    assert!(executor.commit().unwrap_err().is_backend());
}
