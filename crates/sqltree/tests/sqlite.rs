#![cfg(feature = "sqlite")]

use sqltree::{
    CacheConfig, CacheMiddleware, Executor, OrmResult, QueryTree, Relation, RelationRegistry,
    SqliteConnection, Value, changes, filters,
};

fn executor() -> Executor {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, age INTEGER);
         CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER, title TEXT);",
    )
    .unwrap();
    Executor::new(conn).with_relations(
        RelationRegistry::new().register("users", Relation::has_many("posts", "posts", "id", "user_id")),
    )
}

fn seed(executor: &Executor) {
    let users = QueryTree::table("users");
    for (name, age) in [("Ada", 36), ("Bob", 17), ("Cy", 52)] {
        executor.insert(&users, changes! { "name" => name, "age" => age }).unwrap();
    }
    let posts = QueryTree::table("posts");
    for (user_id, title) in [(1, "Engines"), (1, "Notes"), (3, "Hello")] {
        executor
            .insert(&posts, changes! { "user_id" => user_id, "title" => title })
            .unwrap();
    }
}

#[test]
fn crud_round_trip() {
    let executor = executor();
    seed(&executor);
    assert_eq!(executor.last_insert_id(), Some(3));

    let adults = executor
        .table("users")
        .select(["name"])
        .filter(filters! { "age__ge" => 18 })
        .unwrap()
        .asc("name");
    let names: Vec<String> = executor
        .fetch_all(&adults)
        .unwrap()
        .iter()
        .map(|r| r.try_get("name").unwrap())
        .collect();
    assert_eq!(names, ["Ada", "Cy"]);

    let bob = executor.table("users").filter(filters! { "name" => "Bob" }).unwrap();
    assert_eq!(executor.update(&bob, changes! { "age" => 18 }).unwrap(), 1);
    assert_eq!(executor.fetch_all(&adults).unwrap().len(), 3);

    let ids = executor.table("users").filter(filters! { "id__in" => vec![1, 3] }).unwrap();
    assert_eq!(executor.delete(&ids).unwrap(), 2);
    assert_eq!(executor.select(&executor.table("users")).unwrap().count().unwrap(), 1);
}

#[test]
fn offset_without_limit_uses_sqlite_sentinel() {
    let executor = executor();
    seed(&executor);
    let tree = executor.table("users").asc("id").offset(1);
    let stream = executor.select(&tree).unwrap();
    assert_eq!(stream.statement().text(), "SELECT * FROM users ORDER BY id ASC LIMIT -1 OFFSET ?");
    assert_eq!(stream.count().unwrap(), 2);

    let page = executor.fetch_all(&executor.table("users").asc("id").page(2, 2).unwrap()).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].get("name"), Some(&Value::from("Cy")));
}

#[test]
fn lazy_relations_load_from_sqlite() {
    let executor = executor();
    seed(&executor);
    let users = executor.fetch_all(&executor.table("users").asc("id")).unwrap();

    assert_eq!(users[0].relation("posts").unwrap().len(), 2);
    assert!(users[1].relation("posts").unwrap().is_empty());
    let titles: Vec<String> = users[2]
        .relation("posts")
        .unwrap()
        .into_rows()
        .iter()
        .map(|r| r.try_get("title").unwrap())
        .collect();
    assert_eq!(titles, ["Hello"]);
}

#[test]
fn eager_join_reads_related_columns() {
    let executor = executor();
    seed(&executor);
    let tree = executor
        .table("users")
        .with(["posts"])
        .select(["users.name", "posts.title"])
        .filter(filters! { "posts.title__like" => "E%" })
        .unwrap();
    let rows = executor.fetch_all(&tree).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("title"), Some(&Value::from("Engines")));
}

#[test]
fn transaction_rolls_back_on_error() {
    let executor = executor();
    seed(&executor);
    let result: OrmResult<()> = executor.transaction(|tx| {
        tx.delete(&QueryTree::table("posts"))?;
        tx.insert(&QueryTree::table("users"), changes! { "age" => 1 })?;
        Ok(())
    });
    assert!(result.unwrap_err().is_backend());
    assert_eq!(executor.fetch_all(&QueryTree::table("posts")).unwrap().len(), 3);
}

#[test]
fn cache_is_flushed_by_writes() {
    let executor = executor().with_middleware(CacheMiddleware::in_memory(&CacheConfig::default()));
    seed(&executor);
    let users = QueryTree::table("users");
    assert_eq!(executor.fetch_all(&users).unwrap().len(), 3);
    executor.insert(&users, changes! { "name" => "Dee" }).unwrap();
    assert_eq!(executor.fetch_all(&users).unwrap().len(), 4);
}
