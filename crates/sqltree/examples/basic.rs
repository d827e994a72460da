//! Basic usage example for sqltree
//!
//! Run with: cargo run --example basic -p sqltree
//!
//! Set RUST_LOG=sqltree.sql=debug to see every executed statement.

use sqltree::{
    CacheConfig, CacheMiddleware, Executor, LoggingMiddleware, OrmError, QueryTree, Relation,
    RelationRegistry, SqliteConnection, StatsMiddleware, ValidationMiddleware, changes, filters,
};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), OrmError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let conn = SqliteConnection::open_in_memory()?;
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, email TEXT, age INTEGER);
         CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER, title TEXT);",
    )?;

    let stats = Arc::new(StatsMiddleware::new());
    let executor = Executor::new(conn)
        .with_middleware(LoggingMiddleware::new().slow_threshold(Duration::from_millis(50)))
        .with_middleware(
            ValidationMiddleware::new()
                .required("users", "name")
                .email("users", "email"),
        )
        .with_middleware(CacheMiddleware::in_memory(&CacheConfig::default()))
        .with_middleware_arc(stats.clone())
        .with_relations(
            RelationRegistry::new()
                .register("users", Relation::has_many("posts", "posts", "id", "user_id")),
        );

    // ============================================
    // Insert
    // ============================================
    println!("=== Insert ===");

    let users = QueryTree::table("users");
    for (name, email, age) in [
        ("alice", "alice@example.com", 31),
        ("bob", "bob@example.com", 17),
        ("carol", "carol@example.com", 45),
    ] {
        executor.insert(&users, changes! { "name" => name, "email" => email, "age" => age })?;
    }
    for (user_id, title) in [(1, "Hello"), (1, "Second post"), (3, "Notes")] {
        executor.insert(
            &QueryTree::table("posts"),
            changes! { "user_id" => user_id, "title" => title },
        )?;
    }

    match executor.insert(&users, changes! { "name" => "dave", "email" => "not-an-email" }) {
        Err(e) => println!("rejected: {e}"),
        Ok(_) => println!("unexpectedly accepted"),
    }

    // ============================================
    // Select with filters and lazy relations
    // ============================================
    println!("\n=== Adults and their posts ===");

    let adults = executor
        .table("users")
        .filter(filters! { "age__ge" => 18 })?
        .asc("name");
    println!("SQL: {}", executor.select(&adults)?.statement());

    for row in executor.select(&adults)?.iter() {
        let row = row?;
        let name: String = row.try_get("name")?;
        let posts = row.relation("posts")?;
        println!("{name}: {} post(s)", posts.len());
    }

    // ============================================
    // Update, grouping, JSON
    // ============================================
    println!("\n=== Update ===");

    let bob = executor.table("users").filter(filters! { "name" => "bob" })?;
    let affected = executor.update(&bob, changes! { "age" => 18 })?;
    println!("updated {affected} row(s)");

    let everyone = executor.select(&executor.table("users"))?;
    let by_age = everyone.group_by_key(|row| row.try_get::<i64>("age").map(|a| a >= 18).unwrap_or(false))?;
    for (adult, rows) in by_age.iter() {
        println!("adult={adult}: {}", rows.len());
    }
    println!("{}", serde_json::to_string_pretty(&everyone.to_json()?)?);

    // ============================================
    // Transactions
    // ============================================
    println!("\n=== Transaction ===");

    let result = executor.transaction(|tx| {
        tx.delete(&QueryTree::table("posts"))?;
        Err::<(), _>(OrmError::validation("changed my mind"))
    });
    println!("transaction: {result:?}");
    println!("posts left: {}", executor.select(&QueryTree::table("posts"))?.count()?);

    println!("\n=== Stats ===");
    println!("{:#?}", stats.stats());

    Ok(())
}
