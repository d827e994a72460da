//! # sqltree
//!
//! A composable SQL query builder with a middleware execution pipeline.
//!
//! ## Features
//!
//! - **Immutable query trees**: every builder call returns a new [`QueryTree`]; a base query can be reused freely
//! - **Filter grammar**: `"field__op"` keys (`eq`, `ne`, `gt`, `lt`, `ge`, `le`, `in`, `between`, `like`, `eqf`)
//! - **Parameterized output**: statements carry `?` placeholders and an ordered bind list
//! - **Dialects**: limit/offset rendering for generic SQL, Postgres, MySQL, SQL Server and SQLite
//! - **Middleware**: caching, validation, logging and statistics around every statement
//! - **Relations**: join-loaded through `with(...)` or resolved lazily per row
//!
//! ## Example
//!
//! ```ignore
//! use sqltree::{filters, Executor, QueryTree, SqliteConnection};
//!
//! let executor = Executor::new(SqliteConnection::open_in_memory()?);
//!
//! let adults = executor
//!     .table("users")
//!     .select(["id", "name"])
//!     .filter(filters! { "age__ge" => 18 })?
//!     .desc("created_at")
//!     .limit(10);
//!
//! for row in executor.select(&adults)?.iter() {
//!     let row = row?;
//!     println!("{}", row.try_get::<String>("name")?);
//! }
//!
//! executor.update(
//!     &QueryTree::table("users").filter(filters! { "id" => 5 })?,
//!     sqltree::changes! { "name" => "Bob" },
//! )?;
//! ```

#[macro_use]
mod macros;

pub mod client;
pub mod config;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod filter;
pub mod middleware;
pub mod node;
pub mod relation;
pub mod row;
pub mod statement;
pub mod stream;
pub mod tree;
pub mod value;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use client::{Connection, RowIter};
pub use config::{CacheConfig, ExecutorConfig};
pub use dialect::Dialect;
pub use error::{OrmError, OrmResult};
pub use executor::{Executor, RowMapper};
pub use filter::{
    Conjunction, FilterCondition, FilterGrammar, FilterGrammarBuilder, FilterNode, FilterScope,
    FilterValue, Operator,
};
pub use middleware::{
    CacheMiddleware, CacheStore, HookAction, LoggingMiddleware, MemoryStore, Middleware, Pipeline,
    QueryResult, QueryStats, RelationMiddleware, Rule, StatsMiddleware, ValidationMiddleware,
};
pub use node::{
    CaseNode, ChangeNode, ContainerNode, FieldNode, JoinKind, JoinNode, LimitNode, Node, NodeKey,
    NodeKind, SortDirection, TableNode,
};
pub use relation::{LazyRelation, Relation, RelationKind, RelationRegistry, RelationValue};
pub use row::{FromRow, Row};
pub use statement::{Statement, StatementKind};
pub use stream::{GroupedRows, ResultStream, Rows};
pub use tree::{QueryTree, Slot};
pub use value::{FromValue, Value};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConnection;
