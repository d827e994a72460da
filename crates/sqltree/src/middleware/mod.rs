//! Statement middleware: hooks that see every compiled statement before it
//! reaches the backend.
//!
//! A middleware implements [`Middleware::invoke`] and opts into extra
//! capabilities through its `as_*` accessors:
//!
//! - [`CacheProvider`]: serve Selects without touching the backend
//! - [`Timed`]: observe every execution with its elapsed time
//! - [`ChangeValidator`]: reject INSERT/UPDATE payloads before compilation
//! - [`RelationProvider`]: contribute relation declarations
//!
//! # Example
//!
//! ```rust,ignore
//! use sqltree::middleware::{CacheMiddleware, LoggingMiddleware, StatsMiddleware};
//! use sqltree::config::CacheConfig;
//!
//! let stats = Arc::new(StatsMiddleware::new());
//! let executor = Executor::new(conn)
//!     .with_middleware(LoggingMiddleware::new().slow_threshold(Duration::from_millis(200)))
//!     .with_middleware(CacheMiddleware::in_memory(&CacheConfig::default()))
//!     .with_middleware_arc(stats.clone());
//! ```

pub mod cache;
mod logging;
mod pipeline;
mod relations;
mod stats;
mod types;
mod validation;


pub use cache::{CacheMiddleware, CacheStore, MemoryStore};
pub use logging::LoggingMiddleware;
pub use pipeline::Pipeline;
pub use relations::RelationMiddleware;
pub use stats::{QueryStats, StatsMiddleware};
pub use types::{
    CacheProvider, ChangeValidator, HookAction, Middleware, QueryResult, RelationProvider, Timed,
};
pub use validation::{Rule, ValidationMiddleware};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
