use super::types::{Middleware, QueryResult, Timed};
use crate::statement::{Statement, StatementKind};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Collects execution counters. Share it through an `Arc` to read snapshots.
///
/// ```ignore
/// let stats = Arc::new(StatsMiddleware::new());
/// let executor = Executor::new(conn).with_middleware_arc(stats.clone());
/// // ...
/// println!("{:?}", stats.stats());
/// ```
#[derive(Debug, Default)]
pub struct StatsMiddleware {
    total_queries: AtomicU64,
    failed_queries: AtomicU64,
    cache_hits: AtomicU64,
    total_duration_nanos: AtomicU64,
    select_count: AtomicU64,
    insert_count: AtomicU64,
    update_count: AtomicU64,
    delete_count: AtomicU64,
    max_duration_nanos: AtomicU64,
    slowest_query: Mutex<Option<String>>,
}

/// Snapshot of [`StatsMiddleware`] counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    /// Executions observed, cache hits included.
    pub total_queries: u64,
    pub failed_queries: u64,
    /// Selects served by a cache provider.
    pub cache_hits: u64,
    pub total_duration: Duration,
    pub select_count: u64,
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
    pub max_duration: Duration,
    /// SQL of the slowest statement.
    pub slowest_query: Option<String>,
}

impl StatsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current statistics.
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_duration_nanos.load(Ordering::Relaxed)),
            select_count: self.select_count.load(Ordering::Relaxed),
            insert_count: self.insert_count.load(Ordering::Relaxed),
            update_count: self.update_count.load(Ordering::Relaxed),
            delete_count: self.delete_count.load(Ordering::Relaxed),
            max_duration: Duration::from_nanos(self.max_duration_nanos.load(Ordering::Relaxed)),
            slowest_query: self.slowest_query.lock().clone(),
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        for counter in [
            &self.total_queries,
            &self.failed_queries,
            &self.cache_hits,
            &self.total_duration_nanos,
            &self.select_count,
            &self.insert_count,
            &self.update_count,
            &self.delete_count,
            &self.max_duration_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.slowest_query.lock() = None;
    }

    fn kind_counter(&self, kind: StatementKind) -> &AtomicU64 {
        match kind {
            StatementKind::Select => &self.select_count,
            StatementKind::Insert => &self.insert_count,
            StatementKind::Update => &self.update_count,
            StatementKind::Delete => &self.delete_count,
        }
    }
}

impl Middleware for StatsMiddleware {
    fn name(&self) -> &str {
        "stats"
    }

    fn as_timed(&self) -> Option<&dyn Timed> {
        Some(self)
    }
}

impl Timed for StatsMiddleware {
    fn after_execute(&self, stmt: &Statement, elapsed: Duration, result: &QueryResult) {
        let duration_nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);

        self.total_queries.fetch_add(1, Ordering::Relaxed);
        self.kind_counter(stmt.kind()).fetch_add(1, Ordering::Relaxed);
        let prev_total = self
            .total_duration_nanos
            .fetch_add(duration_nanos, Ordering::Relaxed);
        if prev_total.checked_add(duration_nanos).is_none() {
            self.total_duration_nanos.store(u64::MAX, Ordering::Relaxed);
        }

        match result {
            QueryResult::Error(_) => {
                self.failed_queries.fetch_add(1, Ordering::Relaxed);
            }
            QueryResult::Cached(_) => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        // Only the thread that raises the max records the statement.
        let mut current_max = self.max_duration_nanos.load(Ordering::Relaxed);
        while duration_nanos > current_max {
            match self.max_duration_nanos.compare_exchange_weak(
                current_max,
                duration_nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    *self.slowest_query.lock() = Some(stmt.text().to_string());
                    break;
                }
                Err(updated) => current_max = updated,
            }
        }
    }
}
