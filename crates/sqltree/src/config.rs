//! Executor and cache configuration.
//!
//! Both structs deserialize from TOML; every key is optional.
//!
//! ```toml
//! dialect = "postgres"
//! slow_query_threshold_ms = 250
//! max_sql_log_length = 500
//! strict_placeholders = true
//!
//! [cache]
//! prefix = "app:"
//! capacity = 4096
//! ```

use crate::dialect::Dialect;
use crate::error::OrmResult;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Settings for an [`Executor`](crate::Executor).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Overrides the dialect reported by the connection.
    #[serde(deserialize_with = "deserialize_dialect")]
    pub dialect: Option<Dialect>,
    /// Statements at or above this duration are logged as slow.
    pub slow_query_threshold_ms: Option<u64>,
    /// Truncate logged SQL to this many bytes. `None` logs the full text.
    pub max_sql_log_length: Option<usize>,
    /// Refuse statements whose placeholder count differs from their value count.
    pub strict_placeholders: bool,
    /// In-memory result cache installed by `Executor::with_config`; `None` leaves caching off.
    pub cache: Option<CacheConfig>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            dialect: None,
            slow_query_threshold_ms: None,
            max_sql_log_length: Some(200),
            strict_placeholders: true,
            cache: None,
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> OrmResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold_ms = Some(u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_max_sql_log_length(mut self, len: Option<usize>) -> Self {
        self.max_sql_log_length = len;
        self
    }

    pub fn with_strict_placeholders(mut self, strict: bool) -> Self {
        self.strict_placeholders = strict;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn slow_query_threshold(&self) -> Option<Duration> {
        self.slow_query_threshold_ms.map(Duration::from_millis)
    }
}

/// Settings for [`CacheMiddleware`](crate::middleware::CacheMiddleware) and
/// [`MemoryStore`](crate::middleware::MemoryStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Prepended to every cache key.
    pub prefix: String,
    /// Maximum number of cached statements held by a `MemoryStore`.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "sqltree:".to_string(),
            capacity: 1024,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

// Accept the same aliases as `Dialect::from_str` ("pg", "mssql", ...).
fn deserialize_dialect<'de, D>(deserializer: D) -> Result<Option<Dialect>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| s.parse::<Dialect>().map_err(serde::de::Error::custom))
        .transpose()
}
