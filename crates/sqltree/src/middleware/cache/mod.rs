//! Result caching for Select statements.
//!
//! The cache has no dependency tracking: any INSERT, UPDATE or DELETE that
//! passes through [`CacheMiddleware`] flushes the whole store.

mod memory;

pub use memory::MemoryStore;

use super::types::{CacheProvider, HookAction, Middleware};
use crate::config::CacheConfig;
use crate::error::OrmResult;
use crate::row::Row;
use crate::statement::{Statement, StatementKind};
use crate::value::Value;
use sha2::{Digest, Sha256};

/// Key/value storage behind a [`CacheMiddleware`].
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> OrmResult<Option<String>>;

    fn set(&self, key: &str, value: String) -> OrmResult<()>;

    /// Delete one key, or every key when `key` is `None`.
    fn delete(&self, key: Option<&str>) -> OrmResult<()>;
}

/// Cache key for a compiled statement.
///
/// Hashes the SQL text and each bind value's JSON encoding, NUL-separated.
pub fn cache_key(prefix: &str, stmt: &Statement) -> OrmResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(stmt.text().as_bytes());
    hasher.update([0u8]);
    for value in stmt.values() {
        hasher.update(serde_json::to_vec(value)?);
        hasher.update([0u8]);
    }
    Ok(format!("{prefix}{}", hex::encode(hasher.finalize())))
}

/// Middleware that serves repeated Selects from a [`CacheStore`].
#[derive(Debug)]
pub struct CacheMiddleware<S: CacheStore> {
    store: S,
    prefix: String,
}

impl<S: CacheStore> CacheMiddleware<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, &CacheConfig::default())
    }

    pub fn with_config(store: S, config: &CacheConfig) -> Self {
        Self {
            store,
            prefix: config.prefix.clone(),
        }
    }

    /// Set the key prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn key(&self, stmt: &Statement) -> OrmResult<String> {
        cache_key(&self.prefix, stmt)
    }
}

impl CacheMiddleware<MemoryStore> {
    /// Cache backed by an in-process LRU store sized from `config`.
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::with_config(MemoryStore::new(config.capacity), config)
    }
}

impl<S: CacheStore> Middleware for CacheMiddleware<S> {
    fn name(&self) -> &str {
        "cache"
    }

    fn invoke(&self, stmt: &Statement) -> OrmResult<HookAction> {
        if stmt.kind().is_mutation() {
            tracing::debug!(
                target: "sqltree.sql",
                kind = %stmt.kind(),
                "flushing result cache"
            );
            self.store.delete(None)?;
        }
        Ok(HookAction::Continue)
    }

    fn as_cache(&self) -> Option<&dyn CacheProvider> {
        Some(self)
    }
}

impl<S: CacheStore> CacheProvider for CacheMiddleware<S> {
    fn fetch(&self, stmt: &Statement) -> OrmResult<Option<Vec<Row>>> {
        if stmt.kind() != StatementKind::Select {
            return Ok(None);
        }
        let key = self.key(stmt)?;
        let Some(payload) = self.store.get(&key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Vec<Vec<(String, Value)>>>(&payload) {
            Ok(rows) => Ok(Some(rows.into_iter().map(Row::from_pairs).collect())),
            Err(err) => {
                tracing::debug!(target: "sqltree.sql", key = %key, error = %err, "dropping undecodable cache entry");
                self.store.delete(Some(&key))?;
                Ok(None)
            }
        }
    }

    fn save(&self, stmt: &Statement, rows: &[Row]) -> OrmResult<()> {
        if stmt.kind() != StatementKind::Select {
            return Ok(());
        }
        let payload: Vec<Vec<(&str, &Value)>> = rows.iter().map(|row| row.iter().collect()).collect();
        self.store.set(&self.key(stmt)?, serde_json::to_string(&payload)?)
    }

    fn invalidate(&self) -> OrmResult<()> {
        self.store.delete(None)
    }
}
