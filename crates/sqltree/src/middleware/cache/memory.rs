use super::CacheStore;
use crate::error::OrmResult;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// In-process LRU cache store.
///
/// A capacity of zero disables storage: every `set` is dropped immediately.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Debug)]
struct MemoryStoreInner {
    capacity: usize,
    map: HashMap<String, String>,
    order: VecDeque<String>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryStoreInner {
                capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(crate::config::CacheConfig::default().capacity)
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> OrmResult<Option<String>> {
        let mut inner = self.inner.lock();
        let Some(value) = inner.map.get(key).cloned() else {
            return Ok(None);
        };
        inner.touch(key);
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: String) -> OrmResult<()> {
        let mut inner = self.inner.lock();
        if inner.map.insert(key.to_string(), value).is_some() {
            inner.touch(key);
        } else {
            inner.order.push_back(key.to_string());
        }
        inner.evict_if_needed();
        Ok(())
    }

    fn delete(&self, key: Option<&str>) -> OrmResult<()> {
        let mut inner = self.inner.lock();
        match key {
            Some(key) => {
                if inner.map.remove(key).is_some() {
                    inner.remove_from_order(key);
                }
            }
            None => {
                inner.map.clear();
                inner.order.clear();
            }
        }
        Ok(())
    }
}

impl MemoryStoreInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k.as_str() == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove_from_order(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k.as_str() == key) {
            let _ = self.order.remove(pos);
        }
    }

    fn evict_if_needed(&mut self) {
        if self.capacity == 0 {
            self.map.clear();
            self.order.clear();
            return;
        }

        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            let _ = self.map.remove(&oldest);
        }
    }
}
