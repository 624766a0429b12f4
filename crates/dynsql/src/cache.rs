//! Parse-once cache of segment programs keyed by template text.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::TemplateResult;
use crate::segment::DynamicSql;

/// Default number of templates kept by [`TemplateCache::default`].
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Bounded LRU cache of parsed templates. A capacity of 0 disables caching.
#[derive(Debug)]
pub struct TemplateCache {
    inner: Mutex<TemplateCacheInner>,
}

#[derive(Debug)]
struct TemplateCacheInner {
    capacity: usize,
    map: HashMap<String, Arc<DynamicSql>>,
    order: VecDeque<String>,
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl TemplateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(TemplateCacheInner {
                capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TemplateCacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached program for `template`, if any.
    pub fn get(&self, template: &str) -> Option<Arc<DynamicSql>> {
        let mut inner = self.lock();
        let program = inner.map.get(template).cloned()?;
        inner.touch(template);
        Some(program)
    }

    /// Return the cached program for `template`, parsing and caching it on a miss.
    ///
    /// Parse errors are returned and nothing is cached.
    pub fn get_or_parse(&self, template: &str) -> TemplateResult<Arc<DynamicSql>> {
        if let Some(program) = self.get(template) {
            tracing::trace!(target: "dynsql.cache", "template cache hit");
            return Ok(program);
        }

        tracing::trace!(target: "dynsql.cache", "template cache miss");
        let parsed = Arc::new(DynamicSql::parse(template)?);
        Ok(self.insert_if_absent(template.to_string(), parsed))
    }

    fn insert_if_absent(&self, key: String, program: Arc<DynamicSql>) -> Arc<DynamicSql> {
        let mut inner = self.lock();

        if let Some(existing) = inner.map.get(&key).cloned() {
            inner.touch(&key);
            return existing;
        }

        inner.map.insert(key.clone(), program.clone());
        inner.order.push_back(key);
        inner.evict_if_needed();
        program
    }

    pub fn remove(&self, template: &str) -> Option<Arc<DynamicSql>> {
        let mut inner = self.lock();
        let removed = inner.map.remove(template);
        if removed.is_some() {
            inner.remove_from_order(template);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
    }
}

impl TemplateCacheInner {
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
            tracing::trace!(target: "dynsql.cache", "evicting least recently used template");
            let _ = self.map.remove(&oldest);
        }
    }
}
