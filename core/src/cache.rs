//! Compiled query artifacts shared across invocations.

use crate::error::CompileError;
use crate::method::MethodKey;
use crate::paging::Sort;
use crate::template::DeclaredQuery;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Bounded map from method identity to a compiled artifact.
///
/// Once `capacity` entries are held, inserting evicts an arbitrary entry.
pub struct QueryCache<V> {
    entries: DashMap<MethodKey, Arc<V>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> QueryCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &MethodKey) -> Option<Arc<V>> {
        let found = self.entries.get(key).map(|entry| Arc::clone(entry.value()));
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Returns the cached artifact, compiling it on a miss.
    ///
    /// Failed compilations are not cached.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &MethodKey,
        compile: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some(found) = self.get(key) {
            return Ok(found);
        }

        let compiled = Arc::new(compile()?);
        self.make_room(key);
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(Arc::clone(entry.value()))
    }

    fn make_room(&self, key: &MethodKey) {
        if self.entries.len() < self.capacity || self.entries.contains_key(key) {
            return;
        }
        let victim = self.entries.iter().next().map(|entry| entry.key().clone());
        if let Some(victim) = victim {
            tracing::debug!("Query cache full, evicting {}", victim);
            self.entries.remove(&victim);
        }
    }

    pub fn invalidate(&self, key: &MethodKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

/// A compiled template plus the sorted variants derived from it.
///
/// Derivation is the only mutable step and holds the lock for that call only.
pub struct TemplateSlot {
    base: Arc<DeclaredQuery>,
    sorted: Mutex<HashMap<Sort, Arc<DeclaredQuery>>>,
    /// Sorted variants kept at once; zero disables memoisation.
    capacity: usize,
}

impl TemplateSlot {
    pub fn new(base: DeclaredQuery, capacity: usize) -> Self {
        Self {
            base: Arc::new(base),
            sorted: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    pub fn base(&self) -> &Arc<DeclaredQuery> {
        &self.base
    }

    pub fn variant_count(&self) -> usize {
        self.sorted.lock().len()
    }

    /// The executable query for `sort`.
    pub fn derive(&self, sort: &Sort, allow_unsafe: bool) -> Result<Arc<DeclaredQuery>, CompileError> {
        if !sort.is_sorted() {
            return Ok(Arc::clone(&self.base));
        }

        let mut sorted = self.sorted.lock();
        if let Some(query) = sorted.get(sort) {
            return Ok(Arc::clone(query));
        }
        let query = Arc::new(self.base.with_sort(sort, allow_unsafe)?);
        if self.capacity == 0 {
            return Ok(query);
        }
        if sorted.len() >= self.capacity {
            let victim = sorted.keys().next().cloned();
            if let Some(victim) = victim {
                tracing::trace!("Sorted variants full, evicting {:?}", victim);
                sorted.remove(&victim);
            }
        }
        sorted.insert(sort.clone(), Arc::clone(&query));
        Ok(query)
    }
}
