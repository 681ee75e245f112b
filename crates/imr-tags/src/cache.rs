//! Process-lifetime cache in front of a knowledge base.
//!
//! The vocabulary behind the knowledge base is effectively static, so entries
//! are never evicted. Entries are immutable `Arc` snapshots; concurrent readers
//! share them without copying and nobody can mutate them in place.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use imr_core::{ColorBundle, ImrError};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{TagKnowledgeBase, TermAnswer};

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct CachedTagKnowledgeBase<K> {
    inner: K,
    terms: RwLock<FxHashMap<String, TermAnswer>>,
    colors: RwLock<FxHashMap<String, Arc<ColorBundle>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: TagKnowledgeBase> CachedTagKnowledgeBase<K> {
    pub fn new(inner: K) -> Self {
        Self {
            inner,
            terms: RwLock::new(FxHashMap::default()),
            colors: RwLock::new(FxHashMap::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &K {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: len_of(&self.terms) + len_of(&self.colors),
        }
    }

    fn cached<V: ?Sized>(
        &self,
        map: &RwLock<FxHashMap<String, Arc<V>>>,
        key: &str,
        fetch: impl FnOnce() -> Result<Arc<V>, ImrError>,
    ) -> Result<Arc<V>, ImrError> {
        let hit = match map.read() {
            Ok(guard) => guard.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        };
        if let Some(value) = hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "knowledge base cache hit");
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key, "knowledge base cache miss");
        // Failures are returned without being remembered.
        let fetched = fetch()?;

        let mut guard = match map.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // A concurrent miss may have filled the slot first; keep a single snapshot.
        Ok(guard.entry(key.to_string()).or_insert(fetched).clone())
    }
}

fn len_of<K: Eq + Hash, V>(map: &RwLock<FxHashMap<K, V>>) -> usize {
    match map.read() {
        Ok(guard) => guard.len(),
        Err(poisoned) => poisoned.into_inner().len(),
    }
}

impl<K: TagKnowledgeBase> TagKnowledgeBase for CachedTagKnowledgeBase<K> {
    fn lookup_term(&self, term: &str) -> Result<TermAnswer, ImrError> {
        self.cached(&self.terms, term, || self.inner.lookup_term(term))
    }

    fn lookup_color(&self, color: &str) -> Result<Arc<ColorBundle>, ImrError> {
        self.cached(&self.colors, color, || self.inner.lookup_color(color))
    }
}
