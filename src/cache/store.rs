//! In-memory response store.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::key::Fingerprint;
use crate::config::CacheConfig;

/// Counter snapshot for observability endpoints and tests.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    /// Entries currently resident.
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
}

impl AtomicStats {
    fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
        }
    }
}

/// Fingerprint-keyed store of completed generations.
///
/// Entries never expire; a completion for a given fingerprint stays valid for
/// the life of the process. An optional entry cap turns the store into an LRU
/// for deployments that generate unbounded distinct prompts.
pub struct ResponseCache {
    entries: Mutex<LruCache<Fingerprint, String>>,
    enabled: bool,
    stats: AtomicStats,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let entries = match config.max_entries {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            entries: Mutex::new(entries),
            enabled: config.enabled,
            stats: AtomicStats::new(),
        }
    }

    /// Look up the completion stored for `fingerprint`, refreshing its
    /// recency. Misses and disabled lookups both return `None`; only real
    /// lookups move the hit/miss counters.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.entries.lock().unwrap();
        match entries.get(fingerprint) {
            Some(text) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(text.clone())
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a completion, replacing any previous entry for the same
    /// fingerprint. Insertion beyond a configured cap evicts the least
    /// recently used entry.
    pub fn set(&self, fingerprint: Fingerprint, text: String) {
        if !self.enabled {
            return;
        }
        self.entries.lock().unwrap().put(fingerprint, text);
        self.stats.insertions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Counters are preserved.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            insertions: self.stats.insertions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
