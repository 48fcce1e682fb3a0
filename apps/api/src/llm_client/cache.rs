//! Bounded in-memory memo for generation results.
//!
//! Keys are blake3 digests over the model name, the task name and every prompt
//! part (text and raw image bytes), so two calls share an entry only when the
//! model would have seen byte-identical input. Values live in a [`DashMap`] so
//! concurrent sessions can read and write without a global lock. When full,
//! the least recently used entry is evicted.
//!
//! Only successful results are inserted by callers; errors are never cached.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

use crate::models::generation::PromptPart;

pub const DEFAULT_CAPACITY: usize = 256;

pub type CacheKey = [u8; 32];

/// Digest identifying one (model, task, input) combination.
pub fn cache_key(model: &str, task: &str, parts: &[PromptPart]) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    write_field(&mut hasher, model.as_bytes());
    write_field(&mut hasher, task.as_bytes());
    for part in parts {
        match part {
            PromptPart::Text(text) => {
                hasher.update(b"T");
                write_field(&mut hasher, text.as_bytes());
            }
            PromptPart::Image { mime_type, data } => {
                hasher.update(b"I");
                write_field(&mut hasher, mime_type.as_bytes());
                write_field(&mut hasher, data);
            }
        }
    }
    *hasher.finalize().as_bytes()
}

/// Length-prefixed so ("ab", "c") and ("a", "bc") hash differently.
fn write_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

struct CacheEntry<V> {
    value: V,
    last_used: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// LRU-evicting value cache. A capacity of 0 disables caching entirely.
///
/// Under concurrent inserts the map may briefly hold a few entries more than
/// `capacity`; it never grows without bound.
pub struct ResponseCache<V> {
    entries: DashMap<CacheKey, CacheEntry<V>>,
    capacity: usize,
    tick: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            tick: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if self.capacity == 0 {
            return None;
        }
        match self.entries.get(key) {
            Some(entry) => {
                entry.last_used.store(self.next_tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: CacheKey, value: V) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(&key) && self.len() >= self.capacity {
            self.evict_least_recent();
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                last_used: AtomicU64::new(self.next_tick()),
            },
        );
    }

    fn evict_least_recent(&self) {
        // Copy the key out so the shard read guard is released before removal.
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().last_used.load(Ordering::Relaxed))
            .map(|e| *e.key());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
