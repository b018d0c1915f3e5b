//! A small concurrent cache with per-entry expiry.
//!
//! Read-side queries are expensive aggregations over the ledger, and slightly stale answers are acceptable for them.
//! The cache is an ordinary value that is handed to whoever needs it; there is no process-wide instance.
use std::{
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use log::*;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// A TTL cache backed by a [`DashMap`]. Cloning the cache gives another handle onto the same entries.
///
/// Expired entries are dropped lazily on access, and in bulk by [`TtlCache::purge_expired`]. When the cache is full,
/// inserting evicts the entry closest to expiry.
pub struct TtlCache<K, V> {
    ttl: Duration,
    max_entries: usize,
    entries: Arc<DashMap<K, CacheEntry<V>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self { ttl: self.ttl, max_entries: self.max_entries, entries: Arc::clone(&self.entries) }
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V>
where K: Eq + Hash
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TtlCache(ttl: {:?}, entries: {}/{})", self.ttl, self.entries.len(), self.max_entries)
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// A zero `ttl` disables caching altogether.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { ttl, max_entries: max_entries.max(1), entries: Arc::new(DashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let hit = self.entries.get(key).map(|e| (e.expires_at > now).then(|| e.value.clone()));
        match hit {
            Some(Some(value)) => Some(value),
            Some(None) => {
                self.entries.remove_if(key, |_, e| e.expires_at <= now);
                None
            },
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        if self.ttl.is_zero() {
            return;
        }
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.purge_expired();
            if self.entries.len() >= self.max_entries {
                self.evict_soonest();
            }
        }
        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            trace!("🧹️ Purged {purged} expired cache entries");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_soonest(&self) {
        let victim = self.entries.iter().min_by_key(|e| e.value().expires_at).map(|e| e.key().clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
        }
    }
}
