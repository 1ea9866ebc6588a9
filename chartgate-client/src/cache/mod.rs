//! Process-local TTL caches (C2's session/JWT maps, C3's result cache).
//!
//! All three are instances of the same lazy-expiry map: entries carry their
//! own expiry instant, nothing is swept proactively, and expiry is checked
//! only when a key is looked up. Hit/miss/eviction counters are
//! accumulated but never read back by request-handling logic — they exist
//! solely to feed [`chartgate_types::GatewayStatus`] (§4.2's "writes are
//! last-wins, caches are never the source of truth" note).

pub mod jwt_cache;
pub mod result_cache;
pub mod session_cache;

use std::time::{Duration, Instant};

use chartgate_types::CacheStats;
use hashbrown::HashMap;
use parking_lot::Mutex;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A generic lazy-expiry cache keyed by `K`, storing `V` with a per-entry
/// TTL. `K` is typically `String`; kept generic so the three call sites
/// don't each re-derive the same bookkeeping.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    stats: Mutex<CacheStats>,
}

impl<K: std::hash::Hash + Eq + Clone, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.lock().insert(key, Entry { value, expires_at });
    }

    /// Returns the cached value, evicting (and counting the eviction) if it
    /// has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                let value = entry.value.clone();
                drop(entries);
                self.stats.lock().hits += 1;
                Some(value)
            }
            Some(_) => {
                entries.remove(key);
                drop(entries);
                let mut stats = self.stats.lock();
                stats.misses += 1;
                stats.evictions += 1;
                None
            }
            None => {
                drop(entries);
                self.stats.lock().misses += 1;
                None
            }
        }
    }

    pub fn remove(&self, key: &K) {
        self.entries.lock().remove(key);
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }
}

impl<K: std::hash::Hash + Eq + Clone, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
