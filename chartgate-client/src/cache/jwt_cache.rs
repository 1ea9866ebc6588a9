//! C2's decoded-JWT cache: keyed by session cookie, with a per-entry TTL of
//! `exp - now - jwt_expiry_buffer_sec` rather than a single fixed TTL, so a
//! token is treated as stale slightly before the vendor actually expires it
//! (§6).

use chrono::Utc;

use chartgate_types::{CacheStats, JwtRecord};

use super::TtlCache;

pub struct JwtCache {
    inner: TtlCache<String, JwtRecord>,
    expiry_buffer: chrono::Duration,
}

impl JwtCache {
    pub fn new(expiry_buffer_sec: i64) -> Self {
        Self {
            inner: TtlCache::new(),
            expiry_buffer: chrono::Duration::seconds(expiry_buffer_sec),
        }
    }

    pub fn get(&self, session_cookie: &str) -> Option<JwtRecord> {
        self.inner.get(&session_cookie.to_string())
    }

    /// Caches `record`, with a TTL computed from its decoded expiry minus
    /// the configured buffer. A token that is already within the buffer of
    /// expiring is not cached at all.
    pub fn put(&self, session_cookie: String, record: JwtRecord) {
        let usable_until = record.expires_at - self.expiry_buffer;
        let remaining = usable_until - Utc::now();
        if let Ok(ttl) = remaining.to_std() {
            self.inner.insert(session_cookie, record, ttl);
        }
    }

    pub fn invalidate(&self, session_cookie: &str) {
        self.inner.remove(&session_cookie.to_string());
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}
