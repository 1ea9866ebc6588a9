//! C2's session-cookie cache: keyed by user email, 5 minute default TTL
//! (§6's `session_cache_ttl_ms`).

use std::time::Duration;

use chartgate_types::{CacheStats, SessionRecord};

use super::TtlCache;

pub struct SessionCache {
    inner: TtlCache<String, SessionRecord>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: TtlCache::new(),
            ttl,
        }
    }

    pub fn get(&self, user_email: &str) -> Option<SessionRecord> {
        self.inner.get(&user_email.to_string())
    }

    pub fn put(&self, record: SessionRecord) {
        self.inner
            .insert(record.user_email.clone(), record, self.ttl);
    }

    pub fn invalidate(&self, user_email: &str) {
        self.inner.remove(&user_email.to_string());
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(email: &str) -> SessionRecord {
        SessionRecord {
            session_cookie: "cookie".to_string(),
            session_cookie_signature: Some("sig".to_string()),
            user_numeric_id: Some("1".to_string()),
            user_email: email.to_string(),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn put_then_get_round_trips_by_email() {
        let cache = SessionCache::new(Duration::from_secs(300));
        cache.put(record("trader@example.com"));
        assert_eq!(
            cache.get("trader@example.com").unwrap().session_cookie,
            "cookie"
        );
    }

    #[test]
    fn last_write_wins_on_same_email() {
        let cache = SessionCache::new(Duration::from_secs(300));
        cache.put(record("trader@example.com"));
        let mut second = record("trader@example.com");
        second.session_cookie = "newer".to_string();
        cache.put(second);
        assert_eq!(cache.get("trader@example.com").unwrap().session_cookie, "newer");
    }

    #[test]
    fn invalidate_clears_entry() {
        let cache = SessionCache::new(Duration::from_secs(300));
        cache.put(record("trader@example.com"));
        cache.invalidate("trader@example.com");
        assert_eq!(cache.get("trader@example.com"), None);
    }
}
