//! C3's completed-chart result cache, keyed by [`ChartRequest::fingerprint`],
//! default TTL from §6's `chart_cache_ttl_ms`.

use std::time::Duration;

use chartgate_types::{CacheStats, ChartPayload, ChartRequest};

use super::TtlCache;

pub struct ResultCache {
    inner: TtlCache<String, ChartPayload>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: TtlCache::new(),
            ttl,
        }
    }

    pub fn get(&self, request: &ChartRequest) -> Option<ChartPayload> {
        self.inner.get(&request.fingerprint())
    }

    pub fn put(&self, request: &ChartRequest, payload: ChartPayload) {
        self.inner.insert(request.fingerprint(), payload, self.ttl);
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}
