/// State a connection in the pool can be in, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConnectionState {
    Dialing,
    Authenticating,
    Ready,
    InFlight,
    Draining,
    Closed,
}

/// Hit/miss/eviction counters for one of the process-local caches (C2's two
/// maps, or C3), surfaced only through [`GatewayStatus`] — never consulted
/// by request-handling logic itself (§4.2's "Writes are last-wins").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// A snapshot of the pool's health, per §4.6: a pool under half healthy for
/// more than 60 seconds sets `degraded_since` but keeps serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolStatus {
    pub total: usize,
    pub ready: usize,
    pub dialing: usize,
    pub draining: usize,
    pub degraded: bool,
}

/// The structured status object the core exposes per §1 and §6, the thing
/// any health dashboard is built on top of.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GatewayStatus {
    pub pool: PoolStatus,
    pub session_cache: CacheStats,
    pub jwt_cache: CacheStats,
    pub result_cache: CacheStats,
}
