use std::collections::HashMap;

/// One named vendor endpoint the gateway can be pointed at. Kept separate
/// from [`GatewayConfig`] so an operator can list several (e.g. staging vs.
/// production vendor hosts) by name.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClientEndpoint {
    pub websocket_url: String,
    pub bootstrap_url: String,
}

/// The recognized configuration options from §6, as a plain value struct.
/// The `Config` trait (`validate`/`save`/`load`) implementing the config-file
/// convention lives in `chartgate-core`, which depends on this crate — kept
/// here, rather than there, only because the trait needs to be implementable
/// for types owned by `chartgate-client` too.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub default_endpoint: String,
    pub endpoints: HashMap<String, ClientEndpoint>,

    pub pool_size: usize,
    pub chart_cache_ttl_ms: u64,
    pub session_cache_ttl_ms: u64,
    pub jwt_expiry_buffer_sec: i64,
    pub heartbeat_idle_ms: u64,
    pub reconnect_backoff_base_ms: u64,
    pub reconnect_backoff_cap_ms: u64,
    pub disable_pool: bool,
    pub cvd_study_fetch_timeout_ms: u64,
    pub batch_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_endpoint: String::new(),
            endpoints: HashMap::new(),
            pool_size: 5,
            chart_cache_ttl_ms: 300_000,
            session_cache_ttl_ms: 300_000,
            jwt_expiry_buffer_sec: 600,
            heartbeat_idle_ms: 30_000,
            reconnect_backoff_base_ms: 500,
            reconnect_backoff_cap_ms: 30_000,
            disable_pool: false,
            cvd_study_fetch_timeout_ms: 2_000,
            batch_size: 18,
        }
    }
}

impl GatewayConfig {
    /// The per-request wall-clock budget from §6: `8000 + 1000 *
    /// max(0, ceil((barCount - 500) / 500))`, capped at 20000ms.
    pub fn request_budget_ms(&self, bar_count: u32) -> u64 {
        let base = 8_000u64;
        let extra = if bar_count > 500 {
            let over = (bar_count - 500) as u64;
            1_000 * over.div_ceil(500)
        } else {
            0
        };
        (base + extra).min(20_000)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.pool_size == 0 && !self.disable_pool {
            errors.push("pool_size must be at least 1 unless disable_pool is set".to_string());
        }
        if !self.default_endpoint.is_empty() && !self.endpoints.contains_key(&self.default_endpoint)
        {
            errors.push(format!(
                "default_endpoint '{}' is not present in endpoints",
                self.default_endpoint
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
