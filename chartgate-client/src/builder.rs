//! Builds a [`Gateway`], wiring C1 through C8 together: loads and validates
//! configuration, opens the result/session/JWT caches, resolves the
//! single-tenant credentials' JWT provider, dials the connection pool
//! eagerly, and fetches the CVD study descriptor once (§4.6, §9).

use std::sync::Arc;
use std::time::Duration;

use chartgate_core::Config;
use chartgate_types::{ClientEndpoint, Credentials, GatewayConfig, GatewayError};

use crate::auth::SessionResolver;
use crate::cache::{jwt_cache::JwtCache, result_cache::ResultCache, session_cache::SessionCache};
use crate::kv::SessionStore;
use crate::orchestrator::{Gateway, SingleTenantJwtProvider};
use crate::pool::ConnectionPool;
use crate::session::SupervisorConfig;
use crate::study_config::StudyConfig;
use crate::transport::TungsteniteConnector;

pub struct GatewayBuilder {
    config: GatewayConfig,
    credentials: Option<Credentials>,
    endpoint_name: Option<String>,
    session_store: Option<Arc<dyn SessionStore>>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self {
            config: GatewayConfig::default(),
            credentials: None,
            endpoint_name: None,
            session_store: None,
        }
    }
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file, per the `Config` convention
    /// (`chartgate_core::Config::load`).
    pub fn with_config_file(mut self, path: &std::path::Path) -> Result<Self, GatewayError> {
        self.config = GatewayConfig::load(path)
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        Ok(self)
    }

    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_endpoint(mut self, name: impl Into<String>) -> Self {
        self.endpoint_name = Some(name.into());
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub async fn build(self) -> Result<Gateway, GatewayError> {
        self.config
            .validate()
            .map_err(|errors| GatewayError::Internal(errors.join("; ")))?;

        let endpoint_name = self
            .endpoint_name
            .unwrap_or_else(|| self.config.default_endpoint.clone());
        let endpoint: ClientEndpoint = self
            .config
            .endpoints
            .get(&endpoint_name)
            .cloned()
            .ok_or_else(|| {
                GatewayError::Internal(format!("no endpoint named '{endpoint_name}' configured"))
            })?;
        validate_endpoint(&endpoint)?;

        let credentials = self
            .credentials
            .ok_or_else(|| GatewayError::Internal("credentials were not provided".to_string()))?;

        let session_store = self
            .session_store
            .ok_or_else(|| GatewayError::Internal("no session store configured".to_string()))?;

        let http = reqwest::Client::new();

        let session_cache = Arc::new(SessionCache::new(Duration::from_millis(
            self.config.session_cache_ttl_ms,
        )));
        let jwt_cache = Arc::new(JwtCache::new(self.config.jwt_expiry_buffer_sec));
        let result_cache = Arc::new(ResultCache::new(Duration::from_millis(
            self.config.chart_cache_ttl_ms,
        )));

        let resolver = Arc::new(SessionResolver::new(
            session_store,
            http.clone(),
            session_cache,
            jwt_cache,
        ));

        let study_config = Arc::new(StudyConfig::new());
        let study_config_url = format!("{}/study-config", endpoint.bootstrap_url);
        study_config
            .ensure_loaded(
                &http,
                &study_config_url,
                Duration::from_millis(self.config.cvd_study_fetch_timeout_ms),
            )
            .await
            .ok();

        let jwt_provider = Arc::new(SingleTenantJwtProvider::new(
            resolver.clone(),
            credentials,
            endpoint.clone(),
        ));

        let supervisor_config = SupervisorConfig {
            websocket_url: endpoint.websocket_url.clone(),
            heartbeat_idle: Duration::from_millis(self.config.heartbeat_idle_ms),
            reconnect_backoff_base: Duration::from_millis(self.config.reconnect_backoff_base_ms),
            reconnect_backoff_cap: Duration::from_millis(self.config.reconnect_backoff_cap_ms),
        };

        let pool_size = if self.config.disable_pool {
            1
        } else {
            self.config.pool_size
        };
        let pool = Arc::new(ConnectionPool::start(
            pool_size,
            Arc::new(TungsteniteConnector),
            jwt_provider,
            supervisor_config,
        ));

        Ok(Gateway::new(
            self.config,
            resolver,
            result_cache,
            pool,
            study_config,
            http,
            endpoint,
        ))
    }
}

/// Checks that an endpoint's two URLs actually parse and carry the scheme
/// the respective transport expects (`ws`/`wss` for the socket, `http`/
/// `https` for the bootstrap call) before anything is dialed.
fn validate_endpoint(endpoint: &ClientEndpoint) -> Result<(), GatewayError> {
    let ws = url::Url::parse(&endpoint.websocket_url)
        .map_err(|e| GatewayError::Internal(format!("invalid websocket_url: {e}")))?;
    if ws.scheme() != "ws" && ws.scheme() != "wss" {
        return Err(GatewayError::Internal(format!(
            "websocket_url must use ws:// or wss://, got '{}'",
            ws.scheme()
        )));
    }

    let bootstrap = url::Url::parse(&endpoint.bootstrap_url)
        .map_err(|e| GatewayError::Internal(format!("invalid bootstrap_url: {e}")))?;
    if bootstrap.scheme() != "http" && bootstrap.scheme() != "https" {
        return Err(GatewayError::Internal(format!(
            "bootstrap_url must use http:// or https://, got '{}'",
            bootstrap.scheme()
        )));
    }

    Ok(())
}
