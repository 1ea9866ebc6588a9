//! Orchestrator (C9): validate -> resolve session -> fetch JWT -> check
//! cache -> dispatch via pool -> cache -> return, the single `getChart`
//! operation exposed to callers (§4.9, §6).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chartgate_types::{
    ChartPayload, ChartRequest, ClientEndpoint, Credentials, GatewayConfig, GatewayError,
    GatewayStatus, IdentityToken, Resolution,
};
use tokio_util::sync::CancellationToken;

use crate::auth::SessionResolver;
use crate::cache::result_cache::ResultCache;
use crate::coordinator;
use crate::pool::ConnectionPool;
use crate::session::JwtProvider;
use crate::study_config::StudyConfig;

/// Bridges the per-request JWT resolution described in §4.1/§9 to the
/// supervisor's per-connection authentication: one set of credentials,
/// supplied once at construction, is re-resolved (through C2's caches) every
/// time a connection dials or reconnects.
pub(crate) struct SingleTenantJwtProvider {
    resolver: Arc<SessionResolver>,
    credentials: Credentials,
    endpoint: ClientEndpoint,
}

impl SingleTenantJwtProvider {
    pub(crate) fn new(
        resolver: Arc<SessionResolver>,
        credentials: Credentials,
        endpoint: ClientEndpoint,
    ) -> Self {
        Self {
            resolver,
            credentials,
            endpoint,
        }
    }
}

#[async_trait]
impl JwtProvider for SingleTenantJwtProvider {
    async fn current_token(&self) -> Result<IdentityToken, GatewayError> {
        let session = self.resolver.resolve_session(&self.credentials).await?;
        let jwt = self.resolver.resolve_jwt(&session, &self.endpoint).await?;
        Ok(IdentityToken::Bearer(jwt.token))
    }
}

pub struct Gateway {
    config: GatewayConfig,
    resolver: Arc<SessionResolver>,
    result_cache: Arc<ResultCache>,
    pool: Arc<ConnectionPool>,
    study_config: Arc<StudyConfig>,
    http: reqwest::Client,
    endpoint: ClientEndpoint,
}

impl Gateway {
    pub(crate) fn new(
        config: GatewayConfig,
        resolver: Arc<SessionResolver>,
        result_cache: Arc<ResultCache>,
        pool: Arc<ConnectionPool>,
        study_config: Arc<StudyConfig>,
        http: reqwest::Client,
        endpoint: ClientEndpoint,
    ) -> Self {
        Self {
            config,
            resolver,
            result_cache,
            pool,
            study_config,
            http,
            endpoint,
        }
    }

    /// The one operation exposed to the HTTP request handler (§6).
    pub async fn get_chart(
        &self,
        request: ChartRequest,
        cancel: CancellationToken,
    ) -> Result<ChartPayload, GatewayError> {
        validate(&request)?;

        if let Some(cached) = self.result_cache.get(&request) {
            return Ok(cached);
        }

        let budget = Duration::from_millis(self.config.request_budget_ms(request.bar_count));
        let guard = self.pool.acquire(budget, &cancel).await?;

        let result = coordinator::fetch_chart(
            &guard,
            &request,
            &self.study_config,
            budget,
            &cancel,
        )
        .await;
        drop(guard);

        let payload = result?;

        // Never cache a payload where CVD was requested but missing (§4.9
        // step 5).
        let cacheable = request.cvd.is_none() || payload.indicators.cvd.is_some();
        if cacheable {
            self.result_cache.put(&request, payload.clone());
        }

        Ok(payload)
    }

    /// Fans a batch of symbols/resolutions out across pool-sized chunks by
    /// calling [`Gateway::get_chart`] repeatedly (§4.8). `cancel` is shared by
    /// every chart fetched in the batch.
    pub async fn run_batch(
        &self,
        symbols: &[String],
        resolutions: &[chartgate_types::Resolution],
        batch_size: usize,
        cancel: &CancellationToken,
        on_progress: Option<impl FnMut(crate::batch::BatchProgress)>,
    ) -> crate::batch::BatchResult {
        crate::batch::run_batch(
            symbols,
            resolutions,
            batch_size,
            cancel,
            |request, cancel| self.get_chart(request, cancel),
            on_progress,
        )
        .await
    }

    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            pool: self.pool.status(),
            session_cache: self.resolver.session_cache_stats(),
            jwt_cache: self.resolver.jwt_cache_stats(),
            result_cache: self.result_cache.stats(),
        }
    }

    /// Cancels every supervisor, draining in-flight requests with a short
    /// grace period, then returns (§9's teardown sequence).
    pub async fn shutdown(&self) {
        self.pool.shutdown(Duration::from_secs(5)).await;
    }
}

fn validate(request: &ChartRequest) -> Result<(), GatewayError> {
    if request.symbol.trim().is_empty() {
        return Err(GatewayError::EmptySymbol);
    }
    if request.bar_count == 0 || request.bar_count > 2000 {
        return Err(GatewayError::BarCountOutOfRange(request.bar_count));
    }
    if let Some(cvd) = &request.cvd {
        if let Some(timeframe) = &cvd.timeframe {
            let timeframe: Resolution = timeframe.parse()?;
            if !timeframe.is_finer_than(&request.resolution) {
                return Err(GatewayError::CvdTimeframeNotFiner);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartgate_types::CvdOptions;

    fn base_request() -> ChartRequest {
        ChartRequest {
            symbol: "NSE:RELIANCE".to_string(),
            resolution: Resolution::Daily,
            bar_count: 300,
            cvd: None,
        }
    }

    #[test]
    fn rejects_empty_symbol() {
        let mut request = base_request();
        request.symbol = "  ".to_string();
        assert!(matches!(validate(&request), Err(GatewayError::EmptySymbol)));
    }

    #[test]
    fn rejects_bar_count_out_of_range() {
        let mut request = base_request();
        request.bar_count = 0;
        assert!(matches!(
            validate(&request),
            Err(GatewayError::BarCountOutOfRange(0))
        ));
        request.bar_count = 2001;
        assert!(matches!(
            validate(&request),
            Err(GatewayError::BarCountOutOfRange(2001))
        ));
    }

    #[test]
    fn accepts_bar_count_at_the_2000_ceiling() {
        let mut request = base_request();
        request.bar_count = 2000;
        assert!(validate(&request).is_ok());
    }

    #[test]
    fn rejects_cvd_timeframe_not_finer_than_resolution() {
        let mut request = base_request();
        request.resolution = Resolution::Minutes(15);
        request.cvd = Some(CvdOptions {
            anchor_period: "3M".to_string(),
            timeframe: Some("D".to_string()),
        });
        assert!(matches!(
            validate(&request),
            Err(GatewayError::CvdTimeframeNotFiner)
        ));
    }

    #[test]
    fn accepts_cvd_timeframe_finer_than_resolution() {
        let mut request = base_request();
        request.cvd = Some(CvdOptions {
            anchor_period: "3M".to_string(),
            timeframe: Some("15".to_string()),
        });
        assert!(validate(&request).is_ok());
    }
}
