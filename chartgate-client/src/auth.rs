//! Session & token resolver (C1): resolves a vendor session from the KV
//! collaborator, then exchanges it for a short-lived JWT by hitting the
//! vendor's chart bootstrap endpoint once, decoding (never verifying) the
//! token's `exp` claim.

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use chartgate_types::{ClientEndpoint, Credentials, GatewayError, JwtRecord, SessionRecord};
use serde::Deserialize;
use serde_json::Value;

use crate::cache::{jwt_cache::JwtCache, session_cache::SessionCache};
use crate::kv::SessionStore;
use crate::retry::ExponentialBackoff;

#[derive(Debug, Deserialize)]
struct BootstrapResponse {
    #[serde(alias = "access_token", alias = "accessToken", alias = "token")]
    access_token: Option<String>,
}

pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
    http: reqwest::Client,
    session_cache: Arc<SessionCache>,
    jwt_cache: Arc<JwtCache>,
}

impl SessionResolver {
    pub fn new(
        store: Arc<dyn SessionStore>,
        http: reqwest::Client,
        session_cache: Arc<SessionCache>,
        jwt_cache: Arc<JwtCache>,
    ) -> Self {
        Self {
            store,
            http,
            session_cache,
            jwt_cache,
        }
    }

    /// Resolves the session for `credentials`, consulting C2's session
    /// cache before the KV store (§4.1, §4.2).
    pub async fn resolve_session(
        &self,
        credentials: &Credentials,
    ) -> Result<SessionRecord, GatewayError> {
        if let Some(cached) = self.session_cache.get(&credentials.user_email) {
            return Ok(cached);
        }

        let record = self
            .store
            .get_latest_session_for_user(credentials)
            .await?
            .ok_or(GatewayError::NoSessionForUser)?;

        if record.session_cookie_signature.is_none() {
            log::warn!(
                "session for {} is missing its cookie signature",
                record.user_email
            );
        }

        self.session_cache.put(record.clone());
        Ok(record)
    }

    /// Resolves a data-access JWT for `session`, consulting C2's JWT cache
    /// first. On a miss, performs the vendor bootstrap call once — with one
    /// retry on transport failure, mirroring the study-config fetch's retry
    /// policy (§6) — and decodes the returned token's `exp` claim.
    pub async fn resolve_jwt(
        &self,
        session: &SessionRecord,
        endpoint: &ClientEndpoint,
    ) -> Result<JwtRecord, GatewayError> {
        if session.session_cookie_signature.is_none() {
            return Err(GatewayError::MissingSignature);
        }

        if let Some(cached) = self.jwt_cache.get(&session.session_cookie) {
            return Ok(cached);
        }

        let mut backoff = ExponentialBackoff::new(
            std::time::Duration::from_millis(200),
            std::time::Duration::from_secs(1),
        )
        .with_max_attempts(1);

        let body = loop {
            match self.fetch_bootstrap(session, endpoint).await {
                Ok(body) => break body,
                Err(e) if e.retriable() => match backoff.next() {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        };

        let token = body.access_token.ok_or(GatewayError::TokenNotFound)?;
        let expires_at = decode_expiry(&token)?;
        if expires_at <= Utc::now() {
            return Err(GatewayError::TokenExpired);
        }

        let record = JwtRecord { token, expires_at };
        self.jwt_cache
            .put(session.session_cookie.clone(), record.clone());
        Ok(record)
    }

    pub fn session_cache_stats(&self) -> chartgate_types::CacheStats {
        self.session_cache.stats()
    }

    pub fn jwt_cache_stats(&self) -> chartgate_types::CacheStats {
        self.jwt_cache.stats()
    }

    async fn fetch_bootstrap(
        &self,
        session: &SessionRecord,
        endpoint: &ClientEndpoint,
    ) -> Result<BootstrapResponse, GatewayError> {
        let mut request = self.http.get(&endpoint.bootstrap_url).header(
            "Cookie",
            format!("sessionid={}", session.session_cookie),
        );
        if let Some(signature) = &session.session_cookie_signature {
            request = request.header("Cookie", format!("sessionid_sign={signature}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::BootstrapUnreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::BootstrapUnreachable(format!(
                "status {}",
                response.status()
            )));
        }

        response
            .json::<BootstrapResponse>()
            .await
            .map_err(|e| GatewayError::BootstrapUnreachable(e.to_string()))
    }
}

/// Splits a JWT on `.`, base64-decodes the payload segment, and reads its
/// `exp` claim. The signature segment is never inspected — the vendor is
/// trusted, per §4.1.
fn decode_expiry(token: &str) -> Result<DateTime<Utc>, GatewayError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or(GatewayError::TokenExpired)?;

    let decoded = general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| general_purpose::STANDARD.decode(payload))
        .map_err(|_| GatewayError::TokenExpired)?;

    let claims: Value = serde_json::from_slice(&decoded).map_err(|_| GatewayError::TokenExpired)?;
    let exp = claims
        .get("exp")
        .and_then(Value::as_i64)
        .ok_or(GatewayError::TokenExpired)?;

    Utc.timestamp_opt(exp, 0)
        .single()
        .ok_or(GatewayError::TokenExpired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn fake_jwt(exp: i64) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(format!("{{\"exp\":{exp}}}"));
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn decode_expiry_reads_exp_claim() {
        let exp = (Utc::now() + ChronoDuration::hours(1)).timestamp();
        let token = fake_jwt(exp);
        let decoded = decode_expiry(&token).unwrap();
        assert_eq!(decoded.timestamp(), exp);
    }

    #[test]
    fn decode_expiry_rejects_malformed_token() {
        assert!(decode_expiry("not-a-jwt").is_err());
    }

    #[tokio::test]
    async fn resolve_session_returns_error_when_store_has_no_session() {
        let store = Arc::new(crate::kv::InMemorySessionStore::new());
        let resolver = SessionResolver::new(
            store,
            reqwest::Client::new(),
            Arc::new(SessionCache::new(std::time::Duration::from_secs(60))),
            Arc::new(JwtCache::new(600)),
        );
        let credentials = Credentials::vendor("nobody@example.com", "irrelevant");
        let result = resolver.resolve_session(&credentials).await;
        assert!(matches!(result, Err(GatewayError::NoSessionForUser)));
    }

    #[tokio::test]
    async fn resolve_session_hits_cache_on_second_call() {
        let store = Arc::new(crate::kv::InMemorySessionStore::new());
        let credentials = Credentials::vendor("trader@example.com", "irrelevant");
        let record = SessionRecord {
            session_cookie: "cookie123".to_string(),
            session_cookie_signature: Some("sig".to_string()),
            user_numeric_id: Some("42".to_string()),
            user_email: credentials.user_email.clone(),
            captured_at: Utc::now(),
        };
        store.put(credentials.clone(), record.clone());

        let resolver = SessionResolver::new(
            store.clone(),
            reqwest::Client::new(),
            Arc::new(SessionCache::new(std::time::Duration::from_secs(60))),
            Arc::new(JwtCache::new(600)),
        );

        let first = resolver.resolve_session(&credentials).await.unwrap();
        assert_eq!(first, record);

        let stats_before = resolver.session_cache_stats();
        let second = resolver.resolve_session(&credentials).await.unwrap();
        assert_eq!(second, record);
        let stats_after = resolver.session_cache_stats();
        assert_eq!(stats_after.hits, stats_before.hits + 1);
    }
}
