//! Resolves the bearer token a connection authenticates with.
//!
//! §4.6 has the pool dial every connection eagerly at startup, before any
//! request (and therefore any caller-supplied credentials) has arrived; §4.1
//! and §9 describe JWT resolution as something that happens per request. The
//! two are reconciled by treating one gateway instance as single-tenant: a
//! single set of credentials is supplied once at construction (C9's
//! `GatewayBuilder`), and every connection — at initial dial and at every
//! reconnect — asks this shared provider for whatever token is current. The
//! provider itself owns the C1/C2 flow (session resolution, JWT decode,
//! caching, refresh) behind one async call.

use async_trait::async_trait;
use chartgate_types::{GatewayError, IdentityToken};

/// The seam between the connection supervisor (C5) and credential/token
/// resolution (C1 + C2). Kept as a trait so the supervisor can be driven in
/// tests without a real vendor endpoint.
#[async_trait]
pub trait JwtProvider: Send + Sync {
    /// Returns a currently-valid bearer token, refreshing it first if the
    /// cached one has expired (within the configured buffer).
    async fn current_token(&self) -> Result<IdentityToken, GatewayError>;
}
