//! Meta crate tying the gateway's layers together under one name: re-exports
//! `chartgate-types`/`chartgate-core`/`chartgate-client` as
//! `types`/`core`/`client`.
//!
//! Also owns the process-wide default [`Gateway`] accessor (§9): a factory
//! (`chartgate_client::GatewayBuilder`) plus a lazily-initialized singleton,
//! rather than a module-load side effect, so tests can substitute their own
//! instance via [`set_default`].

pub use chartgate_client as client;
pub use chartgate_core as core;
pub use chartgate_types as types;

pub use chartgate_client::{
    BatchProgress, BatchResult, ChartOutcome, Gateway, GatewayBuilder, InMemorySessionStore,
    SessionResolver, SessionStats, SessionStore,
};
pub use chartgate_types::{
    CacheStats, ChartPayload, ChartRequest, ClientEndpoint, ConnectionState, Credentials,
    CvdOptions, ErrorResponse, GatewayConfig, GatewayError, GatewayStatus, OhlcvBar, PoolStatus,
    Resolution, StudyData, StudySeriesPoint, SymbolMetadata,
};

use std::sync::Arc;

use tokio::sync::OnceCell;

static DEFAULT_GATEWAY: OnceCell<Arc<Gateway>> = OnceCell::const_new();

/// Installs `gateway` as the process-wide default, if one hasn't already
/// been installed. Returns `false` (and leaves the existing instance in
/// place) if a default was already set — callers that need a fresh instance
/// should build their own [`Gateway`] directly rather than relying on this
/// singleton.
pub fn set_default(gateway: Gateway) -> bool {
    DEFAULT_GATEWAY.set(Arc::new(gateway)).is_ok()
}

/// The process-wide default gateway, if one has been installed via
/// [`set_default`].
pub fn default_gateway() -> Option<Arc<Gateway>> {
    DEFAULT_GATEWAY.get().cloned()
}
