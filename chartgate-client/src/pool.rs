//! Connection pool (C6): fixed cardinality, eagerly dialed at construction,
//! `acquire`/`release` with guaranteed release on every exit path via an RAII
//! guard, and a degraded-health flag surfaced through status rather than
//! acted on internally (§4.6).

use std::sync::Arc;
use std::time::{Duration, Instant};

use chartgate_types::{ConnectionState, GatewayError, PoolStatus};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::session::{spawn_connection, ConnectionHandle, JwtProvider, SupervisorConfig};
use crate::transport::Connector;

const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(10);
const DEGRADED_GRACE: Duration = Duration::from_secs(60);

/// An acquired connection, released back to the pool when dropped — the
/// "guaranteed release on all exit paths" of §3's pool invariant, including
/// the coordinator's cancellation and timeout paths.
pub struct PoolGuard {
    handle: Arc<ConnectionHandle>,
}

impl std::ops::Deref for PoolGuard {
    type Target = ConnectionHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.handle.release();
    }
}

pub struct ConnectionPool {
    connections: Vec<Arc<ConnectionHandle>>,
    cancels: Vec<CancellationToken>,
    joins: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    below_half_since: Mutex<Option<Instant>>,
}

impl ConnectionPool {
    /// Dials `size` connections eagerly, per §4.6.
    pub fn start(
        size: usize,
        connector: Arc<dyn Connector>,
        jwt_provider: Arc<dyn JwtProvider>,
        config: SupervisorConfig,
    ) -> Self {
        let mut connections = Vec::with_capacity(size);
        let mut cancels = Vec::with_capacity(size);
        let mut joins = Vec::with_capacity(size);

        for _ in 0..size {
            let cancel = CancellationToken::new();
            let (handle, join) = spawn_connection(
                connector.clone(),
                jwt_provider.clone(),
                config.clone(),
                cancel.clone(),
            );
            connections.push(handle);
            cancels.push(cancel);
            joins.push(join);
        }

        Self {
            connections,
            cancels,
            joins: Mutex::new(joins),
            below_half_since: Mutex::new(None),
        }
    }

    /// Waits up to `timeout` for a `Ready` connection, claiming it for
    /// exclusive use. Fails with [`GatewayError::PoolExhausted`] on timeout,
    /// and returns early if `cancel` fires first (§5: acquisition is a
    /// suspension point that must respect cancellation).
    pub async fn acquire(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PoolGuard, GatewayError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(handle) = self.connections.iter().find(|c| c.try_acquire()) {
                return Ok(PoolGuard {
                    handle: handle.clone(),
                });
            }
            if Instant::now() >= deadline {
                return Err(GatewayError::PoolExhausted);
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(GatewayError::PoolExhausted),
                _ = tokio::time::sleep(ACQUIRE_POLL_INTERVAL.min(timeout)) => {}
            }
        }
    }

    /// A snapshot of pool health, updating the degraded-since tracking as a
    /// side effect of being observed (§4.6: "surfaces a health flag but
    /// continues serving").
    pub fn status(&self) -> PoolStatus {
        let mut ready = 0;
        let mut dialing = 0;
        let mut draining = 0;
        for c in &self.connections {
            match c.state() {
                ConnectionState::Ready | ConnectionState::InFlight => ready += 1,
                ConnectionState::Dialing | ConnectionState::Authenticating => dialing += 1,
                ConnectionState::Draining | ConnectionState::Closed => draining += 1,
            }
        }

        let total = self.connections.len();
        let healthy = ready;
        let mut below_half_since = self.below_half_since.lock();
        if healthy * 2 < total {
            below_half_since.get_or_insert_with(Instant::now);
        } else {
            *below_half_since = None;
        }
        let degraded = below_half_since
            .map(|since| since.elapsed() >= DEGRADED_GRACE)
            .unwrap_or(false);

        PoolStatus {
            total,
            ready,
            dialing,
            draining,
            degraded,
        }
    }

    /// Cancels every supervisor task and waits for them to wind down,
    /// draining in-flight requests with a short grace period (§9).
    pub async fn shutdown(&self, grace: Duration) {
        for cancel in &self.cancels {
            cancel.cancel();
        }
        let joins = std::mem::take(&mut *self.joins.lock());
        let _ = tokio::time::timeout(grace, futures::future::join_all(joins)).await;
    }
}
