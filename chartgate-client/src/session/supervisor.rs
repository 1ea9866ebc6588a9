//! The connection supervisor run loop (§4.5's state machine): Dialing ->
//! Authenticating -> Ready -> InFlight -> Draining -> Closed, reconnecting
//! with backoff on every non-cancelled exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chartgate_core::comms::message::OutboundMethod;
use chartgate_core::SlotTable;
use chartgate_types::{ConnectionState, GatewayError, IdentityToken};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use chartgate_core::{conn_debug, conn_warn};

use crate::retry::ExponentialBackoff;
use crate::transport::{Connector, OutgoingFrame, Transport, TransportPollResult};

use super::{EventRouter, JwtProvider};

/// The knobs the supervisor needs out of [`chartgate_types::GatewayConfig`],
/// narrowed to what one connection cares about.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub websocket_url: String,
    pub heartbeat_idle: Duration,
    pub reconnect_backoff_base: Duration,
    pub reconnect_backoff_cap: Duration,
}

/// The pool (C6) and request coordinator's (C7) view of one supervised
/// connection: an id stable across reconnects, the current outgoing frame
/// sender, the slot table, the event router, and the observable state.
pub struct ConnectionHandle {
    id: Uuid,
    outgoing: RwLock<mpsc::Sender<OutgoingFrame>>,
    pub slots: Arc<Mutex<SlotTable>>,
    pub events: Arc<EventRouter>,
    state: RwLock<ConnectionState>,
    claimed: AtomicBool,
}

impl ConnectionHandle {
    pub fn connection_id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state(), ConnectionState::Ready)
    }

    /// Queue an outbound frame. Fails with [`GatewayError::WriteQueueOverflow`]
    /// if the writer can't keep up, per §7.
    pub fn send(&self, frame: OutgoingFrame) -> Result<(), GatewayError> {
        self.outgoing
            .read()
            .try_send(frame)
            .map_err(|_| GatewayError::WriteQueueOverflow)
    }

    /// Called by the request coordinator around a single in-flight request;
    /// the pool's "at most one request per connection" invariant (§3) means
    /// this never races with itself.
    pub fn mark_in_flight(&self) {
        *self.state.write() = ConnectionState::InFlight;
    }

    pub fn mark_idle(&self) {
        let mut state = self.state.write();
        if *state == ConnectionState::InFlight {
            *state = ConnectionState::Ready;
        }
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.write() = next;
    }

    /// Atomically claims this connection for one request if it is `Ready`
    /// and not already claimed, the pool's (C6) "at most one in-flight
    /// request per connection" invariant (§3).
    pub fn try_acquire(&self) -> bool {
        if !self.is_ready() {
            return false;
        }
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.mark_in_flight();
            true
        } else {
            false
        }
    }

    /// Releases a claim taken by [`ConnectionHandle::try_acquire`], returning
    /// the connection to `Ready` (if it was still `InFlight`) and making it
    /// available to the next acquirer.
    pub fn release(&self) {
        self.mark_idle();
        self.claimed.store(false, Ordering::Release);
    }
}

/// Dial, authenticate, and drive one connection for as long as `cancel`
/// stays unset, reconnecting with backoff after every drop. Returns the
/// handle the pool tracks and the task driving it.
pub fn spawn(
    connector: Arc<dyn Connector>,
    jwt_provider: Arc<dyn JwtProvider>,
    config: SupervisorConfig,
    cancel: CancellationToken,
) -> (Arc<ConnectionHandle>, tokio::task::JoinHandle<()>) {
    let (placeholder_tx, _placeholder_rx) = mpsc::channel(1);
    let handle = Arc::new(ConnectionHandle {
        id: Uuid::new_v4(),
        outgoing: RwLock::new(placeholder_tx),
        slots: Arc::new(Mutex::new(SlotTable::new())),
        events: Arc::new(EventRouter::new()),
        state: RwLock::new(ConnectionState::Dialing),
        claimed: AtomicBool::new(false),
    });

    let run_handle = handle.clone();
    let join = tokio::spawn(async move {
        run(run_handle, connector, jwt_provider, config, cancel).await;
    });

    (handle, join)
}

async fn run(
    handle: Arc<ConnectionHandle>,
    connector: Arc<dyn Connector>,
    jwt_provider: Arc<dyn JwtProvider>,
    config: SupervisorConfig,
    cancel: CancellationToken,
) {
    let mut backoff =
        ExponentialBackoff::new(config.reconnect_backoff_base, config.reconnect_backoff_cap);

    loop {
        if cancel.is_cancelled() {
            handle.set_state(ConnectionState::Closed);
            return;
        }

        handle.set_state(ConnectionState::Dialing);
        conn_debug!(handle, "dialing {}", config.websocket_url);

        let dialed = tokio::select! {
            _ = cancel.cancelled() => None,
            result = connector.connect(&config.websocket_url) => Some(result),
        };

        let (mut transport, outgoing_tx) = match dialed {
            None => {
                handle.set_state(ConnectionState::Closed);
                return;
            }
            Some(Err(e)) => {
                conn_warn!(handle, "dial failed: {e}");
                if !sleep_backoff(&mut backoff, &cancel).await {
                    handle.set_state(ConnectionState::Closed);
                    return;
                }
                continue;
            }
            Some(Ok(pair)) => pair,
        };

        *handle.outgoing.write() = outgoing_tx.clone();
        handle.set_state(ConnectionState::Authenticating);

        let token = match jwt_provider.current_token().await {
            Ok(token) => token,
            Err(e) => {
                conn_warn!(handle, "token unavailable: {e}");
                if !sleep_backoff(&mut backoff, &cancel).await {
                    handle.set_state(ConnectionState::Closed);
                    return;
                }
                continue;
            }
        };

        if let Err(e) = authenticate(&handle, &outgoing_tx, &token).await {
            conn_warn!(handle, "authentication handshake failed: {e}");
            if !sleep_backoff(&mut backoff, &cancel).await {
                handle.set_state(ConnectionState::Closed);
                return;
            }
            continue;
        }

        // No inbound event confirms `set_auth_token`/`chart_create_session`
        // succeeded, so this transitions to Ready optimistically; a bad
        // token surfaces later as a `critical_error` event, which drops the
        // connection back through Draining like any other failure.
        handle.set_state(ConnectionState::Ready);
        backoff.reset();
        *handle.slots.lock() = SlotTable::new();
        conn_debug!(handle, "ready");

        let outcome = drive(&handle, transport.as_mut(), config.heartbeat_idle, &cancel).await;
        handle.events.notify_closed();

        match outcome {
            DriveOutcome::Cancelled => {
                handle.set_state(ConnectionState::Closed);
                return;
            }
            DriveOutcome::Closed(e) => {
                conn_warn!(handle, "connection dropped: {e}");
                handle.set_state(ConnectionState::Draining);
            }
        }

        if !sleep_backoff(&mut backoff, &cancel).await {
            handle.set_state(ConnectionState::Closed);
            return;
        }
    }
}

async fn authenticate(
    handle: &ConnectionHandle,
    outgoing: &mpsc::Sender<OutgoingFrame>,
    token: &IdentityToken,
) -> Result<(), GatewayError> {
    let set_auth = OutboundMethod::new(
        "set_auth_token",
        vec![Value::String(token.as_str().to_string())],
    );
    outgoing
        .send(OutgoingFrame::Method(set_auth))
        .await
        .map_err(|_| GatewayError::UnexpectedClose)?;

    let session_id = format!("cs_{}", handle.connection_id().simple());
    let create_session = OutboundMethod::new(
        "chart_create_session",
        vec![Value::String(session_id), Value::String(String::new())],
    );
    outgoing
        .send(OutgoingFrame::Method(create_session))
        .await
        .map_err(|_| GatewayError::UnexpectedClose)?;

    Ok(())
}

enum DriveOutcome {
    Cancelled,
    Closed(GatewayError),
}

async fn drive(
    handle: &ConnectionHandle,
    transport: &mut dyn Transport,
    heartbeat_idle: Duration,
    cancel: &CancellationToken,
) -> DriveOutcome {
    // §4.5: an idle window with no inbound heartbeat draws a client-side
    // ping rather than an immediate drop; only a *second* consecutive miss
    // drains the connection.
    let mut missed_heartbeats: u32 = 0;
    let mut ping_seq: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return DriveOutcome::Cancelled,
            _ = tokio::time::sleep(heartbeat_idle) => {
                missed_heartbeats += 1;
                if missed_heartbeats >= 2 {
                    return DriveOutcome::Closed(GatewayError::HeartbeatMissed);
                }
                ping_seq += 1;
                conn_debug!(handle, "idle {heartbeat_idle:?} elapsed with no heartbeat, sending client ping {ping_seq}");
                if handle.send(OutgoingFrame::Ping(ping_seq)).is_err() {
                    return DriveOutcome::Closed(GatewayError::WriteQueueOverflow);
                }
            }
            result = transport.poll() => match result {
                TransportPollResult::Heartbeat(n) => {
                    missed_heartbeats = 0;
                    if handle.send(OutgoingFrame::HeartbeatEcho(n)).is_err() {
                        return DriveOutcome::Closed(GatewayError::WriteQueueOverflow);
                    }
                }
                TransportPollResult::Event(event) => {
                    handle.events.route(event);
                }
                TransportPollResult::OutgoingSent | TransportPollResult::Idle => {}
                TransportPollResult::Closed(e) => return DriveOutcome::Closed(e),
            },
        }
    }
}

async fn sleep_backoff(backoff: &mut ExponentialBackoff, cancel: &CancellationToken) -> bool {
    match backoff.next() {
        Some(delay) => tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        },
        None => false,
    }
}
