//! Drives the supervisor + pool + coordinator stack against a fake wire
//! transport, the harness DESIGN.md notes is needed to exercise §8's
//! testable properties end-to-end rather than only through their
//! constituent unit-tested helpers: slot reuse (property 3), heartbeat echo
//! (property 4), cancellation (property 7), and the mid-request connection
//! loss + reconnect scenario (§8 scenario f).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chartgate_client::coordinator::fetch_chart;
use chartgate_client::pool::ConnectionPool;
use chartgate_client::session::{JwtProvider, SupervisorConfig};
use chartgate_client::study_config::StudyConfig;
use chartgate_client::transport::{Connector, OutgoingFrame, Transport, TransportPollResult};
use chartgate_core::comms::frame::encode_frame;
use chartgate_core::comms::message::InboundEvent;
use chartgate_client::study_config::CvdStudyDescriptor;
use chartgate_types::{ChartRequest, CvdOptions, GatewayError, IdentityToken, Resolution};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct StaticJwtProvider;

#[async_trait]
impl JwtProvider for StaticJwtProvider {
    async fn current_token(&self) -> Result<IdentityToken, GatewayError> {
        Ok(IdentityToken::Bearer("test-token".to_string()))
    }
}

/// What one dial attempt hands the test: a channel to inject inbound wire
/// events, and the outbound methods the supervisor/coordinator actually
/// sent, in order.
struct ConnAttempt {
    inbound: mpsc::UnboundedSender<TransportPollResult>,
    sent: Arc<Mutex<Vec<OutgoingFrame>>>,
}

struct FakeTransport {
    inbound: mpsc::UnboundedReceiver<TransportPollResult>,
    outgoing: mpsc::Receiver<OutgoingFrame>,
    sent: Arc<Mutex<Vec<OutgoingFrame>>>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn poll(&mut self) -> TransportPollResult {
        tokio::select! {
            biased;
            frame = self.outgoing.recv() => match frame {
                Some(frame) => {
                    self.sent.lock().push(frame);
                    TransportPollResult::OutgoingSent
                }
                None => TransportPollResult::Closed(GatewayError::UnexpectedClose),
            },
            event = self.inbound.recv() => {
                event.unwrap_or(TransportPollResult::Closed(GatewayError::UnexpectedClose))
            }
        }
    }
}

/// Hands out a fresh [`FakeTransport`] on every `connect` call, publishing
/// each attempt's wire handle on `attempts` so the test can drive (and
/// observe) whichever dial is currently live — including the redial after a
/// simulated connection loss.
struct FakeConnector {
    attempts: mpsc::UnboundedSender<ConnAttempt>,
    dial_count: AtomicU64,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _url: &str,
    ) -> Result<(Box<dyn Transport>, mpsc::Sender<OutgoingFrame>), GatewayError> {
        self.dial_count.fetch_add(1, Ordering::SeqCst);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::channel(32);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let _ = self.attempts.send(ConnAttempt {
            inbound: inbound_tx,
            sent: sent.clone(),
        });
        let transport = FakeTransport {
            inbound: inbound_rx,
            outgoing: outgoing_rx,
            sent,
        };
        Ok((Box::new(transport), outgoing_tx))
    }
}

fn supervisor_config() -> SupervisorConfig {
    SupervisorConfig {
        websocket_url: "wss://fake.invalid/socket".to_string(),
        heartbeat_idle: Duration::from_secs(30),
        reconnect_backoff_base: Duration::from_millis(15),
        reconnect_backoff_cap: Duration::from_millis(60),
    }
}

fn bars_event(series_slot: &str, n: u32) -> InboundEvent {
    let points: Vec<_> = (0..n)
        .map(|i| {
            serde_json::json!({ "v": [
                1_700_000_000.0 + (i as f64 * 86_400.0), 10.0, 11.0, 9.0, 10.5, 100.0
            ] })
        })
        .collect();
    InboundEvent::TimescaleUpdate {
        series_id: series_slot.to_string(),
        data: serde_json::json!({ series_slot: { "s": points } }),
    }
}

/// A study `du`/`timescale_update` frame, keyed by the *study* slot id —
/// never the parent series slot id, per §6's wire format.
fn study_event(study_slot: &str, n: u32) -> InboundEvent {
    let points: Vec<_> = (0..n)
        .map(|i| {
            serde_json::json!({ "v": [
                1_700_000_000.0 + (i as f64 * 86_400.0), 1.0, 2.0, 3.0, 4.0
            ] })
        })
        .collect();
    InboundEvent::TimescaleUpdate {
        series_id: study_slot.to_string(),
        data: serde_json::json!({ study_slot: { "st": points } }),
    }
}

fn method_names(sent: &[OutgoingFrame]) -> Vec<String> {
    sent.iter()
        .filter_map(|f| match f {
            OutgoingFrame::Method(m) => Some(m.m.to_string()),
            _ => None,
        })
        .collect()
}

async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn request(symbol: &str, resolution: Resolution) -> ChartRequest {
    ChartRequest {
        symbol: symbol.to_string(),
        resolution,
        bar_count: 5,
        cvd: None,
    }
}

#[tokio::test]
async fn slot_reuse_across_successive_requests_never_removes() {
    let (attempts_tx, mut attempts_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(FakeConnector {
        attempts: attempts_tx,
        dial_count: AtomicU64::new(0),
    });
    let pool = ConnectionPool::start(
        1,
        connector,
        Arc::new(StaticJwtProvider),
        supervisor_config(),
    );
    let attempt = attempts_rx.recv().await.expect("a dial attempt");

    let cancel = CancellationToken::new();
    let study_config = StudyConfig::new();

    // First request: no matching slot exists yet, so `create_series` fires.
    let guard = pool
        .acquire(Duration::from_secs(2), &cancel)
        .await
        .expect("connection becomes ready");
    let req1 = request("NSE:RELIANCE", Resolution::Daily);
    let bars_tx = attempt.inbound.clone();
    let feed = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(15)).await;
        let _ = bars_tx.send(TransportPollResult::Event(bars_event("sds_1", 5)));
    });
    let result1 = fetch_chart(&guard, &req1, &study_config, Duration::from_secs(2), &cancel).await;
    feed.await.unwrap();
    assert!(result1.is_ok(), "{result1:?}");
    drop(guard);

    // Second request: same resolution, different symbol — must reuse the
    // slot via `modify_series`, never `remove_series` (§8 property 3).
    let guard = pool
        .acquire(Duration::from_secs(2), &cancel)
        .await
        .expect("connection still ready");
    let req2 = request("NSE:TCS", Resolution::Daily);
    let bars_tx = attempt.inbound.clone();
    let feed = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(15)).await;
        let _ = bars_tx.send(TransportPollResult::Event(bars_event("sds_1", 5)));
    });
    let result2 = fetch_chart(&guard, &req2, &study_config, Duration::from_secs(2), &cancel).await;
    feed.await.unwrap();
    assert!(result2.is_ok(), "{result2:?}");
    drop(guard);

    let sent = attempt.sent.lock().clone();
    let names = method_names(&sent);
    assert_eq!(
        names,
        vec![
            "set_auth_token",
            "chart_create_session",
            "create_series",
            "modify_series",
        ]
    );
}

#[tokio::test]
async fn inbound_heartbeat_is_echoed_back_verbatim() {
    let (attempts_tx, mut attempts_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(FakeConnector {
        attempts: attempts_tx,
        dial_count: AtomicU64::new(0),
    });
    let pool = ConnectionPool::start(
        1,
        connector,
        Arc::new(StaticJwtProvider),
        supervisor_config(),
    );
    let attempt = attempts_rx.recv().await.expect("a dial attempt");

    let cancel = CancellationToken::new();
    let _guard = pool
        .acquire(Duration::from_secs(2), &cancel)
        .await
        .expect("connection becomes ready");

    attempt
        .inbound
        .send(TransportPollResult::Heartbeat("42".to_string()))
        .unwrap();

    // §8 property 4: the next outbound frame must be the exact wire bytes
    // `~m~<len>~m~~h~N`, not merely an `OutgoingFrame::HeartbeatEcho`
    // carrying the right digits — a stripped `~h~` prefix on re-encode would
    // still satisfy the weaker check.
    let expected = encode_frame("~h~42");
    let echoed = wait_until(
        || {
            attempt
                .sent
                .lock()
                .iter()
                .any(|f| matches!(f, OutgoingFrame::HeartbeatEcho(_)) && f.encode() == expected)
        },
        Duration::from_millis(300),
    )
    .await;
    assert!(echoed, "heartbeat was not echoed back verbatim");
}

#[tokio::test]
async fn cancellation_returns_promptly_and_frees_the_connection() {
    let (attempts_tx, mut attempts_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(FakeConnector {
        attempts: attempts_tx,
        dial_count: AtomicU64::new(0),
    });
    let pool = ConnectionPool::start(
        1,
        connector,
        Arc::new(StaticJwtProvider),
        supervisor_config(),
    );
    let _attempt = attempts_rx.recv().await.expect("a dial attempt");

    let pool_cancel = CancellationToken::new();
    let guard = pool
        .acquire(Duration::from_secs(2), &pool_cancel)
        .await
        .expect("connection becomes ready");

    let request_cancel = CancellationToken::new();
    let study_config = StudyConfig::new();
    let req = request("NSE:RELIANCE", Resolution::Daily);

    let canceller = request_cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    // No bars are ever pushed — only cancellation resolves this await.
    let result = fetch_chart(
        &guard,
        &req,
        &study_config,
        Duration::from_secs(5),
        &request_cancel,
    )
    .await;
    let elapsed = started.elapsed();

    assert!(result.is_err());
    assert!(
        elapsed < Duration::from_millis(200),
        "cancellation took too long: {elapsed:?}"
    );

    drop(guard);
    assert!(
        pool.acquire(Duration::from_millis(200), &CancellationToken::new())
            .await
            .is_ok(),
        "connection must return to Ready after the cancelled request releases it"
    );
}

#[tokio::test]
async fn mid_request_connection_loss_reconnects_and_a_retry_succeeds() {
    let (attempts_tx, mut attempts_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(FakeConnector {
        attempts: attempts_tx,
        dial_count: AtomicU64::new(0),
    });
    let pool = ConnectionPool::start(
        1,
        connector,
        Arc::new(StaticJwtProvider),
        supervisor_config(),
    );
    let first_attempt = attempts_rx.recv().await.expect("initial dial");

    let cancel = CancellationToken::new();
    let study_config = StudyConfig::new();
    let req = request("NSE:RELIANCE", Resolution::Daily);

    let guard = pool
        .acquire(Duration::from_secs(2), &cancel)
        .await
        .expect("connection becomes ready");

    let killer = first_attempt.inbound.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(15)).await;
        let _ = killer.send(TransportPollResult::Closed(GatewayError::Transport(
            "socket reset".to_string(),
        )));
    });

    let result = fetch_chart(&guard, &req, &study_config, Duration::from_secs(2), &cancel).await;
    assert!(
        matches!(result, Err(GatewayError::Transport(_))),
        "expected a Transport error, got {result:?}"
    );
    drop(guard);

    let second_attempt = attempts_rx
        .recv()
        .await
        .expect("supervisor redials after the drop");

    let guard = pool
        .acquire(Duration::from_secs(2), &cancel)
        .await
        .expect("pool recovers a Ready connection after reconnect");

    let bars_tx = second_attempt.inbound.clone();
    let feed = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(15)).await;
        let _ = bars_tx.send(TransportPollResult::Event(bars_event("sds_1", 5)));
    });
    let retry = fetch_chart(&guard, &req, &study_config, Duration::from_secs(2), &cancel).await;
    feed.await.unwrap();
    assert!(retry.is_ok(), "retry after reconnect should succeed: {retry:?}");
}

#[tokio::test]
async fn cvd_request_assembles_study_values_keyed_by_the_study_slot() {
    let (attempts_tx, mut attempts_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(FakeConnector {
        attempts: attempts_tx,
        dial_count: AtomicU64::new(0),
    });
    let pool = ConnectionPool::start(
        1,
        connector,
        Arc::new(StaticJwtProvider),
        supervisor_config(),
    );
    let attempt = attempts_rx.recv().await.expect("a dial attempt");

    let cancel = CancellationToken::new();
    let study_config = StudyConfig::with_descriptor(CvdStudyDescriptor {
        template_id: "cvd_template".to_string(),
        parameter_schema: serde_json::Value::Null,
    });

    let guard = pool
        .acquire(Duration::from_secs(2), &cancel)
        .await
        .expect("connection becomes ready");

    let mut req = request("NSE:RELIANCE", Resolution::Daily);
    req.cvd = Some(CvdOptions {
        anchor_period: "3M".to_string(),
        timeframe: None,
    });

    let inbound = attempt.inbound.clone();
    let feed = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(15)).await;
        // The study slot (st_1) is allocated after the series slot
        // (sds_1); its data frame is keyed by its own slot id, not the
        // series slot's, per §6.
        let _ = inbound.send(TransportPollResult::Event(bars_event("sds_1", 5)));
        let _ = inbound.send(TransportPollResult::Event(study_event("st_1", 5)));
    });

    let result = fetch_chart(&guard, &req, &study_config, Duration::from_secs(2), &cancel).await;
    feed.await.unwrap();
    let payload = result.expect("cvd request should succeed");
    let cvd = payload
        .indicators
        .cvd
        .expect("cvd study values should be present");
    assert_eq!(cvd.values.len(), 5);

    let sent = attempt.sent.lock().clone();
    assert_eq!(method_names(&sent).last().map(String::as_str), Some("create_study"));
}
