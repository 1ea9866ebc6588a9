use std::collections::VecDeque;

use async_trait::async_trait;
use chartgate_core::comms::{
    frame::{decode_frame, encode_frame},
    message::{OutboundMethod, ProtocolMessage},
};
use chartgate_types::GatewayError;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

use super::{Connector, Transport, TransportPollResult};

const OUTGOING_QUEUE_SIZE: usize = 32;

/// Everything the writer side of a [`WsTransport`] can be asked to send: a
/// JSON method call, or a verbatim heartbeat echo. Both share the same
/// bounded queue, matching §4.4's "single writer task, back-pressure bounded
/// by the pool's per-connection concurrency of one".
#[derive(Debug, Clone)]
pub enum OutgoingFrame {
    Method(OutboundMethod),
    HeartbeatEcho(String),
    /// A client-initiated heartbeat sent after the idle window elapses with
    /// no inbound heartbeat (§4.5); framed identically to a vendor heartbeat
    /// so the wire-level shape is indistinguishable from an echo.
    Ping(u64),
}

impl OutgoingFrame {
    /// The exact bytes this frame puts on the wire, framed per §6. Exposed
    /// (rather than kept private) so callers can assert on it directly —
    /// e.g. the heartbeat-echo property in §8 is about wire bytes, not about
    /// the enum shape carrying them.
    pub fn encode(&self) -> String {
        match self {
            OutgoingFrame::Method(m) => encode_frame(&m.to_json()),
            OutgoingFrame::HeartbeatEcho(payload) => encode_frame(&format!("~h~{payload}")),
            OutgoingFrame::Ping(n) => encode_frame(&format!("~h~{n}")),
        }
    }
}

/// A single vendor WebSocket connection. One reader, one writer,
/// multiplexed over the same socket, driven by repeated calls to `poll`,
/// which selects between "something to write" and "something arrived"
/// rather than running the reader and writer as separate tasks.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outgoing: mpsc::Receiver<OutgoingFrame>,
    /// Frames already decoded out of a WS text message but not yet handed
    /// back to the caller; a single WS message may carry several vendor
    /// frames back to back.
    pending: VecDeque<ProtocolMessage>,
    /// Bytes received but not yet forming a complete frame.
    read_buffer: String,
}

impl WsTransport {
    fn queue_frames_from_text(&mut self, text: &str) -> Result<(), GatewayError> {
        self.read_buffer.push_str(text);
        loop {
            match decode_frame(&self.read_buffer) {
                Ok(Some(decoded)) => {
                    let msg = ProtocolMessage::parse(decoded.payload)
                        .map_err(|_| GatewayError::MalformedFrame)?;
                    let consumed = decoded.consumed;
                    self.pending.push_back(msg);
                    self.read_buffer.drain(..consumed);
                }
                Ok(None) => break,
                Err(_) => return Err(GatewayError::MalformedFrame),
            }
        }
        Ok(())
    }

    fn next_poll_result(&mut self) -> Option<TransportPollResult> {
        self.pending.pop_front().map(|msg| match msg {
            ProtocolMessage::Heartbeat { n } => TransportPollResult::Heartbeat(n),
            ProtocolMessage::Event(event) => TransportPollResult::Event(event),
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn poll(&mut self) -> TransportPollResult {
        if let Some(result) = self.next_poll_result() {
            return result;
        }

        tokio::select! {
            biased;

            incoming = self.stream.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Err(e) = self.queue_frames_from_text(&text) {
                            return TransportPollResult::Closed(e);
                        }
                        self.next_poll_result().unwrap_or(TransportPollResult::Idle)
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        TransportPollResult::Closed(GatewayError::UnexpectedClose)
                    }
                    Some(Ok(_)) => TransportPollResult::Idle,
                    Some(Err(e)) => TransportPollResult::Closed(GatewayError::Transport(e.to_string())),
                }
            }

            outgoing = self.outgoing.recv() => {
                match outgoing {
                    Some(frame) => {
                        match self.stream.send(WsMessage::Text(frame.encode())).await {
                            Ok(()) => TransportPollResult::OutgoingSent,
                            Err(e) => TransportPollResult::Closed(GatewayError::Transport(e.to_string())),
                        }
                    }
                    None => TransportPollResult::Idle,
                }
            }
        }
    }
}

/// Dials the vendor over a real TLS/TCP WebSocket, the only `Connector`
/// implementation used outside tests.
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn Transport>, mpsc::Sender<OutgoingFrame>), GatewayError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| GatewayError::DialFailed(e.to_string()))?;

        let (tx, rx) = mpsc::channel(OUTGOING_QUEUE_SIZE);
        let transport = WsTransport {
            stream,
            outgoing: rx,
            pending: VecDeque::new(),
            read_buffer: String::new(),
        };
        Ok((Box::new(transport), tx))
    }
}
