//! Transport layer: carries the vendor's length-prefixed text frames over a
//! WebSocket. Split from the session supervisor so a fake transport can
//! stand in for tests (`Connector` is the seam).

mod ws;

pub use ws::{OutgoingFrame, TungsteniteConnector, WsTransport};

use async_trait::async_trait;
use chartgate_core::comms::message::InboundEvent;
use chartgate_types::GatewayError;
use tokio::sync::mpsc;

/// One outcome of polling the transport once. The caller is expected to call
/// `poll` again in a loop, typically racing it against other futures in a
/// `tokio::select!`.
#[derive(Debug)]
pub enum TransportPollResult {
    Heartbeat(String),
    Event(InboundEvent),
    OutgoingSent,
    /// Nothing happened this poll; used so the caller's idle-heartbeat timer
    /// can still be driven without the transport itself owning a timer.
    Idle,
    Closed(GatewayError),
}

/// A live connection to the vendor, abstracted so the supervisor doesn't
/// need to know whether it's talking to a real WebSocket or a fake one
/// substituted in a test.
#[async_trait]
pub trait Transport: Send {
    async fn poll(&mut self) -> TransportPollResult;
}

/// Abstraction over "dial a vendor endpoint and hand back a transport plus a
/// sender for outgoing frames", so a fake connector can stand in for tests.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn Transport>, mpsc::Sender<OutgoingFrame>), GatewayError>;
}
