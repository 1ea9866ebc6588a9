//! Routes inbound vendor events from the supervisor's poll loop to whichever
//! coordinator is currently awaiting them.
//!
//! Because the pool enforces at most one in-flight request per connection
//! (§3's pool invariant), a connection only ever needs a single active
//! subscriber at a time — there is no need for a request-id keyed map. This
//! is the "select-style primitive over {bars, timeout, cancel}" called for
//! in §9's re-architecture note.

use chartgate_core::comms::message::InboundEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// An event forwarded to the coordinator currently holding the connection,
/// or a signal that the connection itself died while a request was in
/// flight.
#[derive(Debug, Clone)]
pub enum RoutedEvent {
    Inbound(InboundEvent),
    ConnectionClosed,
}

#[derive(Default)]
pub struct EventRouter {
    current: Mutex<Option<mpsc::UnboundedSender<RoutedEvent>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register as the sole subscriber for this connection's events. Any
    /// previous subscription is dropped: only one request may be in flight
    /// on a connection at a time.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RoutedEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.current.lock() = Some(tx);
        rx
    }

    /// Stop forwarding events to whichever subscriber is registered, called
    /// when a request coordinator releases the connection.
    pub fn unsubscribe(&self) {
        *self.current.lock() = None;
    }

    /// Forward an inbound event to the current subscriber, if any. Silently
    /// drops the event if nobody is currently listening (§9: catch-all
    /// "unknown methods are logged and dropped" extends naturally to events
    /// with no active request).
    pub fn route(&self, event: InboundEvent) {
        if let Some(tx) = self.current.lock().as_ref() {
            let _ = tx.send(RoutedEvent::Inbound(event));
        }
    }

    /// Notify the current subscriber, if any, that the connection has died.
    pub fn notify_closed(&self) {
        if let Some(tx) = self.current.lock().as_ref() {
            let _ = tx.send(RoutedEvent::ConnectionClosed);
        }
    }
}
