//! The connection supervisor (C5): single long-lived connection lifecycle —
//! authenticate, heartbeat echo, idle reuse, reconnect with backoff,
//! draining — plus the event-routing seam the request coordinator (C7) uses
//! to await the vendor's asynchronous responses.

mod events;
mod jwt_provider;
mod supervisor;

pub use events::{EventRouter, RoutedEvent};
pub use jwt_provider::JwtProvider;
pub use supervisor::{spawn as spawn_connection, ConnectionHandle, SupervisorConfig};
