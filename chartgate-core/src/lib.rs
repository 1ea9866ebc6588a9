//! Protocol engine (C4) for the vendor's length-prefixed text WebSocket
//! protocol, plus the configuration-file convention and small sync/logging
//! helpers shared by `chartgate-client`.
//!
//! The bit-exact wire format lives here, completely decoupled from the
//! transport that carries it (`chartgate-client::transport`) and from the
//! session state machine that interprets the semantic events it produces.

pub mod comms;
pub mod config;
pub mod slots;
pub mod sync;

mod log_macros;

pub use comms::frame::{decode_frame, encode_frame, FrameError};
pub use comms::message::{InboundEvent, OutboundMethod, ProtocolMessage};
pub use config::{Config, ConfigError};
pub use slots::{SeriesSlot, SlotTable, StudySlot};
