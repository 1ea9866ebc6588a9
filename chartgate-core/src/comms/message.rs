//! The vendor's dynamic message shapes, modeled as a tagged variant with one
//! case per method name and a catch-all for unknown methods, per §9's
//! "Dynamic message shapes" design note.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound method call: `{"m": method, "p": params}`.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMethod {
    pub m: &'static str,
    pub p: Vec<Value>,
}

impl OutboundMethod {
    pub fn new(method: &'static str, params: Vec<Value>) -> Self {
        Self { m: method, p: params }
    }

    /// Serialize to the JSON payload that gets wrapped in a frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("OutboundMethod only contains serializable JSON values")
    }
}

/// One of the inbound events listed in §6, or an unrecognized method name
/// (logged and dropped by the engine, never surfaced as an error).
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    SeriesLoading { series_id: String },
    SeriesCompleted { series_id: String },
    TimescaleUpdate { series_id: String, data: Value },
    DataUpdate { series_id: String, data: Value },
    StudyLoading { study_id: String },
    StudyCompleted { study_id: String },
    StudyError { study_id: String, message: String },
    SymbolResolved { series_id: String, symbol: Value },
    SymbolError { series_id: String, message: String },
    CriticalError { message: String },
    Heartbeat { n: String },
    /// A method this engine doesn't know about. Carries the raw method name
    /// only, for a debug log line — never an error.
    Unknown { method: String },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    m: String,
    #[serde(default)]
    p: Value,
}

/// Parse one decoded frame payload into a [`ProtocolMessage`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolMessage {
    Heartbeat { n: String },
    Event(InboundEvent),
}

fn nth_param(p: &Value, idx: usize) -> Value {
    p.as_array()
        .and_then(|a| a.get(idx))
        .cloned()
        .unwrap_or(Value::Null)
}

fn nth_param_as_string(p: &Value, idx: usize) -> String {
    p.as_array()
        .and_then(|a| a.get(idx))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// The first (and only) key of a `{slotId: {...}}` data map, i.e. which slot
/// a `du`/`timescale_update` frame's payload belongs to.
fn slot_id_from_data(data: &Value) -> String {
    data.as_object()
        .and_then(|m| m.keys().next())
        .cloned()
        .unwrap_or_default()
}

impl ProtocolMessage {
    /// Parse a decoded frame payload. Heartbeats are recognized before JSON
    /// parsing is attempted, since they are not JSON.
    pub fn parse(payload: &str) -> Result<ProtocolMessage, serde_json::Error> {
        if let Some(n) = super::frame::heartbeat_number(payload) {
            return Ok(ProtocolMessage::Heartbeat { n: n.to_string() });
        }

        let envelope: Envelope = serde_json::from_str(payload)?;
        // Every event below except `critical_error` carries the chart
        // session id as p[0] (mirrored from the `chart_create_session` id
        // this core itself sent); the slot id or payload follows at p[1].
        let event = match envelope.m.as_str() {
            "series_loading" => InboundEvent::SeriesLoading {
                series_id: nth_param_as_string(&envelope.p, 1),
            },
            "series_completed" => InboundEvent::SeriesCompleted {
                series_id: nth_param_as_string(&envelope.p, 1),
            },
            "timescale_update" => {
                let data = nth_param(&envelope.p, 1);
                InboundEvent::TimescaleUpdate {
                    series_id: slot_id_from_data(&data),
                    data,
                }
            }
            "du" => {
                let data = nth_param(&envelope.p, 1);
                InboundEvent::DataUpdate {
                    series_id: slot_id_from_data(&data),
                    data,
                }
            }
            "study_loading" => InboundEvent::StudyLoading {
                study_id: nth_param_as_string(&envelope.p, 1),
            },
            "study_completed" => InboundEvent::StudyCompleted {
                study_id: nth_param_as_string(&envelope.p, 1),
            },
            "study_error" => InboundEvent::StudyError {
                study_id: nth_param_as_string(&envelope.p, 1),
                message: nth_param_as_string(&envelope.p, 2),
            },
            "symbol_resolved" => InboundEvent::SymbolResolved {
                series_id: nth_param_as_string(&envelope.p, 1),
                symbol: nth_param(&envelope.p, 2),
            },
            "symbol_error" => InboundEvent::SymbolError {
                series_id: nth_param_as_string(&envelope.p, 1),
                message: nth_param_as_string(&envelope.p, 2),
            },
            "critical_error" => InboundEvent::CriticalError {
                message: nth_param_as_string(&envelope.p, 0),
            },
            other => InboundEvent::Unknown {
                method: other.to_string(),
            },
        };
        Ok(ProtocolMessage::Event(event))
    }
}
