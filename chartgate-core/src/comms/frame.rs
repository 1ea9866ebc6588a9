//! Bit-exact implementation of the vendor's frame: ASCII `~m~`, a decimal
//! length, ASCII `~m~`, then that many payload bytes (§6). Must be exact —
//! the heartbeat echo test in §8 compares outbound bytes directly.

use thiserror::Error;

const MARKER: &str = "~m~";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is missing its opening marker")]
    MissingOpenMarker,
    #[error("frame length field is not a valid decimal number")]
    InvalidLength,
    #[error("frame is missing its closing marker")]
    MissingCloseMarker,
    #[error("declared length {declared} does not match available payload bytes {available}")]
    LengthMismatch { declared: usize, available: usize },
}

/// Encode one payload (a heartbeat token or a JSON-serialized method call)
/// into the vendor's length-prefixed frame.
pub fn encode_frame(payload: &str) -> String {
    format!("{MARKER}{}{MARKER}{payload}", payload.len())
}

/// The outcome of decoding as much of `buf` as forms one complete frame.
pub struct DecodedFrame<'a> {
    pub payload: &'a str,
    /// Byte offset in `buf` immediately after this frame, i.e. where the next
    /// frame (if any) begins.
    pub consumed: usize,
}

/// Decode the first complete frame at the start of `buf`, if one is present.
/// Returns `Ok(None)` if `buf` holds an incomplete frame (more bytes needed),
/// and `Err` if the bytes present so far cannot possibly form a valid frame.
pub fn decode_frame(buf: &str) -> Result<Option<DecodedFrame<'_>>, FrameError> {
    let Some(rest) = buf.strip_prefix(MARKER) else {
        if MARKER.starts_with(buf) {
            // Not enough bytes yet to know; treat as incomplete.
            return Ok(None);
        }
        return Err(FrameError::MissingOpenMarker);
    };

    let Some(marker_pos) = rest.find(MARKER) else {
        // Length field not terminated yet — could still be incomplete, unless
        // it already contains a non-digit, which can never become valid.
        return if rest.chars().all(|c| c.is_ascii_digit()) {
            Ok(None)
        } else {
            Err(FrameError::MissingCloseMarker)
        };
    };

    let len_str = &rest[..marker_pos];
    let declared: usize = len_str.parse().map_err(|_| FrameError::InvalidLength)?;

    let payload_start = marker_pos + MARKER.len();
    let payload_region = &rest[payload_start..];

    if payload_region.len() < declared {
        return Ok(None);
    }

    let payload = &payload_region[..declared];
    let consumed = MARKER.len() + len_str.len() + MARKER.len() + declared;

    Ok(Some(DecodedFrame { payload, consumed }))
}

/// `true` if a decoded payload is a heartbeat token (`~h~<digits>`), per §6.
pub fn is_heartbeat_payload(payload: &str) -> bool {
    payload
        .strip_prefix("~h~")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Extract the heartbeat sequence number from a `~h~<digits>` payload.
pub fn heartbeat_number(payload: &str) -> Option<&str> {
    payload.strip_prefix("~h~")
}
