//! Request coordinator (C7): builds series/study requests on a loaned
//! connection, correlates the vendor's asynchronous response events, and
//! assembles the final chart payload, enforcing the per-request budget
//! (§4.7).

use std::time::{Duration, Instant};

use chartgate_core::comms::message::{InboundEvent, OutboundMethod};
use chartgate_types::{
    first_ordering_violation, ChartPayload, ChartRequest, GatewayError, Indicators, OhlcvBar,
    Resolution, StudyData, StudySeriesPoint, SymbolMetadata,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::session::{ConnectionHandle, RoutedEvent};
use crate::study_config::StudyConfig;
use crate::transport::OutgoingFrame;

/// CVD is abandoned if it hasn't arrived within this long after the bars
/// themselves completed (§4.7).
const STUDY_GRACE: Duration = Duration::from_millis(2000);

/// Vendor-observed tolerance on requested vs. delivered bar count (§8
/// property 6).
const BAR_COUNT_TOLERANCE: u32 = 2;

pub async fn fetch_chart(
    conn: &ConnectionHandle,
    request: &ChartRequest,
    study_config: &StudyConfig,
    budget: Duration,
    cancel: &CancellationToken,
) -> Result<ChartPayload, GatewayError> {
    let deadline = Instant::now() + budget;

    let series_slot_id = issue_series_request(conn, request).await?;
    let study_slot_id = if let Some(cvd) = &request.cvd {
        Some(issue_study_request(conn, request, &series_slot_id, cvd, study_config).await?)
    } else {
        None
    };

    let mut events = conn.events.subscribe();

    let mut bars: Option<Vec<OhlcvBar>> = None;
    let mut metadata: Option<SymbolMetadata> = None;
    let mut study_values: Option<Vec<StudySeriesPoint>> = None;
    let mut bars_completed_at: Option<Instant> = None;

    loop {
        // Done once bars have arrived and, if CVD was requested, either the
        // study values arrived too or its grace period has elapsed.
        if bars.is_some() {
            if study_slot_id.is_none() || study_values.is_some() {
                break;
            }
            if let Some(since) = bars_completed_at {
                if since.elapsed() >= STUDY_GRACE {
                    return Err(GatewayError::StudyNotReturned);
                }
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(GatewayError::Timeout);
        }
        let wait_for = match bars_completed_at {
            Some(since) => remaining.min(STUDY_GRACE.saturating_sub(since.elapsed())),
            None => remaining,
        };

        let event = tokio::select! {
            _ = cancel.cancelled() => return Err(GatewayError::Timeout),
            _ = tokio::time::sleep(wait_for) => continue,
            event = events.recv() => match event {
                Some(e) => e,
                None => return Err(GatewayError::Transport(String::from("event channel closed"))),
            },
        };

        match event {
            RoutedEvent::ConnectionClosed => return Err(GatewayError::Transport(String::from("connection closed"))),
            RoutedEvent::Inbound(inbound) => match inbound {
                InboundEvent::SymbolError { series_id, message } if series_id == series_slot_id => {
                    return Err(GatewayError::SymbolNotResolved(message));
                }
                InboundEvent::SymbolResolved { series_id, symbol } if series_id == series_slot_id => {
                    metadata = parse_symbol_metadata(&symbol);
                }
                InboundEvent::CriticalError { message } => {
                    return Err(GatewayError::CriticalError(message));
                }
                InboundEvent::StudyError { study_id, message }
                    if Some(&study_id) == study_slot_id.as_ref() =>
                {
                    return Err(GatewayError::StudyError(message));
                }
                InboundEvent::TimescaleUpdate { series_id, data }
                | InboundEvent::DataUpdate { series_id, data } => {
                    if bars.is_none() && series_id == series_slot_id {
                        if let Some(parsed) = parse_series_bars(&data, &series_slot_id) {
                            let delivered = parsed.len() as u32;
                            let covers_request = delivered + BAR_COUNT_TOLERANCE >= request.bar_count;
                            if covers_request && first_ordering_violation(&parsed).is_none() {
                                bars = Some(parsed);
                                bars_completed_at = Some(Instant::now());
                            }
                        }
                    }
                    if let Some(study_id) = &study_slot_id {
                        if series_id == *study_id {
                            if let Some(parsed) = parse_study_values(&data, study_id) {
                                study_values = Some(parsed);
                            }
                        }
                    }
                }
                InboundEvent::SeriesCompleted { series_id } if series_id == series_slot_id => {
                    if bars_completed_at.is_none() && bars.is_some() {
                        bars_completed_at = Some(Instant::now());
                    }
                }
                _ => {}
            },
        }
    }

    let bars = bars.ok_or(GatewayError::NoBars)?;
    if bars.is_empty() {
        return Err(GatewayError::NoBars);
    }
    if bars.iter().any(OhlcvBar::has_invalid_value) {
        return Err(GatewayError::InvalidBarData);
    }
    if first_ordering_violation(&bars).is_some() {
        return Err(GatewayError::InvalidBarData);
    }

    let metadata = metadata.unwrap_or(SymbolMetadata {
        qualified_symbol: request.symbol.clone(),
        tick_size: 0.0,
        price_scale: 1,
        minimum_move: 0.0,
    });

    let indicators = Indicators {
        cvd: study_values.map(|values| StudyData {
            study_id: study_slot_id.clone().unwrap_or_default(),
            study_name: "cvd".to_string(),
            values,
        }),
    };

    Ok(ChartPayload {
        symbol: request.symbol.clone(),
        resolution: request.resolution.clone(),
        bars,
        metadata,
        indicators,
    })
}

/// Reuses an existing series slot with `modify_series` when one already
/// shows this resolution, regardless of which symbol it currently carries;
/// otherwise allocates a new slot and issues `create_series` (§4.7 step 1,
/// §8 property 3).
async fn issue_series_request(
    conn: &ConnectionHandle,
    request: &ChartRequest,
) -> Result<String, GatewayError> {
    let reused_slot = conn
        .slots
        .lock()
        .find_reusable(&request.resolution)
        .map(|s| s.slot_id.clone());

    if let Some(slot_id) = reused_slot {
        conn.slots
            .lock()
            .modify_series(&slot_id, request.symbol.clone(), request.bar_count);
        let method = OutboundMethod::new(
            "modify_series",
            vec![
                Value::String(slot_id.clone()),
                Value::String(String::new()),
                Value::String(request.symbol.clone()),
            ],
        );
        conn.send(OutgoingFrame::Method(method))?;
        Ok(slot_id)
    } else {
        let slot_id = conn
            .slots
            .lock()
            .allocate_series(
                request.symbol.clone(),
                request.resolution.clone(),
                request.bar_count,
            )
            .slot_id
            .clone();
        let method = OutboundMethod::new(
            "create_series",
            vec![
                Value::String(slot_id.clone()),
                Value::String("s1".to_string()),
                Value::String(request.symbol.clone()),
                Value::String(request.resolution.as_wire_str()),
                Value::from(request.bar_count),
            ],
        );
        conn.send(OutgoingFrame::Method(method))?;
        Ok(slot_id)
    }
}

async fn issue_study_request(
    conn: &ConnectionHandle,
    request: &ChartRequest,
    series_slot_id: &str,
    cvd: &chartgate_types::CvdOptions,
    study_config: &StudyConfig,
) -> Result<String, GatewayError> {
    let descriptor = study_config
        .descriptor()
        .ok_or(GatewayError::StudyConfigUnavailable)?;

    if let Some(timeframe) = &cvd.timeframe {
        let timeframe: Resolution = timeframe.parse()?;
        if !timeframe.is_finer_than(&request.resolution) {
            return Err(GatewayError::CvdTimeframeNotFiner);
        }
    }

    let study_slot_id = conn
        .slots
        .lock()
        .allocate_study(descriptor.template_id.clone(), series_slot_id.to_string())
        .slot_id
        .clone();

    let method = OutboundMethod::new(
        "create_study",
        vec![
            Value::String(study_slot_id.clone()),
            Value::String("st1".to_string()),
            Value::String(series_slot_id.to_string()),
            Value::String(descriptor.template_id.clone()),
            serde_json::json!({
                "anchorPeriod": cvd.anchor_period,
                "timeframe": cvd.timeframe,
            }),
        ],
    );
    conn.send(OutgoingFrame::Method(method))?;
    Ok(study_slot_id)
}

/// The vendor's update frames carry a JSON object keyed by slot id; a
/// series slot's entry holds `{"s": [{"v": [time, open, high, low, close,
/// volume]}, ...]}`.
fn parse_series_bars(data: &Value, series_slot_id: &str) -> Option<Vec<OhlcvBar>> {
    let points = data.get(series_slot_id)?.get("s")?.as_array()?;
    let mut bars = Vec::with_capacity(points.len());
    for point in points {
        let v = point.get("v")?.as_array()?;
        if v.len() < 6 {
            return None;
        }
        bars.push(OhlcvBar {
            time: v[0].as_f64()? as i64,
            open: v[1].as_f64()?,
            high: v[2].as_f64()?,
            low: v[3].as_f64()?,
            close: v[4].as_f64()?,
            volume: v[5].as_f64()?,
        });
    }
    Some(bars)
}

/// A study slot's entry holds `{"st": [{"v": [time, v0, v1, v2, v3]}, ...]}`.
fn parse_study_values(data: &Value, study_slot_id: &str) -> Option<Vec<StudySeriesPoint>> {
    let points = data.get(study_slot_id)?.get("st")?.as_array()?;
    if points.is_empty() {
        return None;
    }
    let mut values = Vec::with_capacity(points.len());
    for point in points {
        let v = point.get("v")?.as_array()?;
        if v.len() < 5 {
            return None;
        }
        values.push(StudySeriesPoint {
            time: v[0].as_f64()? as i64,
            values: [
                v[1].as_f64()?,
                v[2].as_f64()?,
                v[3].as_f64()?,
                v[4].as_f64()?,
            ],
        });
    }
    Some(values)
}

fn parse_symbol_metadata(symbol: &Value) -> Option<SymbolMetadata> {
    Some(SymbolMetadata {
        qualified_symbol: symbol.get("pro_name")?.as_str()?.to_string(),
        tick_size: symbol.get("pricescale").and_then(Value::as_f64).unwrap_or(1.0),
        price_scale: symbol
            .get("pricescale")
            .and_then(Value::as_u64)
            .unwrap_or(1) as u32,
        minimum_move: symbol.get("minmov").and_then(Value::as_f64).unwrap_or(1.0),
    })
}
