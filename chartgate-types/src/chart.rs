use crate::{
    bar::OhlcvBar,
    resolution::Resolution,
    study::{CvdOptions, StudyData},
    symbol::SymbolMetadata,
};

/// A single chart request as seen by the orchestrator (C9). Also doubles as
/// the cache key (fingerprint) for the result cache (C3) once hashed/eq'd —
/// see [`ChartRequest::fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChartRequest {
    pub symbol: String,
    pub resolution: Resolution,
    pub bar_count: u32,
    pub cvd: Option<CvdOptions>,
}

impl ChartRequest {
    /// The `(symbol, resolution, barCount, cvdEnabled, cvdAnchorPeriod,
    /// cvdTimeframe)` tuple from §3, as an opaque owned string so it can be
    /// used directly as a `HashMap` key without re-deriving `Hash` semantics
    /// for floats or nested options at every cache call site.
    pub fn fingerprint(&self) -> String {
        match &self.cvd {
            Some(cvd) => format!(
                "{}|{}|{}|1|{}|{}",
                self.symbol,
                self.resolution,
                self.bar_count,
                cvd.anchor_period,
                cvd.timeframe.as_deref().unwrap_or("")
            ),
            None => format!("{}|{}|{}|0||", self.symbol, self.resolution, self.bar_count),
        }
    }
}

/// Indicator series attached to a completed chart payload.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Indicators {
    pub cvd: Option<StudyData>,
}

/// The completed chart payload returned by `getChart`, per §3 and §6.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChartPayload {
    pub symbol: String,
    pub resolution: Resolution,
    pub bars: Vec<OhlcvBar>,
    pub metadata: SymbolMetadata,
    pub indicators: Indicators,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_distinguishes_cvd_options() {
        let base = ChartRequest {
            symbol: "NSE:RELIANCE".into(),
            resolution: Resolution::Daily,
            bar_count: 300,
            cvd: None,
        };
        let with_cvd = ChartRequest {
            cvd: Some(CvdOptions {
                anchor_period: "3M".into(),
                timeframe: None,
            }),
            ..base.clone()
        };
        assert_ne!(base.fingerprint(), with_cvd.fingerprint());
    }
}
