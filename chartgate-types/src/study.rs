/// One sample of a study series: a time plus the four anchored OHLC-shaped
/// values the vendor emits for CVD.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StudySeriesPoint {
    pub time: i64,
    pub values: [f64; 4],
}

/// `{studyId, studyName, values}` per §3. For CVD the four values per point
/// are the anchored cumulative delta series.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StudyData {
    pub study_id: String,
    pub study_name: String,
    pub values: Vec<StudySeriesPoint>,
}

/// CVD options carried on a chart request, per the request fingerprint in §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CvdOptions {
    pub anchor_period: String,
    /// Sampling granularity for CVD; if set, must be strictly finer than the
    /// chart's main resolution (validated before any network call, §4.9).
    pub timeframe: Option<String>,
}
