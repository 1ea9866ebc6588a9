/// One OHLCV tuple at a fixed time on a fixed resolution.
///
/// Invariant (enforced by the caller, not this type): within a `Vec<OhlcvBar>`
/// returned as part of a [`crate::ChartPayload`], bars are strictly
/// increasing by `time`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OhlcvBar {
    /// Seconds since the Unix epoch, UTC.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// `true` if any OHLCV field is NaN. Used to reject a payload with
    /// `InvalidBarData` per §4.7 step 4.
    pub fn has_invalid_value(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .any(|v| v.is_nan())
    }
}

/// Checks the §3 ordering invariant: bars must be strictly increasing by
/// `time`. Returns the index of the first violation, if any.
pub fn first_ordering_violation(bars: &[OhlcvBar]) -> Option<usize> {
    bars.windows(2).position(|w| w[1].time <= w[0].time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time: i64) -> OhlcvBar {
        OhlcvBar {
            time,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        }
    }

    #[test]
    fn detects_non_monotonic_bars() {
        let bars = vec![bar(1), bar(2), bar(2)];
        assert_eq!(first_ordering_violation(&bars), Some(1));
        let bars = vec![bar(1), bar(2), bar(3)];
        assert_eq!(first_ordering_violation(&bars), None);
    }

    #[test]
    fn nan_is_invalid() {
        let mut b = bar(1);
        b.close = f64::NAN;
        assert!(b.has_invalid_value());
    }
}
