use std::fmt;
use std::str::FromStr;

use crate::error::GatewayError;

/// A bar duration identifier. Closed set per §3: `1D`, `1W`, `1M`, the
/// intraday minute-count strings, `15S`/`30S` sub-minute codes, and an escape
/// hatch for vendor-specific custom codes that still parse as a resolution
/// string without matching one of the well-known variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Resolution {
    Seconds15,
    Seconds30,
    Minutes(u32),
    Daily,
    Weekly,
    Monthly,
    Custom(String),
}

impl Resolution {
    /// Ordering rank used to validate that a CVD delta timeframe is strictly
    /// finer than the chart's main resolution (§4.9's implicit ordering
    /// table: `15S < 30S < 1 < 5 < 15 < 30 < 60 < D < W < M`).
    fn rank(&self) -> Option<u32> {
        match self {
            Resolution::Seconds15 => Some(0),
            Resolution::Seconds30 => Some(1),
            Resolution::Minutes(n) => Some(10 + *n),
            Resolution::Daily => Some(10_000),
            Resolution::Weekly => Some(10_001),
            Resolution::Monthly => Some(10_002),
            Resolution::Custom(_) => None,
        }
    }

    /// `true` if `self` is a strictly finer granularity than `other`. Custom
    /// codes are never comparable and always fail this check, matching the
    /// "validation fails before any network call" requirement for
    /// unrecognized timeframes.
    pub fn is_finer_than(&self, other: &Resolution) -> bool {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    /// The wire string the vendor protocol expects for this resolution.
    pub fn as_wire_str(&self) -> String {
        match self {
            Resolution::Seconds15 => "15S".to_string(),
            Resolution::Seconds30 => "30S".to_string(),
            Resolution::Minutes(n) => n.to_string(),
            Resolution::Daily => "D".to_string(),
            Resolution::Weekly => "W".to_string(),
            Resolution::Monthly => "M".to_string(),
            Resolution::Custom(s) => s.clone(),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_wire_str())
    }
}

impl FromStr for Resolution {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "15S" => Resolution::Seconds15,
            "30S" => Resolution::Seconds30,
            "D" | "1D" => Resolution::Daily,
            "W" | "1W" => Resolution::Weekly,
            "M" | "1M" => Resolution::Monthly,
            other => {
                if let Ok(n) = other.parse::<u32>() {
                    Resolution::Minutes(n)
                } else if !other.is_empty() {
                    Resolution::Custom(other.to_string())
                } else {
                    return Err(GatewayError::UnsupportedResolution(s.to_string()));
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_codes() {
        assert_eq!("1D".parse::<Resolution>().unwrap(), Resolution::Daily);
        assert_eq!("15".parse::<Resolution>().unwrap(), Resolution::Minutes(15));
        assert_eq!(
            "15S".parse::<Resolution>().unwrap(),
            Resolution::Seconds15
        );
    }

    #[test]
    fn ordering_matches_spec_table() {
        let order = [
            Resolution::Seconds15,
            Resolution::Seconds30,
            Resolution::Minutes(1),
            Resolution::Minutes(5),
            Resolution::Minutes(15),
            Resolution::Minutes(30),
            Resolution::Minutes(60),
            Resolution::Daily,
            Resolution::Weekly,
            Resolution::Monthly,
        ];
        for pair in order.windows(2) {
            assert!(
                pair[0].is_finer_than(&pair[1]),
                "{:?} should be finer than {:?}",
                pair[0],
                pair[1]
            );
            assert!(!pair[1].is_finer_than(&pair[0]));
        }
    }

    #[test]
    fn custom_codes_never_compare() {
        let custom = Resolution::Custom("R|1M".to_string());
        assert!(!custom.is_finer_than(&Resolution::Daily));
        assert!(!Resolution::Minutes(15).is_finer_than(&custom));
    }
}
