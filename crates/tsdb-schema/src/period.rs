use anyhow::{anyhow, Result};
use chrono::Duration;
use std::fmt;

const UNITS: [(i64, &str); 5] = [
    (604_800, "w"),
    (86_400, "d"),
    (3_600, "h"),
    (60, "m"),
    (1, "s"),
];

/// Aggregation period of a timeseries table, in whole seconds.
///
/// Zero is the tick period: rows are individual trades, not buckets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    secs: i64,
}

impl Period {
    pub const TICK: Period = Period { secs: 0 };
    pub const DAY: Period = Period { secs: 86_400 };

    pub fn from_secs(secs: i64) -> Result<Self> {
        if secs < 0 {
            return Err(anyhow!("period must be >= 0 seconds, got {secs}"));
        }
        Ok(Self { secs })
    }

    pub fn minutes(n: i64) -> Self {
        Self { secs: n * 60 }
    }

    pub fn hours(n: i64) -> Self {
        Self { secs: n * 3_600 }
    }

    pub fn days(n: i64) -> Self {
        Self { secs: n * 86_400 }
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn is_tick(&self) -> bool {
        self.secs == 0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.secs)
    }

    /// True when buckets of `self` tile buckets of `other` exactly.
    /// The tick period divides everything.
    pub fn divides(&self, other: Period) -> bool {
        if self.is_tick() {
            return true;
        }
        !other.is_tick() && other.secs % self.secs == 0
    }

    /// Parse `tick`, `0`, or `<n><unit>` with unit one of s | m | min | h | d | D | w | W.
    ///
    /// Upper-case `M` is rejected on purpose: it reads as "month".
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "tick" || s == "0" {
            return Ok(Self::TICK);
        }

        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| anyhow!("invalid period '{s}': missing unit"))?;
        let (num, unit) = s.split_at(split);
        if num.is_empty() {
            return Err(anyhow!("invalid period '{s}': missing count"));
        }
        let n: i64 = num
            .parse()
            .map_err(|_| anyhow!("invalid period '{s}': bad count"))?;
        if n == 0 {
            return Err(anyhow!("invalid period '{s}': use 'tick' for unaggregated data"));
        }

        let scale = match unit {
            "s" => 1,
            "m" | "min" => 60,
            "h" => 3_600,
            "d" | "D" => 86_400,
            "w" | "W" => 604_800,
            other => {
                return Err(anyhow!(
                    "invalid period unit '{other}' in '{s}'. expected one of: s | m | h | d | w"
                ))
            }
        };

        n.checked_mul(scale)
            .map(|secs| Self { secs })
            .ok_or_else(|| anyhow!("period overflow: '{s}'"))
    }
}

impl fmt::Display for Period {
    /// Canonical form used inside table names: largest exact unit, lower case.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_tick() {
            return write!(f, "tick");
        }
        for (scale, unit) in UNITS {
            if self.secs % scale == 0 {
                return write!(f, "{}{}", self.secs / scale, unit);
            }
        }
        write!(f, "{}s", self.secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_common_spellings() {
        assert_eq!(Period::parse("tick").unwrap(), Period::TICK);
        assert_eq!(Period::parse("1m").unwrap(), Period::minutes(1));
        assert_eq!(Period::parse("5min").unwrap(), Period::minutes(5));
        assert_eq!(Period::parse("1h").unwrap(), Period::hours(1));
        assert_eq!(Period::parse("1D").unwrap(), Period::DAY);
        assert_eq!(Period::parse("1W").unwrap().secs(), 604_800);
    }

    #[test]
    fn parse_rejects_ambiguous_or_empty() {
        assert!(Period::parse("1M").is_err());
        assert!(Period::parse("m").is_err());
        assert!(Period::parse("15").is_err());
        assert!(Period::parse("0m").is_err());
        assert!(Period::parse("-5m").is_err());
    }

    #[test]
    fn display_uses_largest_exact_unit() {
        assert_eq!(Period::minutes(60).to_string(), "1h");
        assert_eq!(Period::minutes(90).to_string(), "90m");
        assert_eq!(Period::days(7).to_string(), "1w");
        assert_eq!(Period::from_secs(45).unwrap().to_string(), "45s");
        assert_eq!(Period::TICK.to_string(), "tick");
    }

    #[test]
    fn divides_rules() {
        assert!(Period::TICK.divides(Period::minutes(5)));
        assert!(Period::minutes(1).divides(Period::minutes(5)));
        assert!(Period::minutes(5).divides(Period::hours(1)));
        assert!(!Period::minutes(5).divides(Period::minutes(7)));
        assert!(!Period::minutes(1).divides(Period::TICK));
    }
}
