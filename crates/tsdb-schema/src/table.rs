use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::fmt;

use crate::Period;

/// Name of the per-schema table holding one origin row per asset class.
pub const ORIGIN_TABLE: &str = "_origin";

/// Database schema categories.
///
/// Tick / Minute / Aggregate hold timeseries tables; Security holds reference data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaKind {
    Tick,
    Minute,
    Aggregate,
    Security,
}

impl SchemaKind {
    pub const TIMESERIES: [SchemaKind; 3] =
        [SchemaKind::Tick, SchemaKind::Minute, SchemaKind::Aggregate];

    pub const ALL: [SchemaKind; 4] = [
        SchemaKind::Tick,
        SchemaKind::Minute,
        SchemaKind::Aggregate,
        SchemaKind::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Tick => "tick_data",
            SchemaKind::Minute => "minute_data",
            SchemaKind::Aggregate => "aggregate_data",
            SchemaKind::Security => "security",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "tick" | "tick_data" => Ok(SchemaKind::Tick),
            "minute" | "minute_data" => Ok(SchemaKind::Minute),
            "aggregate" | "aggregate_data" => Ok(SchemaKind::Aggregate),
            "security" => Ok(SchemaKind::Security),
            other => Err(anyhow!(
                "invalid schema '{other}'. expected one of: tick | minute | aggregate | security"
            )),
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asset-class names become table-name prefixes, so they are restricted to
/// `[a-z][a-z0-9_]*`.
pub fn is_valid_asset_class(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Session-origin timestamps for one asset class. Bucket boundaries of every
/// aggregate are aligned to one of these.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Origins {
    /// Regular trading hours.
    pub rth: DateTime<Utc>,
    /// Extended trading hours.
    pub eth: DateTime<Utc>,
    /// Higher timeframes (daily and above).
    pub htf: DateTime<Utc>,
}

impl Origins {
    pub fn new(rth: DateTime<Utc>, eth: DateTime<Utc>, htf: DateTime<Utc>) -> Self {
        Self { rth, eth, htf }
    }

    /// Origin that buckets of `table` align to.
    pub fn for_table(&self, table: &AssetTable) -> DateTime<Utc> {
        if table.period >= Period::DAY {
            self.htf
        } else if table.ext {
            self.eth
        } else {
            self.rth
        }
    }
}

/// One timeseries table of an asset class.
///
/// Identity is the full field set; the table name is derived from it and
/// parses back to the same value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetTable {
    pub asset_class: String,
    pub period: Period,
    /// Directly ingested rows (as opposed to a continuous aggregate).
    pub raw: bool,
    /// Includes extended-session data.
    pub ext: bool,
}

impl AssetTable {
    pub fn raw(asset_class: impl Into<String>, period: Period) -> Self {
        Self {
            asset_class: asset_class.into(),
            period,
            raw: true,
            ext: false,
        }
    }

    pub fn aggregate(asset_class: impl Into<String>, period: Period) -> Self {
        Self {
            asset_class: asset_class.into(),
            period,
            raw: false,
            ext: false,
        }
    }

    pub fn extended(mut self) -> Self {
        self.ext = true;
        self
    }

    pub fn is_tick(&self) -> bool {
        self.period.is_tick()
    }

    /// `{asset_class}_{period}[_raw][_ext]`
    pub fn table_name(&self) -> String {
        let mut name = format!("{}_{}", self.asset_class, self.period);
        if self.raw {
            name.push_str("_raw");
        }
        if self.ext {
            name.push_str("_ext");
        }
        name
    }

    /// Inverse of [`AssetTable::table_name`]. Returns `None` for anything that
    /// is not a canonically named timeseries table.
    pub fn parse_name(name: &str) -> Option<Self> {
        let mut rest = name;
        let ext = match rest.strip_suffix("_ext") {
            Some(r) => {
                rest = r;
                true
            }
            None => false,
        };
        let raw = match rest.strip_suffix("_raw") {
            Some(r) => {
                rest = r;
                true
            }
            None => false,
        };

        let (asset_class, period) = rest.rsplit_once('_')?;
        if !is_valid_asset_class(asset_class) {
            return None;
        }
        let period = Period::parse(period).ok()?;
        if period.is_tick() && !raw {
            return None;
        }

        let table = Self {
            asset_class: asset_class.to_string(),
            period,
            raw,
            ext,
        };
        // "60m" and "1h" are the same period; only the canonical spelling is ours.
        if table.table_name() != name {
            return None;
        }
        Some(table)
    }
}

impl fmt::Display for AssetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn table_names() {
        assert_eq!(
            AssetTable::raw("us_stock", Period::TICK).table_name(),
            "us_stock_tick_raw"
        );
        assert_eq!(
            AssetTable::raw("crypto", Period::minutes(1)).table_name(),
            "crypto_1m_raw"
        );
        assert_eq!(
            AssetTable::aggregate("crypto", Period::hours(4))
                .extended()
                .table_name(),
            "crypto_4h_ext"
        );
    }

    #[test]
    fn parse_name_inverts_table_name() {
        for t in [
            AssetTable::raw("us_stock", Period::TICK),
            AssetTable::raw("us_fund", Period::minutes(1)).extended(),
            AssetTable::aggregate("crypto", Period::days(1)),
        ] {
            assert_eq!(AssetTable::parse_name(&t.table_name()), Some(t));
        }
    }

    #[test]
    fn parse_name_rejects_foreign_tables() {
        assert_eq!(AssetTable::parse_name(ORIGIN_TABLE), None);
        assert_eq!(AssetTable::parse_name("crypto_60m"), None);
        assert_eq!(AssetTable::parse_name("crypto_tick"), None);
        assert_eq!(AssetTable::parse_name("crypto_1m_raw_detached"), None);
        assert_eq!(AssetTable::parse_name("Crypto_1m"), None);
        assert_eq!(AssetTable::parse_name("symbols"), None);
    }

    #[test]
    fn origin_selection_by_period_and_session() {
        let rth = Utc.with_ymd_and_hms(2000, 1, 3, 14, 30, 0).unwrap();
        let eth = Utc.with_ymd_and_hms(2000, 1, 3, 9, 0, 0).unwrap();
        let htf = Utc.with_ymd_and_hms(2000, 1, 3, 0, 0, 0).unwrap();
        let o = Origins::new(rth, eth, htf);

        assert_eq!(o.for_table(&AssetTable::aggregate("eq", Period::minutes(5))), rth);
        assert_eq!(
            o.for_table(&AssetTable::aggregate("eq", Period::minutes(5)).extended()),
            eth
        );
        assert_eq!(o.for_table(&AssetTable::aggregate("eq", Period::DAY)), htf);
    }
}
