use chrono::{DateTime, Utc};

use crate::{AssetTable, SchemaKind};

/// 1800-01-01T00:00:00Z. Far enough back that "fetch from here" means
/// "fetch everything".
pub const SENTINEL_EPOCH_SECS: i64 = -5_364_662_400;

pub fn never_fetched_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(SENTINEL_EPOCH_SECS, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Observed data range of one symbol in one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataInfo {
    pub table_name: String,
    pub schema: SchemaKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub table: AssetTable,
}

impl MetadataInfo {
    /// Placeholder for a table that should hold data for a symbol but has
    /// none yet. start == end == the sentinel epoch.
    pub fn never_fetched(schema: SchemaKind, table: AssetTable) -> Self {
        let epoch = never_fetched_epoch();
        Self {
            table_name: table.table_name(),
            schema,
            start: epoch,
            end: epoch,
            table,
        }
    }

    pub fn is_never_fetched(&self) -> bool {
        let epoch = never_fetched_epoch();
        self.start == epoch && self.end == epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Period;
    use chrono::{Datelike, Timelike};

    #[test]
    fn sentinel_is_first_of_1800() {
        let e = never_fetched_epoch();
        assert_eq!((e.year(), e.month(), e.day()), (1800, 1, 1));
        assert_eq!((e.hour(), e.minute(), e.second()), (0, 0, 0));
    }

    #[test]
    fn never_fetched_uses_sentinel_for_both_ends() {
        let m = MetadataInfo::never_fetched(
            SchemaKind::Minute,
            AssetTable::raw("us_stock", Period::minutes(5)),
        );
        assert_eq!(m.table_name, "us_stock_5m_raw");
        assert!(m.is_never_fetched());
    }
}
