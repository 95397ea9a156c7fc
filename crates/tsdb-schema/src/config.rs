use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{is_valid_asset_class, AssetTable, Origins, Period, SchemaKind};

/// Invalid desired configuration. Raised while building a [`TimeseriesConfig`]
/// so that nothing downstream ever sees an unresolvable table set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidAssetClass(String),
    /// An asset class must own at least one table; its origin row is only
    /// discoverable through its tables.
    NoTables { asset_class: String },
    TableAssetMismatch { asset_class: String, table: String },
    TickMustBeRaw { table: String },
    DuplicatePeriod { asset_class: String, period: Period, ext: bool },
    NoAggregationSource { table: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAssetClass(name) => write!(
                f,
                "invalid asset class '{name}': must match [a-z][a-z0-9_]*"
            ),
            ConfigError::NoTables { asset_class } => write!(
                f,
                "asset class '{asset_class}' declares no tables; remove it from the config instead"
            ),
            ConfigError::TableAssetMismatch { asset_class, table } => write!(
                f,
                "table '{table}' does not belong to asset class '{asset_class}'"
            ),
            ConfigError::TickMustBeRaw { table } => {
                write!(f, "table '{table}': tick period is only valid for raw tables")
            }
            ConfigError::DuplicatePeriod {
                asset_class,
                period,
                ext,
            } => write!(
                f,
                "asset class '{asset_class}' declares period {period} (ext={ext}) more than once"
            ),
            ConfigError::NoAggregationSource { table } => write!(
                f,
                "aggregate '{table}' has no lower-period table to aggregate from \
                 (needs a smaller period that evenly divides it)"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// What to do with a raw table the operator chose to keep after it was
/// removed from the desired configuration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Leave the table in place. It stays visible to ingestion and metadata
    /// lookups but no aggregate reads from it.
    #[default]
    KeepIngesting,
    /// Rename to `{name}_detached`. Data is retained; inspection ignores it.
    Detach,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetConfig {
    /// Always set for desired configs. `None` on a stored config means the
    /// asset class has tables but no origin row.
    pub origins: Option<Origins>,
    pub tables: BTreeSet<AssetTable>,
}

/// Table layout of one timeseries schema, keyed by asset class.
///
/// Used for both sides of a reconciliation: the desired config the caller
/// supplies, and the stored config rebuilt from the live catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeseriesConfig {
    assets: BTreeMap<String, AssetConfig>,
}

impl TimeseriesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a desired asset class. Validates names, periods, that there is at
    /// least one table and that every aggregate resolves an aggregation source.
    pub fn insert_asset_class(
        &mut self,
        asset_class: &str,
        origins: Origins,
        tables: impl IntoIterator<Item = AssetTable>,
    ) -> Result<()> {
        if !is_valid_asset_class(asset_class) {
            return Err(ConfigError::InvalidAssetClass(asset_class.to_string()).into());
        }

        let mut set = BTreeSet::new();
        let mut periods: BTreeSet<(Period, bool)> = BTreeSet::new();
        for t in tables {
            if t.asset_class != asset_class {
                return Err(ConfigError::TableAssetMismatch {
                    asset_class: asset_class.to_string(),
                    table: t.table_name(),
                }
                .into());
            }
            if t.is_tick() && !t.raw {
                return Err(ConfigError::TickMustBeRaw {
                    table: t.table_name(),
                }
                .into());
            }
            if !periods.insert((t.period, t.ext)) {
                return Err(ConfigError::DuplicatePeriod {
                    asset_class: asset_class.to_string(),
                    period: t.period,
                    ext: t.ext,
                }
                .into());
            }
            set.insert(t);
        }
        if set.is_empty() {
            return Err(ConfigError::NoTables {
                asset_class: asset_class.to_string(),
            }
            .into());
        }

        let candidate = AssetConfig {
            origins: Some(origins),
            tables: set,
        };
        for t in candidate.tables.iter().filter(|t| !t.raw) {
            if source_in(&candidate.tables, t).is_none() {
                return Err(ConfigError::NoAggregationSource {
                    table: t.table_name(),
                }
                .into());
            }
        }

        self.assets.insert(asset_class.to_string(), candidate);
        Ok(())
    }

    /// Record a table observed in the live catalog. No validation: the
    /// stored side reports what exists, consistent or not.
    pub fn insert_stored_table(&mut self, table: AssetTable) {
        self.assets
            .entry(table.asset_class.clone())
            .or_default()
            .tables
            .insert(table);
    }

    /// Attach origins to an asset class already known from its tables.
    /// Origin rows without tables are not asset classes of a stored config.
    pub fn set_stored_origins(&mut self, asset_class: &str, origins: Origins) -> bool {
        match self.assets.get_mut(asset_class) {
            Some(a) => {
                a.origins = Some(origins);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn asset_classes(&self) -> BTreeSet<String> {
        self.assets.keys().cloned().collect()
    }

    pub fn contains(&self, asset_class: &str) -> bool {
        self.assets.contains_key(asset_class)
    }

    pub fn asset(&self, asset_class: &str) -> Option<&AssetConfig> {
        self.assets.get(asset_class)
    }

    pub fn origins(&self, asset_class: &str) -> Option<&Origins> {
        self.assets.get(asset_class).and_then(|a| a.origins.as_ref())
    }

    pub fn table_set(&self, asset_class: &str) -> BTreeSet<AssetTable> {
        self.assets
            .get(asset_class)
            .map(|a| a.tables.clone())
            .unwrap_or_default()
    }

    pub fn all_tables(&self, asset_class: &str) -> Vec<&AssetTable> {
        self.assets
            .get(asset_class)
            .map(|a| a.tables.iter().collect())
            .unwrap_or_default()
    }

    pub fn raw_tables(&self, asset_class: &str) -> Vec<&AssetTable> {
        self.all_tables(asset_class)
            .into_iter()
            .filter(|t| t.raw)
            .collect()
    }

    pub fn aggregate_tables(&self, asset_class: &str) -> Vec<&AssetTable> {
        self.all_tables(asset_class)
            .into_iter()
            .filter(|t| !t.raw)
            .collect()
    }

    /// The table `table` is computed from: same asset class, matching session
    /// (a tick table serves both), strictly smaller period that evenly divides
    /// the target; the largest such period wins, raw preferred on a tie.
    pub fn aggregation_source(&self, table: &AssetTable) -> Option<&AssetTable> {
        let asset = self.assets.get(&table.asset_class)?;
        source_in(&asset.tables, table)
    }
}

fn source_in<'a>(tables: &'a BTreeSet<AssetTable>, target: &AssetTable) -> Option<&'a AssetTable> {
    if target.raw {
        return None;
    }
    tables
        .iter()
        .filter(|c| c.period < target.period)
        .filter(|c| c.period.divides(target.period))
        .filter(|c| c.ext == target.ext || c.is_tick())
        .max_by_key(|c| (c.period, c.raw))
}

/// Desired configuration for each timeseries schema. `None` leaves that
/// schema untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesiredTimeseries {
    pub tick: Option<TimeseriesConfig>,
    pub minute: Option<TimeseriesConfig>,
    pub aggregate: Option<TimeseriesConfig>,
}

impl DesiredTimeseries {
    pub fn get(&self, schema: SchemaKind) -> Option<&TimeseriesConfig> {
        match schema {
            SchemaKind::Tick => self.tick.as_ref(),
            SchemaKind::Minute => self.minute.as_ref(),
            SchemaKind::Aggregate => self.aggregate.as_ref(),
            SchemaKind::Security => None,
        }
    }

    pub fn set(&mut self, schema: SchemaKind, config: TimeseriesConfig) {
        match schema {
            SchemaKind::Tick => self.tick = Some(config),
            SchemaKind::Minute => self.minute = Some(config),
            SchemaKind::Aggregate => self.aggregate = Some(config),
            SchemaKind::Security => {}
        }
    }

    /// Configured schemas in fixed tick -> minute -> aggregate order.
    pub fn configured(&self) -> Vec<(SchemaKind, &TimeseriesConfig)> {
        SchemaKind::TIMESERIES
            .iter()
            .filter_map(|k| self.get(*k).map(|c| (*k, c)))
            .collect()
    }
}
