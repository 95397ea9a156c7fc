use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{AssetTable, MetadataInfo, Origins, SchemaCommand, SchemaKind};

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Structural view of a database plus the ability to change it.
///
/// Applied commands are visible to later reads through the same store and
/// become durable only on [`CatalogStore::commit`]. Dropping a store with
/// uncommitted work discards it.
#[async_trait]
pub trait CatalogStore: Send {
    async fn list_schemas(&mut self) -> Result<BTreeSet<String>>;

    /// Table and view names in `schema`. Empty when the schema is missing.
    async fn list_tables(&mut self, schema: SchemaKind) -> Result<BTreeSet<String>>;

    /// Origin rows keyed by asset class. Empty when `_origin` is missing.
    async fn select_origins(&mut self, schema: SchemaKind) -> Result<BTreeMap<String, Origins>>;

    async fn apply(&mut self, command: &SchemaCommand) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Securities
// ---------------------------------------------------------------------------

/// Conflict handling for the symbol merge, on `(symbol, exchange, source)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictMode {
    #[default]
    Update,
    Ignore,
}

impl ConflictMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "update" => Ok(ConflictMode::Update),
            "ignore" => Ok(ConflictMode::Ignore),
            other => Err(anyhow::anyhow!(
                "invalid on-conflict mode '{other}'. expected one of: update | ignore"
            )),
        }
    }
}

/// One validated row of the staging batch, already in load order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedSymbol {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub asset_class: String,
    /// JSON object text holding every non-required input column.
    pub attrs: String,
}

impl StagedSymbol {
    /// Staging-table column order. Bulk load writes fields in exactly this order.
    pub const COLUMNS: [&'static str; 5] = ["symbol", "name", "exchange", "asset_class", "attrs"];

    pub fn fields(&self) -> [&str; 5] {
        [
            self.symbol.as_str(),
            self.name.as_str(),
            self.exchange.as_str(),
            self.asset_class.as_str(),
            self.attrs.as_str(),
        ]
    }
}

/// One row returned by the merge: primary key and the system conflict marker
/// (`xmax` rendered as text on PostgreSQL).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedRow {
    pub pkey: i64,
    pub conflict_marker: String,
}

impl MergedRow {
    /// `xmax = 0` means no prior row version: a fresh insert.
    pub fn is_fresh_insert(&self) -> bool {
        self.conflict_marker == "0"
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageFlags {
    pub tick: bool,
    pub minute: bool,
    pub aggregate: bool,
}

impl StorageFlags {
    pub fn enabled(&self) -> Vec<SchemaKind> {
        let mut v = Vec::new();
        if self.tick {
            v.push(SchemaKind::Tick);
        }
        if self.minute {
            v.push(SchemaKind::Minute);
        }
        if self.aggregate {
            v.push(SchemaKind::Aggregate);
        }
        v
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolStorage {
    pub asset_class: String,
    pub flags: StorageFlags,
}

#[async_trait]
pub trait SecurityStore: Send {
    /// Stage, bulk-load and merge `batch` in one transaction. The staging
    /// table never outlives the call.
    async fn merge_symbols(
        &mut self,
        batch: &[StagedSymbol],
        source: &str,
        mode: ConflictMode,
    ) -> Result<Vec<MergedRow>>;

    async fn symbol_storage(&mut self, pkey: i64) -> Result<Option<SymbolStorage>>;

    /// Returns false when `pkey` is unknown.
    async fn update_symbol_storage(&mut self, pkey: i64, flags: StorageFlags) -> Result<bool>;

    /// Observed ranges for `pkey` in those of `tables` that hold rows for it.
    async fn series_metadata(
        &mut self,
        pkey: i64,
        schema: SchemaKind,
        tables: &[AssetTable],
    ) -> Result<Vec<MetadataInfo>>;
}
