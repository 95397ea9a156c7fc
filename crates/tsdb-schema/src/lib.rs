//! tsdb-schema
//!
//! Structural model shared by every tsdb crate:
//! - `Period` / `AssetTable` / `Origins`: what a timeseries table is and how it is named
//! - `TimeseriesConfig`: the desired (caller supplied) and stored (inspected) shape of one schema
//! - `SchemaCommand`: every structural change the reconciler can ask a store to apply
//! - `CatalogStore` / `SecurityStore`: the seams a concrete database plugs into
//!
//! Pure types and pure logic. No IO.

mod command;
mod config;
mod metadata;
mod order;
mod period;
mod store;
mod table;

pub use command::{Operation, SchemaCommand, Target};
pub use config::{AssetConfig, ConfigError, DesiredTimeseries, OrphanPolicy, TimeseriesConfig};
pub use metadata::{never_fetched_epoch, MetadataInfo, SENTINEL_EPOCH_SECS};
pub use order::{creation_order, teardown_order};
pub use period::Period;
pub use store::{
    CatalogStore, ConflictMode, MergedRow, SecurityStore, StagedSymbol, StorageFlags,
    SymbolStorage,
};
pub use table::{is_valid_asset_class, AssetTable, Origins, SchemaKind, ORIGIN_TABLE};
