use anyhow::{Context, Result};
use std::collections::BTreeSet;

use tsdb_schema::{AssetTable, CatalogStore, SchemaKind, TimeseriesConfig, ORIGIN_TABLE};

/// Tables present in one schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaSnapshot {
    pub schema: SchemaKind,
    /// Everything except the origin table.
    pub tables: BTreeSet<String>,
    pub has_origin_table: bool,
}

/// Read-only. A missing schema is an empty snapshot, not an error.
pub async fn inspect_schema<S>(store: &mut S, schema: SchemaKind) -> Result<SchemaSnapshot>
where
    S: CatalogStore + ?Sized,
{
    let mut tables = store
        .list_tables(schema)
        .await
        .with_context(|| format!("inspect {schema} failed"))?;
    let has_origin_table = tables.remove(ORIGIN_TABLE);
    Ok(SchemaSnapshot {
        schema,
        tables,
        has_origin_table,
    })
}

/// Rebuild the stored configuration of `schema` from the live catalog.
///
/// Always read fresh: the result is only valid for the run that loaded it.
pub async fn load_stored_config<S>(store: &mut S, schema: SchemaKind) -> Result<TimeseriesConfig>
where
    S: CatalogStore + ?Sized,
{
    let snapshot = inspect_schema(store, schema).await?;

    let mut stored = TimeseriesConfig::new();
    for name in &snapshot.tables {
        match AssetTable::parse_name(name) {
            Some(t) => stored.insert_stored_table(t),
            None => tracing::warn!(
                schema = %schema,
                table = %name,
                "ignoring table that is not a recognised timeseries table"
            ),
        }
    }

    if snapshot.has_origin_table {
        let origins = store
            .select_origins(schema)
            .await
            .with_context(|| format!("read {schema}.{ORIGIN_TABLE} failed"))?;
        for (asset, o) in origins {
            if !stored.set_stored_origins(&asset, o) {
                tracing::debug!(
                    schema = %schema,
                    asset_class = %asset,
                    "origin row without tables"
                );
            }
        }
    }

    Ok(stored)
}
