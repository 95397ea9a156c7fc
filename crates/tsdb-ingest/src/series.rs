use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt;

use tsdb_reconcile::load_stored_config;
use tsdb_schema::{AssetTable, CatalogStore, MetadataInfo, SchemaKind, SecurityStore};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SeriesError {
    UnknownSymbol {
        pkey: i64,
    },
    /// The symbol's asset class has no tables in a schema it is flagged to
    /// store data in.
    PrerequisiteNotRun {
        schema: SchemaKind,
        asset_class: String,
    },
}

impl fmt::Display for SeriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesError::UnknownSymbol { pkey } => write!(
                f,
                "cannot determine symbol updates needed: pkey={pkey} is unknown"
            ),
            SeriesError::PrerequisiteNotRun {
                schema,
                asset_class,
            } => write!(
                f,
                "asset class '{asset_class}' has no tables in {schema}. Ensure \
                 configure_timeseries_schema has been run prior to inserting symbol data"
            ),
        }
    }
}

impl std::error::Error for SeriesError {}

/// Raw tables that should hold data for `pkey` but hold none yet.
///
/// For every schema the symbol is flagged to store, the stored config is
/// read fresh and each raw table of the symbol's asset class without
/// observed rows yields [`MetadataInfo::never_fetched`]. An empty result
/// means nothing is missing.
pub async fn get_symbol_series_updates<S>(store: &mut S, pkey: i64) -> Result<Vec<MetadataInfo>>
where
    S: CatalogStore + SecurityStore + ?Sized,
{
    let storage = store
        .symbol_storage(pkey)
        .await?
        .ok_or(SeriesError::UnknownSymbol { pkey })?;
    let asset = storage.asset_class;

    let mut missing = Vec::new();
    for schema in storage.flags.enabled() {
        let stored = load_stored_config(store, schema).await?;
        if !stored.contains(&asset) {
            return Err(SeriesError::PrerequisiteNotRun {
                schema,
                asset_class: asset.clone(),
            }
            .into());
        }

        let raw: Vec<AssetTable> = stored.raw_tables(&asset).into_iter().cloned().collect();
        let present: BTreeSet<String> = store
            .series_metadata(pkey, schema, &raw)
            .await?
            .into_iter()
            .map(|m| m.table_name)
            .collect();

        for t in raw {
            if !present.contains(&t.table_name()) {
                tracing::debug!(pkey, schema = %schema, table = %t, "no data stored yet");
                missing.push(MetadataInfo::never_fetched(schema, t));
            }
        }
    }

    tracing::info!(pkey, asset_class = %asset, missing = missing.len(), "symbol series updates");
    Ok(missing)
}
