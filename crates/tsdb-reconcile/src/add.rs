use anyhow::{anyhow, Result};
use std::collections::BTreeSet;

use tsdb_schema::{creation_order, CatalogStore, SchemaCommand, SchemaKind, TimeseriesConfig};

use crate::{run, ReconcileError, SchemaReport};

pub(crate) async fn add_asset_classes<S>(
    store: &mut S,
    schema: SchemaKind,
    desired: &TimeseriesConfig,
    assets: &BTreeSet<String>,
    report: &mut SchemaReport,
) -> Result<()>
where
    S: CatalogStore + ?Sized,
{
    if assets.is_empty() {
        tracing::info!(schema = %schema, "no asset classes need to be added");
        return Ok(());
    }

    for asset in assets {
        match add_asset_class(store, schema, desired, asset, report).await {
            Ok(()) => {
                store.commit().await?;
                report.added.push(asset.clone());
            }
            Err(e) => {
                let drift = matches!(
                    e.downcast_ref::<ReconcileError>(),
                    Some(ReconcileError::OriginDrift { .. })
                );
                if !drift {
                    return Err(e);
                }
                // Raised before anything is applied, so there is no pending
                // work to discard.
                tracing::error!(
                    schema = %schema,
                    asset_class = %asset,
                    error = %e,
                    "skipping asset class"
                );
                report.drifted.push(asset.clone());
            }
        }
    }
    Ok(())
}

async fn add_asset_class<S>(
    store: &mut S,
    schema: SchemaKind,
    desired: &TimeseriesConfig,
    asset: &str,
    report: &mut SchemaReport,
) -> Result<()>
where
    S: CatalogStore + ?Sized,
{
    tracing::info!(schema = %schema, asset_class = %asset, "adding asset class");

    let origins = *desired
        .origins(asset)
        .ok_or_else(|| anyhow!("desired asset class '{asset}' has no origins"))?;

    if store.select_origins(schema).await?.contains_key(asset) {
        return Err(ReconcileError::OriginDrift {
            schema,
            asset_class: asset.to_string(),
        }
        .into());
    }

    run(
        store,
        report,
        SchemaCommand::InsertOrigin {
            schema,
            asset_class: asset.to_string(),
            origins,
        },
    )
    .await?;

    for table in creation_order(desired.raw_tables(asset)) {
        tracing::info!(schema = %schema, table = %table, "creating raw table");
        run(store, report, SchemaCommand::CreateRawTable { schema, table }).await?;
    }

    for table in creation_order(desired.aggregate_tables(asset)) {
        let source = desired
            .aggregation_source(&table)
            .cloned()
            .ok_or_else(|| ReconcileError::MissingAggregationSource {
                schema,
                table: table.table_name(),
            })?;
        tracing::info!(
            schema = %schema,
            table = %table,
            source = %source,
            "creating continuous aggregate"
        );
        let origin = origins.for_table(&table);
        run(
            store,
            report,
            SchemaCommand::CreateAggregate {
                schema,
                table,
                source,
                origin,
            },
        )
        .await?;
    }

    Ok(())
}
