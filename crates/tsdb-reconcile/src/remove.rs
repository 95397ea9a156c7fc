use anyhow::Result;
use std::collections::BTreeSet;

use tsdb_schema::{teardown_order, CatalogStore, SchemaCommand, SchemaKind, TimeseriesConfig};

use crate::{run, Confirm, SchemaReport};

pub(crate) async fn remove_asset_classes<S, C>(
    store: &mut S,
    confirm: &mut C,
    schema: SchemaKind,
    stored: &TimeseriesConfig,
    assets: &BTreeSet<String>,
    report: &mut SchemaReport,
) -> Result<()>
where
    S: CatalogStore + ?Sized,
    C: Confirm + ?Sized,
{
    if assets.is_empty() {
        tracing::info!(schema = %schema, "no asset classes need to be removed");
        return Ok(());
    }

    for asset in assets {
        tracing::info!(schema = %schema, asset_class = %asset, "checking if asset class should be removed");

        // Both answers are collected before anything is applied.
        let first = confirm.confirm(&format!(
            "Asset class '{schema}'.'{asset}' exists in current database, \
             but not in the given config. Remove it? y/[N] : "
        ));
        let confirmed = first
            && confirm.confirm(
                "This will permanently remove all downloaded and calculated data. \
                 Are you sure? y/[N] : ",
            );
        if !confirmed {
            tracing::info!(schema = %schema, asset_class = %asset, "keeping asset class");
            report.declined.push(asset.clone());
            continue;
        }

        tracing::info!(schema = %schema, asset_class = %asset, "removing asset class");
        run(
            store,
            report,
            SchemaCommand::DeleteOrigin {
                schema,
                asset_class: asset.clone(),
            },
        )
        .await?;

        for table in teardown_order(stored.all_tables(asset)) {
            let name = table.table_name();
            let cmd = if table.raw {
                SchemaCommand::DropTable { schema, name }
            } else {
                SchemaCommand::DropView { schema, name }
            };
            run(store, report, cmd).await?;
        }

        store.commit().await?;
        report.removed.push(asset.clone());
    }
    Ok(())
}
