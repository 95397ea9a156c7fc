use anyhow::{anyhow, Result};
use std::collections::BTreeSet;

use tsdb_schema::{
    creation_order, teardown_order, AssetTable, CatalogStore, OrphanPolicy, SchemaCommand,
    SchemaKind, TimeseriesConfig,
};

use crate::{diff_tables, run, Confirm, ReconcileError, SchemaReport, UpdateState};

#[allow(clippy::too_many_arguments)]
pub(crate) async fn update_asset_classes<S, C>(
    store: &mut S,
    confirm: &mut C,
    schema: SchemaKind,
    desired: &TimeseriesConfig,
    stored: &TimeseriesConfig,
    assets: &BTreeSet<String>,
    orphan_policy: OrphanPolicy,
    report: &mut SchemaReport,
) -> Result<()>
where
    S: CatalogStore + ?Sized,
    C: Confirm + ?Sized,
{
    if assets.is_empty() {
        tracing::info!(schema = %schema, "no asset classes need to be updated");
        return Ok(());
    }

    for asset in assets {
        let td = diff_tables(desired, stored, asset);
        let prompt = match td.state() {
            UpdateState::Unchanged => {
                tracing::info!(schema = %schema, asset_class = %asset, "no changes needed");
                report.unchanged.push(asset.clone());
                continue;
            }
            UpdateState::OriginChanged => format!(
                "Origin timestamps of asset class '{schema}'.'{asset}' changed.\n\
                 All calculated aggregates must be removed and recalculated.\n\
                 All inserted data will be retained.\n\
                 Update config? y/[N] : "
            ),
            UpdateState::TablesChanged => format!(
                "Detected differences with config of asset class '{schema}'.'{asset}'.\n\
                 This requires all calculated aggregates to be removed and recalculated.\n\
                 All inserted data will be retained.\n\
                 Update config? y/[N] : "
            ),
        };

        if !confirm.confirm(&prompt) {
            tracing::info!(schema = %schema, asset_class = %asset, "update declined");
            report.declined.push(asset.clone());
            continue;
        }

        rebuild_asset_class(
            store,
            confirm,
            schema,
            desired,
            stored,
            asset,
            &td.to_add,
            &td.to_remove,
            orphan_policy,
            report,
        )
        .await?;
        store.commit().await?;
        report.updated.push(asset.clone());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn rebuild_asset_class<S, C>(
    store: &mut S,
    confirm: &mut C,
    schema: SchemaKind,
    desired: &TimeseriesConfig,
    stored: &TimeseriesConfig,
    asset: &str,
    added: &BTreeSet<AssetTable>,
    removed: &BTreeSet<AssetTable>,
    orphan_policy: OrphanPolicy,
    report: &mut SchemaReport,
) -> Result<()>
where
    S: CatalogStore + ?Sized,
    C: Confirm + ?Sized,
{
    tracing::info!(schema = %schema, asset_class = %asset, "updating asset class");

    let origins = *desired
        .origins(asset)
        .ok_or_else(|| anyhow!("desired asset class '{asset}' has no origins"))?;
    run(
        store,
        report,
        SchemaCommand::UpsertOrigin {
            schema,
            asset_class: asset.to_string(),
            origins,
        },
    )
    .await?;

    // Largest period first so no view outlives the view it reads from.
    for table in teardown_order(stored.aggregate_tables(asset)) {
        tracing::info!(schema = %schema, table = %table, "dropping continuous aggregate");
        run(
            store,
            report,
            SchemaCommand::DropView {
                schema,
                name: table.table_name(),
            },
        )
        .await?;
    }

    for table in teardown_order(removed.iter().filter(|t| t.raw)) {
        let name = table.table_name();
        let prompt = format!(
            "Table '{schema}'.'{name}' exists in current database, but not in the new config.\n\
             It contains inserted raw data with an aggregation period of {}.\n\
             Delete it? y/[N] : ",
            table.period
        );
        if confirm.confirm(&prompt) {
            tracing::info!(schema = %schema, table = %name, "dropping raw table");
            run(store, report, SchemaCommand::DropTable { schema, name }).await?;
            continue;
        }

        match orphan_policy {
            OrphanPolicy::KeepIngesting => {
                tracing::warn!(
                    schema = %schema,
                    table = %name,
                    "raw table kept; no aggregate will read from it"
                );
                report.orphaned.push(name);
            }
            OrphanPolicy::Detach => {
                let existing = store.list_tables(schema).await?;
                let to = detached_name(&existing, &name);
                tracing::warn!(schema = %schema, table = %name, to = %to, "raw table detached");
                run(
                    store,
                    report,
                    SchemaCommand::RenameTable {
                        schema,
                        from: name.clone(),
                        to: to.clone(),
                    },
                )
                .await?;
                report.detached.push((name, to));
            }
        }
    }

    for table in creation_order(added.iter().filter(|t| t.raw)) {
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
            "recreating continuous aggregate"
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

/// `{name}_detached`, or `{name}_detached_{n}` when an earlier detach took it.
/// Neither form parses as a timeseries table, so inspection skips it.
fn detached_name(existing: &BTreeSet<String>, name: &str) -> String {
    let base = format!("{name}_detached");
    if !existing.contains(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if !existing.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_names_never_collide() {
        let mut existing = BTreeSet::new();
        assert_eq!(detached_name(&existing, "fx_1m_raw"), "fx_1m_raw_detached");
        existing.insert("fx_1m_raw_detached".to_string());
        assert_eq!(detached_name(&existing, "fx_1m_raw"), "fx_1m_raw_detached_2");
        assert!(AssetTable::parse_name("fx_1m_raw_detached_2").is_none());
    }
}
