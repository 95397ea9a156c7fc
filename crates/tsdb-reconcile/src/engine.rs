use anyhow::{Context, Result};
use std::collections::BTreeMap;

use tsdb_schema::{
    CatalogStore, DesiredTimeseries, OrphanPolicy, SchemaCommand, SchemaKind, TimeseriesConfig,
};

use crate::{
    add, diff_configs, diff_tables, inspect_schema, load_stored_config, remove, update, Confirm,
    ReconcileReport, SchemaPlan, SchemaReport,
};

/// Apply one command and record it.
pub(crate) async fn run<S>(store: &mut S, report: &mut SchemaReport, cmd: SchemaCommand) -> Result<()>
where
    S: CatalogStore + ?Sized,
{
    tracing::debug!(command = %cmd, "apply");
    store.apply(&cmd).await?;
    report.applied.push(cmd);
    Ok(())
}

/// Converge every configured timeseries schema onto `desired`.
///
/// Missing schemas are created and committed first. Then, per configured
/// schema in tick, minute, aggregate order: add, update, remove, each
/// committed independently. Stored state is read fresh for every schema.
pub async fn configure_timeseries_schema<S, C>(
    store: &mut S,
    confirm: &mut C,
    desired: &DesiredTimeseries,
    orphan_policy: OrphanPolicy,
) -> Result<ReconcileReport>
where
    S: CatalogStore + ?Sized,
    C: Confirm + ?Sized,
{
    let mut report = ReconcileReport::default();

    let existing = store.list_schemas().await.context("list schemas failed")?;
    for kind in SchemaKind::ALL {
        if !existing.contains(kind.as_str()) {
            tracing::info!(schema = %kind, "creating schema");
            store
                .apply(&SchemaCommand::CreateSchema { schema: kind })
                .await?;
            report.created_schemas.push(kind);
        }
    }
    store.commit().await?;

    for (kind, config) in desired.configured() {
        let r = configure_schema(store, confirm, kind, config, orphan_policy)
            .await
            .with_context(|| format!("configure {kind} failed"))?;
        report.schemas.push(r);
    }

    Ok(report)
}

async fn configure_schema<S, C>(
    store: &mut S,
    confirm: &mut C,
    schema: SchemaKind,
    desired: &TimeseriesConfig,
    orphan_policy: OrphanPolicy,
) -> Result<SchemaReport>
where
    S: CatalogStore + ?Sized,
    C: Confirm + ?Sized,
{
    tracing::info!(schema = %schema, "configuring timeseries schema");
    let mut report = SchemaReport::new(schema);

    let snapshot = inspect_schema(store, schema).await?;
    if !snapshot.has_origin_table {
        tracing::info!(schema = %schema, "creating origin table");
        run(store, &mut report, SchemaCommand::CreateOriginTable { schema }).await?;
    }

    let stored = load_stored_config(store, schema).await?;
    let diff = diff_configs(desired, &stored);

    add::add_asset_classes(store, schema, desired, &diff.to_add, &mut report).await?;
    store.commit().await?;

    update::update_asset_classes(
        store,
        confirm,
        schema,
        desired,
        &stored,
        &diff.to_update,
        orphan_policy,
        &mut report,
    )
    .await?;
    store.commit().await?;

    remove::remove_asset_classes(store, confirm, schema, &stored, &diff.to_remove, &mut report)
        .await?;
    store.commit().await?;

    tracing::info!(
        schema = %schema,
        added = report.added.len(),
        updated = report.updated.len(),
        unchanged = report.unchanged.len(),
        declined = report.declined.len(),
        removed = report.removed.len(),
        drifted = report.drifted.len(),
        statements = report.statements(),
        "schema reconciled"
    );
    Ok(report)
}

/// What [`configure_timeseries_schema`] would do, without changing anything
/// or prompting.
pub async fn plan_timeseries_schema<S>(
    store: &mut S,
    desired: &DesiredTimeseries,
) -> Result<Vec<SchemaPlan>>
where
    S: CatalogStore + ?Sized,
{
    let existing = store.list_schemas().await.context("list schemas failed")?;

    let mut plans = Vec::new();
    for (kind, config) in desired.configured() {
        let stored = load_stored_config(store, kind).await?;
        let diff = diff_configs(config, &stored);
        let updates: BTreeMap<_, _> = diff
            .to_update
            .iter()
            .map(|a| (a.clone(), diff_tables(config, &stored, a)))
            .collect();
        plans.push(SchemaPlan {
            schema: kind,
            schema_exists: existing.contains(kind.as_str()),
            diff,
            updates,
        });
    }
    Ok(plans)
}
