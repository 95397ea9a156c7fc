//! `tsdb schema plan|apply`.

use anyhow::Result;

use tsdb_db::PgStore;
use tsdb_reconcile::{
    configure_timeseries_schema, plan_timeseries_schema, TerminalConfirm, UpdateState,
};

use super::{join_or_dash, load_config};

fn state_str(s: UpdateState) -> &'static str {
    match s {
        UpdateState::Unchanged => "unchanged",
        UpdateState::OriginChanged => "origin_changed",
        UpdateState::TablesChanged => "tables_changed",
    }
}

// ---------------------------------------------------------------------------
// schema plan
// ---------------------------------------------------------------------------

pub async fn schema_plan(config_paths: Vec<String>, strict: bool) -> Result<()> {
    let loaded = load_config(&config_paths, strict)?;
    let rc = tsdb_config::load_reconcile_config(&loaded.config_json)?;

    let pool = tsdb_db::connect_from_env().await?;
    let mut store = PgStore::new(pool);
    let plans = plan_timeseries_schema(&mut store, &rc.desired).await?;
    store.rollback().await?;

    println!("config_hash={}", loaded.config_hash);
    println!("orphan_policy={:?}", rc.orphan_policy);
    println!("configured_schemas={}", plans.len());
    for p in &plans {
        println!(
            "schema={} exists={} add={} update={} remove={}",
            p.schema,
            p.schema_exists,
            join_or_dash(&p.diff.to_add),
            join_or_dash(&p.diff.to_update),
            join_or_dash(&p.diff.to_remove),
        );
        for (asset, td) in &p.updates {
            println!(
                "  asset_class={} state={} tables_add={} tables_remove={}",
                asset,
                state_str(td.state()),
                join_or_dash(&td.to_add),
                join_or_dash(&td.to_remove),
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// schema apply
// ---------------------------------------------------------------------------

pub async fn schema_apply(config_paths: Vec<String>, strict: bool) -> Result<()> {
    let loaded = load_config(&config_paths, strict)?;
    let rc = tsdb_config::load_reconcile_config(&loaded.config_json)?;

    let pool = tsdb_db::connect_from_env().await?;
    let mut store = PgStore::new(pool);
    let mut confirm = TerminalConfirm::stdio();

    let report =
        match configure_timeseries_schema(&mut store, &mut confirm, &rc.desired, rc.orphan_policy)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                if let Err(rb) = store.rollback().await {
                    tracing::warn!(error = %rb, "rollback after failed apply also failed");
                }
                return Err(e);
            }
        };

    println!("config_hash={}", loaded.config_hash);
    println!("created_schemas={}", join_or_dash(&report.created_schemas));
    for s in &report.schemas {
        println!(
            "schema={} added={} updated={} unchanged={} declined={} removed={} statements={}",
            s.schema,
            join_or_dash(&s.added),
            join_or_dash(&s.updated),
            join_or_dash(&s.unchanged),
            join_or_dash(&s.declined),
            join_or_dash(&s.removed),
            s.statements(),
        );
        if !s.drifted.is_empty() {
            println!("  drifted={}", join_or_dash(&s.drifted));
        }
        if !s.orphaned.is_empty() {
            println!("  orphaned={}", join_or_dash(&s.orphaned));
        }
        for (from, to) in &s.detached {
            println!("  detached={} to={}", from, to);
        }
    }
    println!("statements_total={}", report.statements());
    Ok(())
}
