//! Scenario: Reconcile Creates In Dependency Order
//!
//! # Invariants under test
//! - A fresh database gets every schema, the origin table, the origin row,
//!   raw tables, then aggregates in ascending period, each aggregate created
//!   after the table it reads from.
//! - Removal tears the same objects down in exactly the reverse order.
//! - A second run against an unchanged config applies nothing.
//! - Planning never changes the database.
//!
//! All tests are pure in-process; no DB required.

use tsdb_reconcile::{configure_timeseries_schema, plan_timeseries_schema};
use tsdb_schema::{
    AssetTable, DesiredTimeseries, OrphanPolicy, Period, SchemaCommand, SchemaKind,
    TimeseriesConfig,
};
use tsdb_testkit::{flat_origins, utc_day, MemoryStore, ScriptedConfirm};

fn tick_desired() -> DesiredTimeseries {
    let mut c = TimeseriesConfig::new();
    // Listed out of order on purpose.
    c.insert_asset_class(
        "crypto",
        flat_origins(utc_day(2000, 1, 3)),
        [
            AssetTable::aggregate("crypto", Period::hours(1)),
            AssetTable::raw("crypto", Period::TICK),
            AssetTable::aggregate("crypto", Period::minutes(5)),
            AssetTable::aggregate("crypto", Period::minutes(1)),
        ],
    )
    .unwrap();
    let mut d = DesiredTimeseries::default();
    d.set(SchemaKind::Tick, c);
    d
}

fn structural_names(applied: &[SchemaCommand]) -> Vec<String> {
    applied
        .iter()
        .filter_map(|c| match c {
            SchemaCommand::CreateRawTable { table, .. }
            | SchemaCommand::CreateAggregate { table, .. } => Some(table.table_name()),
            SchemaCommand::DropView { name, .. } | SchemaCommand::DropTable { name, .. } => {
                Some(name.clone())
            }
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 1. First run builds everything, dependencies first
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_run_creates_everything_in_dependency_order() {
    let mut store = MemoryStore::new();
    let mut confirm = ScriptedConfirm::silent();

    let report = configure_timeseries_schema(
        &mut store,
        &mut confirm,
        &tick_desired(),
        OrphanPolicy::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.created_schemas, SchemaKind::ALL.to_vec());
    let tick = report.schema(SchemaKind::Tick).unwrap();
    assert_eq!(tick.added, vec!["crypto".to_string()]);

    assert_eq!(
        tick.applied[0],
        SchemaCommand::CreateOriginTable {
            schema: SchemaKind::Tick
        }
    );
    assert!(matches!(tick.applied[1], SchemaCommand::InsertOrigin { .. }));
    assert_eq!(
        structural_names(&tick.applied),
        ["crypto_tick_raw", "crypto_1m", "crypto_5m", "crypto_1h"]
    );

    let sources: Vec<(String, String)> = tick
        .applied
        .iter()
        .filter_map(|c| match c {
            SchemaCommand::CreateAggregate { table, source, .. } => {
                Some((table.table_name(), source.table_name()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        sources,
        [
            ("crypto_1m".to_string(), "crypto_tick_raw".to_string()),
            ("crypto_5m".to_string(), "crypto_1m".to_string()),
            ("crypto_1h".to_string(), "crypto_5m".to_string()),
        ]
    );

    assert_eq!(store.tables(SchemaKind::Tick).len(), 4);
    assert!(store.origin_rows(SchemaKind::Tick).contains_key("crypto"));
    assert!(!store.has_pending(), "all work must be committed");
    assert!(confirm.prompts().is_empty(), "adding never prompts");
}

// ---------------------------------------------------------------------------
// 2. Second run is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_run_applies_nothing() {
    let mut store = MemoryStore::new();
    let mut confirm = ScriptedConfirm::silent();
    let desired = tick_desired();

    configure_timeseries_schema(&mut store, &mut confirm, &desired, OrphanPolicy::default())
        .await
        .unwrap();
    let applied_before = store.applied().len();
    let catalog_before = store.catalog().clone();

    let report =
        configure_timeseries_schema(&mut store, &mut confirm, &desired, OrphanPolicy::default())
            .await
            .unwrap();

    assert_eq!(report.statements(), 0);
    assert!(report.created_schemas.is_empty());
    let tick = report.schema(SchemaKind::Tick).unwrap();
    assert_eq!(tick.unchanged, vec!["crypto".to_string()]);
    assert_eq!(store.applied().len(), applied_before);
    assert_eq!(store.catalog(), &catalog_before);
    assert!(confirm.prompts().is_empty());
}

// ---------------------------------------------------------------------------
// 3. Removal is the exact reverse of creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn removal_tears_down_in_reverse_order() {
    let mut store = MemoryStore::new();
    configure_timeseries_schema(
        &mut store,
        &mut ScriptedConfirm::silent(),
        &tick_desired(),
        OrphanPolicy::default(),
    )
    .await
    .unwrap();

    let mut empty = DesiredTimeseries::default();
    empty.set(SchemaKind::Tick, TimeseriesConfig::new());
    let mut confirm = ScriptedConfirm::new([true, true]);
    let report =
        configure_timeseries_schema(&mut store, &mut confirm, &empty, OrphanPolicy::default())
            .await
            .unwrap();

    let tick = report.schema(SchemaKind::Tick).unwrap();
    assert_eq!(tick.removed, vec!["crypto".to_string()]);
    assert!(matches!(tick.applied[0], SchemaCommand::DeleteOrigin { .. }));
    assert_eq!(
        structural_names(&tick.applied),
        ["crypto_1h", "crypto_5m", "crypto_1m", "crypto_tick_raw"]
    );
    assert!(matches!(
        tick.applied.last(),
        Some(SchemaCommand::DropTable { .. })
    ));

    assert!(store.tables(SchemaKind::Tick).is_empty());
    assert!(store.origin_rows(SchemaKind::Tick).is_empty());
}

// ---------------------------------------------------------------------------
// 4. Planning is read-only
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plan_reports_without_changing_anything() {
    let mut store = MemoryStore::new();

    let plans = plan_timeseries_schema(&mut store, &tick_desired())
        .await
        .unwrap();

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].schema, SchemaKind::Tick);
    assert!(!plans[0].schema_exists);
    assert!(plans[0].diff.to_add.contains("crypto"));
    assert!(store.applied().is_empty());
    assert!(store.catalog().schemas.is_empty());
}

#[tokio::test]
async fn unconfigured_schemas_are_left_alone() {
    let mut store = MemoryStore::new();
    configure_timeseries_schema(
        &mut store,
        &mut ScriptedConfirm::silent(),
        &tick_desired(),
        OrphanPolicy::default(),
    )
    .await
    .unwrap();

    // Nothing configured for minute/aggregate: their schemas exist but hold
    // no origin table.
    assert!(store.tables(SchemaKind::Minute).is_empty());
    let minute = &store.catalog().schemas["minute_data"];
    assert!(!minute.has_origin_table);
}
