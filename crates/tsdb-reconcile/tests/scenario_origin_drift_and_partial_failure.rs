//! Scenario: Origin Drift And Partial Failure
//!
//! # Invariants under test
//! - An origin row left behind without tables is reported as drift with a
//!   remediation hint; it is never overwritten silently.
//! - Drift halts only the affected asset class: the rest of the schema and
//!   every other schema still converge.
//! - A statement failing partway through a run leaves every asset class that
//!   was already committed intact and nothing of the one in flight.
//! - Re-running after the fault converges without redoing finished work.
//!
//! All tests are pure in-process; no DB required.

use tsdb_reconcile::{configure_timeseries_schema, ReconcileError};
use tsdb_schema::{
    AssetTable, DesiredTimeseries, OrphanPolicy, Period, SchemaCommand, SchemaKind,
    TimeseriesConfig,
};
use tsdb_testkit::{flat_origins, utc_day, MemoryStore, ScriptedConfirm};

const M: SchemaKind = SchemaKind::Minute;

fn desired(assets: &[&str]) -> DesiredTimeseries {
    let mut c = TimeseriesConfig::new();
    for a in assets {
        c.insert_asset_class(
            a,
            flat_origins(utc_day(2000, 1, 3)),
            [
                AssetTable::raw(*a, Period::minutes(1)),
                AssetTable::aggregate(*a, Period::minutes(5)),
            ],
        )
        .unwrap();
    }
    let mut d = DesiredTimeseries::default();
    d.set(M, c);
    d
}

// ---------------------------------------------------------------------------
// 1. Drift
// ---------------------------------------------------------------------------

fn seed_stale_origin(store: &mut MemoryStore, asset: &str) {
    store
        .seed(&[
            SchemaCommand::CreateSchema { schema: M },
            SchemaCommand::CreateOriginTable { schema: M },
            SchemaCommand::InsertOrigin {
                schema: M,
                asset_class: asset.to_string(),
                origins: flat_origins(utc_day(1999, 1, 1)),
            },
        ])
        .unwrap();
}

#[tokio::test]
async fn stale_origin_row_is_reported_as_drift() {
    let mut store = MemoryStore::new();
    seed_stale_origin(&mut store, "crypto");

    let report = configure_timeseries_schema(
        &mut store,
        &mut ScriptedConfirm::silent(),
        &desired(&["crypto"]),
        OrphanPolicy::default(),
    )
    .await
    .unwrap();

    let minute = report.schema(M).unwrap();
    assert_eq!(minute.drifted, vec!["crypto".to_string()]);
    assert!(minute.added.is_empty());
    assert_eq!(minute.statements(), 0);

    assert!(store.tables(M).is_empty());
    assert_eq!(
        store.origin_rows(M)["crypto"],
        flat_origins(utc_day(1999, 1, 1)),
        "stale row must not be overwritten"
    );
    assert!(!store.has_pending());

    let hint = ReconcileError::OriginDrift {
        schema: M,
        asset_class: "crypto".to_string(),
    }
    .to_string();
    assert!(hint.contains("delete the stale row"));
}

#[tokio::test]
async fn drift_only_halts_the_affected_asset_class() {
    let mut store = MemoryStore::new();
    seed_stale_origin(&mut store, "aaa");

    let mut both = desired(&["aaa", "zzz"]);
    let minute_cfg = both.get(M).cloned().unwrap();
    both.set(SchemaKind::Aggregate, minute_cfg);

    let report = configure_timeseries_schema(
        &mut store,
        &mut ScriptedConfirm::silent(),
        &both,
        OrphanPolicy::default(),
    )
    .await
    .unwrap();

    let minute = report.schema(M).unwrap();
    assert_eq!(minute.drifted, vec!["aaa".to_string()]);
    assert_eq!(minute.added, vec!["zzz".to_string()]);
    let names: Vec<_> = store.tables(M).into_iter().collect();
    assert_eq!(names, ["zzz_1m_raw", "zzz_5m"]);

    let aggregate = report.schema(SchemaKind::Aggregate).unwrap();
    assert!(aggregate.drifted.is_empty());
    assert_eq!(aggregate.added, vec!["aaa".to_string(), "zzz".to_string()]);
    assert_eq!(store.tables(SchemaKind::Aggregate).len(), 4);
}

// ---------------------------------------------------------------------------
// 2. Partial failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failure_mid_run_keeps_committed_asset_classes_only() {
    // 4 schemas + origin table + 3 statements for crypto + 2 for fx, then
    // fx's aggregate fails.
    let mut store = MemoryStore::new().fail_after(10);

    let result = configure_timeseries_schema(
        &mut store,
        &mut ScriptedConfirm::silent(),
        &desired(&["crypto", "fx"]),
        OrphanPolicy::default(),
    )
    .await;
    assert!(result.is_err());
    store.rollback();

    let names: Vec<_> = store.tables(M).into_iter().collect();
    assert_eq!(names, ["crypto_1m_raw", "crypto_5m"]);
    let origins: Vec<_> = store.origin_rows(M).into_keys().collect();
    assert_eq!(origins, ["crypto"]);

    store.clear_failure();
    let report = configure_timeseries_schema(
        &mut store,
        &mut ScriptedConfirm::silent(),
        &desired(&["crypto", "fx"]),
        OrphanPolicy::default(),
    )
    .await
    .unwrap();

    let minute = report.schema(M).unwrap();
    assert_eq!(minute.added, vec!["fx".to_string()]);
    assert_eq!(minute.unchanged, vec!["crypto".to_string()]);
    assert_eq!(store.tables(M).len(), 4);
}
