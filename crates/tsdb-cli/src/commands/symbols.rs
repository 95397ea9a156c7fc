//! `tsdb symbols upsert|storage|updates`.

use anyhow::{bail, Result};
use std::path::PathBuf;

use tsdb_db::PgStore;
use tsdb_ingest::{get_symbol_series_updates, upsert_securities, SymbolFrame};
use tsdb_schema::{ConflictMode, SecurityStore, StorageFlags};

use super::join_or_dash;

pub async fn symbols_upsert(csv: PathBuf, source: String, on_conflict: String) -> Result<()> {
    let mode = ConflictMode::parse(&on_conflict)?;
    let frame = SymbolFrame::from_csv_path(&csv)?;

    let pool = tsdb_db::connect_from_env().await?;
    let mut store = PgStore::new(pool);
    let out = upsert_securities(&mut store, &frame, &source, mode).await?;

    println!(
        "rows_read={} inserted={} updated={}",
        frame.len(),
        out.inserted.len(),
        out.updated.len()
    );
    println!("inserted_pkeys={}", join_or_dash(&out.inserted));
    println!("updated_pkeys={}", join_or_dash(&out.updated));
    Ok(())
}

pub async fn symbols_storage(pkey: i64, tick: bool, minute: bool, aggregate: bool) -> Result<()> {
    let flags = StorageFlags {
        tick,
        minute,
        aggregate,
    };

    let pool = tsdb_db::connect_from_env().await?;
    let mut store = PgStore::new(pool);
    if !store.update_symbol_storage(pkey, flags).await? {
        bail!("unknown symbol pkey={pkey}");
    }

    println!(
        "updated=true pkey={} store_tick={} store_minute={} store_aggregate={}",
        pkey, tick, minute, aggregate
    );
    Ok(())
}

pub async fn symbols_updates(pkey: i64) -> Result<()> {
    let pool = tsdb_db::connect_from_env().await?;
    let mut store = PgStore::new(pool);
    let missing = get_symbol_series_updates(&mut store, pkey).await?;
    store.rollback().await?;

    println!("pkey={} missing={}", pkey, missing.len());
    for m in &missing {
        println!(
            "  schema={} table={} start={} end={}",
            m.schema,
            m.table_name,
            m.start.to_rfc3339(),
            m.end.to_rfc3339()
        );
    }
    Ok(())
}
