//! tsdb-testkit
//!
//! Deterministic in-memory doubles for the reconciliation and ingest
//! scenarios: a transactional [`MemoryStore`] and a [`ScriptedConfirm`].
//! No database, no terminal.

mod confirm;
mod memory_store;

pub use confirm::ScriptedConfirm;
pub use memory_store::{Catalog, MemoryStore, Relation, SchemaState, SymbolRow};

use chrono::{DateTime, TimeZone, Utc};
use tsdb_schema::Origins;

/// Midnight UTC of the given day.
pub fn utc_day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Origins with regular, extended and higher-timeframe sessions all on the
/// same instant.
pub fn flat_origins(at: DateTime<Utc>) -> Origins {
    Origins::new(at, at, at)
}
