use anyhow::Result;

use tsdb_schema::{ConflictMode, MergedRow, SecurityStore};

use crate::SymbolFrame;

/// Primary keys touched by a merge, split by what happened to them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted: Vec<i64>,
    pub updated: Vec<i64>,
}

impl UpsertOutcome {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty()
    }
}

/// Under `Ignore` conflicting rows are never returned, so everything
/// returned was inserted. Under `Update` the conflict marker decides.
pub fn classify(rows: &[MergedRow], mode: ConflictMode) -> UpsertOutcome {
    let mut out = UpsertOutcome::default();
    for r in rows {
        match mode {
            ConflictMode::Ignore => out.inserted.push(r.pkey),
            ConflictMode::Update if r.is_fresh_insert() => out.inserted.push(r.pkey),
            ConflictMode::Update => out.updated.push(r.pkey),
        }
    }
    out
}

/// Merge `frame` into `security.symbols` under `source`.
///
/// Invalid input (blank source, missing columns or values, ragged rows) is
/// logged and yields an empty outcome without touching the store. Store
/// failures propagate.
pub async fn upsert_securities<S>(
    store: &mut S,
    frame: &SymbolFrame,
    source: &str,
    mode: ConflictMode,
) -> Result<UpsertOutcome>
where
    S: SecurityStore + ?Sized,
{
    if source.trim().is_empty() {
        tracing::error!(source = %source, "cannot insert symbols: invalid source");
        return Ok(UpsertOutcome::default());
    }

    let batch = match frame.stage() {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "cannot insert symbols: invalid symbols argument");
            return Ok(UpsertOutcome::default());
        }
    };
    if batch.is_empty() {
        tracing::info!(source = %source, "no symbols to insert");
        return Ok(UpsertOutcome::default());
    }

    let rows = store.merge_symbols(&batch, source, mode).await?;
    let outcome = classify(&rows, mode);
    tracing::info!(
        source = %source,
        staged = batch.len(),
        inserted = outcome.inserted.len(),
        updated = outcome.updated.len(),
        "symbols merged"
    );
    Ok(outcome)
}
