//! tsdb-ingest
//!
//! Ingestion-time entry points, independent of structural reconciliation:
//! - [`upsert_securities`]: validate a symbol batch, stage it, merge it into
//!   `security.symbols` and classify every row as inserted or updated.
//! - [`get_symbol_series_updates`]: the raw tables a symbol should have data
//!   in but does not yet, as "fetch everything" metadata.

mod frame;
mod merge;
mod series;

pub use frame::{FrameError, SymbolFrame, REQUIRED_COLUMNS};
pub use merge::{classify, upsert_securities, UpsertOutcome};
pub use series::{get_symbol_series_updates, SeriesError};
