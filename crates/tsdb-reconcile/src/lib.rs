//! tsdb-reconcile
//!
//! Converges the live timeseries schemas onto a desired configuration.
//!
//! Per schema, in fixed order, each phase committed on its own:
//! - add: origin row, raw tables, then aggregates in ascending period
//! - update: confirm, then drop every aggregate and rebuild from raw
//! - remove: confirm twice, then delete the origin row and tear everything down
//!
//! Destructive steps go through the injected [`Confirm`] capability. A
//! declined prompt is a logged no-op, never an error.

mod add;
mod confirm;
mod diff;
mod engine;
mod error;
mod inspect;
mod remove;
mod types;
mod update;

pub use confirm::{is_affirmative, Confirm, TerminalConfirm};
pub use diff::{diff_configs, diff_tables, ConfigDiff, TableDiff, UpdateState};
pub use engine::{configure_timeseries_schema, plan_timeseries_schema};
pub use error::ReconcileError;
pub use inspect::{inspect_schema, load_stored_config, SchemaSnapshot};
pub use types::{ReconcileReport, SchemaPlan, SchemaReport};

pub(crate) use engine::run;
