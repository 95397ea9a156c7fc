use std::fmt;

use tsdb_schema::SchemaKind;

/// Conditions that stop reconciliation of an asset class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileError {
    /// An origin row exists for an asset class that has no tables. The stored
    /// and desired state disagree in a way a diff cannot explain, so the row
    /// is left alone.
    OriginDrift {
        schema: SchemaKind,
        asset_class: String,
    },
    MissingAggregationSource {
        schema: SchemaKind,
        table: String,
    },
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::OriginDrift {
                schema,
                asset_class,
            } => write!(
                f,
                "origin row for '{schema}'.'{asset_class}' already exists but the asset class \
                 has no tables; refusing to overwrite it. Inspect {schema}._origin and delete \
                 the stale row if it is no longer wanted"
            ),
            ReconcileError::MissingAggregationSource { schema, table } => write!(
                f,
                "no aggregation source for '{schema}'.'{table}'"
            ),
        }
    }
}

impl std::error::Error for ReconcileError {}
