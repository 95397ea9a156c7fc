use std::collections::BTreeMap;

use tsdb_schema::{SchemaCommand, SchemaKind};

use crate::{ConfigDiff, TableDiff};

/// Outcome of reconciling one schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaReport {
    pub schema: SchemaKind,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    /// Asset classes whose update or removal the operator declined.
    pub declined: Vec<String>,
    pub removed: Vec<String>,
    /// Asset classes not added because an origin row without tables already
    /// exists for them.
    pub drifted: Vec<String>,
    /// Raw tables dropped from the config but kept in place.
    pub orphaned: Vec<String>,
    /// Raw tables dropped from the config and renamed out of the way, as (from, to).
    pub detached: Vec<(String, String)>,
    /// Every command applied, in order.
    pub applied: Vec<SchemaCommand>,
}

impl SchemaReport {
    pub fn new(schema: SchemaKind) -> Self {
        Self {
            schema,
            added: Vec::new(),
            updated: Vec::new(),
            unchanged: Vec::new(),
            declined: Vec::new(),
            removed: Vec::new(),
            drifted: Vec::new(),
            orphaned: Vec::new(),
            detached: Vec::new(),
            applied: Vec::new(),
        }
    }

    pub fn statements(&self) -> usize {
        self.applied.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created_schemas: Vec<SchemaKind>,
    pub schemas: Vec<SchemaReport>,
}

impl ReconcileReport {
    /// Schema creations plus every per-schema command.
    pub fn statements(&self) -> usize {
        self.created_schemas.len() + self.schemas.iter().map(|s| s.statements()).sum::<usize>()
    }

    pub fn schema(&self, schema: SchemaKind) -> Option<&SchemaReport> {
        self.schemas.iter().find(|s| s.schema == schema)
    }
}

/// Read-only view of what a run would do to one schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaPlan {
    pub schema: SchemaKind,
    pub schema_exists: bool,
    pub diff: ConfigDiff,
    /// Per-table diff for every asset class in `diff.to_update`.
    pub updates: BTreeMap<String, TableDiff>,
}
