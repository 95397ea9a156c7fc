use chrono::{DateTime, Utc};
use std::fmt;

use crate::{AssetTable, Origins, SchemaKind};

/// Statement verb. Together with [`Target`] it keys the renderer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Create,
    Insert,
    Upsert,
    Update,
    Delete,
    Drop,
    Rename,
    Select,
    Copy,
}

/// Object a statement acts on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    Schema,
    OriginTable,
    OriginRow,
    /// Raw tick hypertable.
    TickTable,
    /// Raw bucketed hypertable (1m bars and the like).
    RawAggregateTable,
    /// Continuous aggregate computed from a tick table.
    TickAggregate,
    /// Continuous aggregate computed from bars.
    ContinuousAggregate,
    Table,
    View,
    SymbolsBuffer,
    Symbols,
}

/// Every structural change reconciliation can ask a [`crate::CatalogStore`]
/// to apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaCommand {
    CreateSchema {
        schema: SchemaKind,
    },
    CreateOriginTable {
        schema: SchemaKind,
    },
    /// Plain insert. Must fail if the row already exists.
    InsertOrigin {
        schema: SchemaKind,
        asset_class: String,
        origins: Origins,
    },
    UpsertOrigin {
        schema: SchemaKind,
        asset_class: String,
        origins: Origins,
    },
    DeleteOrigin {
        schema: SchemaKind,
        asset_class: String,
    },
    CreateRawTable {
        schema: SchemaKind,
        table: AssetTable,
    },
    CreateAggregate {
        schema: SchemaKind,
        table: AssetTable,
        source: AssetTable,
        origin: DateTime<Utc>,
    },
    /// Cascading.
    DropView {
        schema: SchemaKind,
        name: String,
    },
    /// Cascading.
    DropTable {
        schema: SchemaKind,
        name: String,
    },
    RenameTable {
        schema: SchemaKind,
        from: String,
        to: String,
    },
}

impl SchemaCommand {
    pub fn schema(&self) -> SchemaKind {
        match self {
            SchemaCommand::CreateSchema { schema }
            | SchemaCommand::CreateOriginTable { schema }
            | SchemaCommand::InsertOrigin { schema, .. }
            | SchemaCommand::UpsertOrigin { schema, .. }
            | SchemaCommand::DeleteOrigin { schema, .. }
            | SchemaCommand::CreateRawTable { schema, .. }
            | SchemaCommand::CreateAggregate { schema, .. }
            | SchemaCommand::DropView { schema, .. }
            | SchemaCommand::DropTable { schema, .. }
            | SchemaCommand::RenameTable { schema, .. } => *schema,
        }
    }

    pub fn kind(&self) -> (Operation, Target) {
        match self {
            SchemaCommand::CreateSchema { .. } => (Operation::Create, Target::Schema),
            SchemaCommand::CreateOriginTable { .. } => (Operation::Create, Target::OriginTable),
            SchemaCommand::InsertOrigin { .. } => (Operation::Insert, Target::OriginRow),
            SchemaCommand::UpsertOrigin { .. } => (Operation::Upsert, Target::OriginRow),
            SchemaCommand::DeleteOrigin { .. } => (Operation::Delete, Target::OriginRow),
            SchemaCommand::CreateRawTable { table, .. } => {
                if table.is_tick() {
                    (Operation::Create, Target::TickTable)
                } else {
                    (Operation::Create, Target::RawAggregateTable)
                }
            }
            SchemaCommand::CreateAggregate { source, .. } => {
                if source.is_tick() {
                    (Operation::Create, Target::TickAggregate)
                } else {
                    (Operation::Create, Target::ContinuousAggregate)
                }
            }
            SchemaCommand::DropView { .. } => (Operation::Drop, Target::View),
            SchemaCommand::DropTable { .. } => (Operation::Drop, Target::Table),
            SchemaCommand::RenameTable { .. } => (Operation::Rename, Target::Table),
        }
    }

    /// True for commands that discard stored rows or structure.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            SchemaCommand::DeleteOrigin { .. }
                | SchemaCommand::DropView { .. }
                | SchemaCommand::DropTable { .. }
        )
    }
}

impl fmt::Display for SchemaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaCommand::CreateSchema { schema } => write!(f, "create schema {schema}"),
            SchemaCommand::CreateOriginTable { schema } => {
                write!(f, "create table {schema}._origin")
            }
            SchemaCommand::InsertOrigin {
                schema,
                asset_class,
                ..
            } => write!(f, "insert origin {schema}/{asset_class}"),
            SchemaCommand::UpsertOrigin {
                schema,
                asset_class,
                ..
            } => write!(f, "upsert origin {schema}/{asset_class}"),
            SchemaCommand::DeleteOrigin {
                schema,
                asset_class,
            } => write!(f, "delete origin {schema}/{asset_class}"),
            SchemaCommand::CreateRawTable { schema, table } => {
                write!(f, "create table {schema}.{table}")
            }
            SchemaCommand::CreateAggregate {
                schema,
                table,
                source,
                ..
            } => write!(f, "create aggregate {schema}.{table} from {source}"),
            SchemaCommand::DropView { schema, name } => write!(f, "drop view {schema}.{name}"),
            SchemaCommand::DropTable { schema, name } => write!(f, "drop table {schema}.{name}"),
            SchemaCommand::RenameTable { schema, from, to } => {
                write!(f, "rename table {schema}.{from} to {to}")
            }
        }
    }
}
