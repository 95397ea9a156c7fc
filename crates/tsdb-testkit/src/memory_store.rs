//! In-memory [`CatalogStore`] + [`SecurityStore`].
//!
//! Catalog changes follow transaction semantics: applied commands land in a
//! pending copy that later reads see, `commit` publishes it, and `rollback`
//! (or dropping the store) throws it away. The rules a real database would
//! enforce are enforced here too: objects must exist before they are used,
//! names are unique, plain origin inserts fail on an existing row, and drops
//! cascade to dependent views.
//!
//! Symbol merges run in their own implicit transaction and are durable
//! immediately, independent of pending catalog work.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use tsdb_schema::{
    AssetTable, CatalogStore, ConflictMode, MergedRow, MetadataInfo, Origins, SchemaCommand,
    SchemaKind, SecurityStore, StagedSymbol, StorageFlags, SymbolStorage, ORIGIN_TABLE,
};

// ---------------------------------------------------------------------------
// Catalog state
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Relation {
    Table,
    /// Continuous aggregate reading from `source`.
    View { source: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaState {
    /// Every relation except the origin table.
    pub relations: BTreeMap<String, Relation>,
    pub has_origin_table: bool,
    pub origins: BTreeMap<String, Origins>,
}

impl SchemaState {
    /// Remove `name` and, transitively, every view reading from it.
    fn drop_cascade(&mut self, name: &str) {
        let mut queue = vec![name.to_string()];
        while let Some(n) = queue.pop() {
            if self.relations.remove(&n).is_none() {
                continue;
            }
            for (dep, rel) in &self.relations {
                if matches!(rel, Relation::View { source } if *source == n) {
                    queue.push(dep.clone());
                }
            }
        }
    }
}

/// Full structural state of the fake database, keyed by schema name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    pub schemas: BTreeMap<String, SchemaState>,
}

impl Catalog {
    fn schema_mut(&mut self, schema: SchemaKind) -> Result<&mut SchemaState> {
        self.schemas
            .get_mut(schema.as_str())
            .ok_or_else(|| anyhow!("schema \"{schema}\" does not exist"))
    }

    fn origin_table_mut(&mut self, schema: SchemaKind) -> Result<&mut SchemaState> {
        let s = self.schema_mut(schema)?;
        if !s.has_origin_table {
            bail!("relation \"{schema}.{ORIGIN_TABLE}\" does not exist");
        }
        Ok(s)
    }

    fn apply(&mut self, command: &SchemaCommand) -> Result<()> {
        match command {
            SchemaCommand::CreateSchema { schema } => {
                if self.schemas.contains_key(schema.as_str()) {
                    bail!("schema \"{schema}\" already exists");
                }
                self.schemas
                    .insert(schema.as_str().to_string(), SchemaState::default());
            }
            SchemaCommand::CreateOriginTable { schema } => {
                let s = self.schema_mut(*schema)?;
                if s.has_origin_table {
                    bail!("relation \"{ORIGIN_TABLE}\" already exists");
                }
                s.has_origin_table = true;
            }
            SchemaCommand::InsertOrigin {
                schema,
                asset_class,
                origins,
            } => {
                let s = self.origin_table_mut(*schema)?;
                if s.origins.contains_key(asset_class) {
                    bail!("duplicate key value violates unique constraint: asset_class={asset_class}");
                }
                s.origins.insert(asset_class.clone(), *origins);
            }
            SchemaCommand::UpsertOrigin {
                schema,
                asset_class,
                origins,
            } => {
                let s = self.origin_table_mut(*schema)?;
                s.origins.insert(asset_class.clone(), *origins);
            }
            SchemaCommand::DeleteOrigin {
                schema,
                asset_class,
            } => {
                let s = self.origin_table_mut(*schema)?;
                s.origins.remove(asset_class);
            }
            SchemaCommand::CreateRawTable { schema, table } => {
                let s = self.schema_mut(*schema)?;
                let name = table.table_name();
                if s.relations.contains_key(&name) {
                    bail!("relation \"{name}\" already exists");
                }
                s.relations.insert(name, Relation::Table);
            }
            SchemaCommand::CreateAggregate {
                schema,
                table,
                source,
                ..
            } => {
                let s = self.schema_mut(*schema)?;
                let name = table.table_name();
                let source = source.table_name();
                if s.relations.contains_key(&name) {
                    bail!("relation \"{name}\" already exists");
                }
                if !s.relations.contains_key(&source) {
                    bail!("relation \"{source}\" does not exist");
                }
                s.relations.insert(name, Relation::View { source });
            }
            SchemaCommand::DropView { schema, name } => {
                let s = self.schema_mut(*schema)?;
                match s.relations.get(name).cloned() {
                    None => {}
                    Some(Relation::Table) => bail!("\"{name}\" is not a materialized view"),
                    Some(Relation::View { .. }) => s.drop_cascade(name),
                }
            }
            SchemaCommand::DropTable { schema, name } => {
                let s = self.schema_mut(*schema)?;
                match s.relations.get(name).cloned() {
                    None => {}
                    Some(Relation::View { .. }) => bail!("\"{name}\" is not a table"),
                    Some(Relation::Table) => s.drop_cascade(name),
                }
            }
            SchemaCommand::RenameTable { schema, from, to } => {
                let s = self.schema_mut(*schema)?;
                if s.relations.contains_key(to) {
                    bail!("relation \"{to}\" already exists");
                }
                let rel = s
                    .relations
                    .remove(from)
                    .ok_or_else(|| anyhow!("relation \"{from}\" does not exist"))?;
                s.relations.insert(to.clone(), rel);
                for rel in s.relations.values_mut() {
                    if let Relation::View { source } = rel {
                        if source == from {
                            *source = to.clone();
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Security state
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolRow {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub asset_class: String,
    pub source: String,
    pub attrs: String,
    pub flags: StorageFlags,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    committed: Catalog,
    pending: Option<Catalog>,
    applied: Vec<SchemaCommand>,
    commits: usize,
    fail_after: Option<usize>,

    symbols: BTreeMap<i64, SymbolRow>,
    next_pkey: i64,
    merge_calls: usize,
    series: BTreeMap<(SchemaKind, String, i64), (DateTime<Utc>, DateTime<Utc>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_pkey: 1,
            ..Self::default()
        }
    }

    /// Fail the apply that follows `n` successful ones. Simulates a
    /// statement error partway through a run.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn clear_failure(&mut self) {
        self.fail_after = None;
    }

    /// Committed state only.
    pub fn catalog(&self) -> &Catalog {
        &self.committed
    }

    /// Committed relation names of `schema`, origin table excluded.
    pub fn tables(&self, schema: SchemaKind) -> BTreeSet<String> {
        self.committed
            .schemas
            .get(schema.as_str())
            .map(|s| s.relations.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn relation(&self, schema: SchemaKind, name: &str) -> Option<&Relation> {
        self.committed
            .schemas
            .get(schema.as_str())
            .and_then(|s| s.relations.get(name))
    }

    /// Committed origin rows of `schema`.
    pub fn origin_rows(&self, schema: SchemaKind) -> BTreeMap<String, Origins> {
        self.committed
            .schemas
            .get(schema.as_str())
            .map(|s| s.origins.clone())
            .unwrap_or_default()
    }

    /// Every command successfully applied, including ones later rolled back.
    pub fn applied(&self) -> &[SchemaCommand] {
        &self.applied
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn rollback(&mut self) {
        self.pending = None;
    }

    /// Apply and commit `commands` directly, bypassing the log. For seeding
    /// pre-existing database state.
    pub fn seed(&mut self, commands: &[SchemaCommand]) -> Result<()> {
        let mut next = self.committed.clone();
        for c in commands {
            next.apply(c)?;
        }
        self.committed = next;
        Ok(())
    }

    pub fn seed_symbol(
        &mut self,
        symbol: &str,
        exchange: &str,
        source: &str,
        asset_class: &str,
        flags: StorageFlags,
    ) -> i64 {
        let pkey = self.next_pkey;
        self.next_pkey += 1;
        self.symbols.insert(
            pkey,
            SymbolRow {
                symbol: symbol.to_string(),
                name: symbol.to_string(),
                exchange: exchange.to_string(),
                asset_class: asset_class.to_string(),
                source: source.to_string(),
                attrs: "{}".to_string(),
                flags,
            },
        );
        pkey
    }

    /// Record that `table` holds rows for `pkey` spanning `[start, end]`.
    pub fn seed_series(
        &mut self,
        schema: SchemaKind,
        table: &AssetTable,
        pkey: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) {
        self.series
            .insert((schema, table.table_name(), pkey), (start, end));
    }

    pub fn symbol(&self, pkey: i64) -> Option<&SymbolRow> {
        self.symbols.get(&pkey)
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Number of times the merge reached the store.
    pub fn merge_calls(&self) -> usize {
        self.merge_calls
    }

    fn visible(&self) -> &Catalog {
        self.pending.as_ref().unwrap_or(&self.committed)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_schemas(&mut self) -> Result<BTreeSet<String>> {
        Ok(self.visible().schemas.keys().cloned().collect())
    }

    async fn list_tables(&mut self, schema: SchemaKind) -> Result<BTreeSet<String>> {
        let Some(s) = self.visible().schemas.get(schema.as_str()) else {
            return Ok(BTreeSet::new());
        };
        let mut names: BTreeSet<String> = s.relations.keys().cloned().collect();
        if s.has_origin_table {
            names.insert(ORIGIN_TABLE.to_string());
        }
        Ok(names)
    }

    async fn select_origins(&mut self, schema: SchemaKind) -> Result<BTreeMap<String, Origins>> {
        Ok(self
            .visible()
            .schemas
            .get(schema.as_str())
            .filter(|s| s.has_origin_table)
            .map(|s| s.origins.clone())
            .unwrap_or_default())
    }

    async fn apply(&mut self, command: &SchemaCommand) -> Result<()> {
        if let Some(n) = self.fail_after {
            if self.applied.len() >= n {
                bail!("injected failure at: {command}");
            }
        }
        let committed = &self.committed;
        let pending = self.pending.get_or_insert_with(|| committed.clone());
        pending.apply(command)?;
        self.applied.push(command.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(p) = self.pending.take() {
            self.committed = p;
            self.commits += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl SecurityStore for MemoryStore {
    async fn merge_symbols(
        &mut self,
        batch: &[StagedSymbol],
        source: &str,
        mode: ConflictMode,
    ) -> Result<Vec<MergedRow>> {
        self.merge_calls += 1;
        if source.is_empty() {
            bail!("new row for relation \"symbols\" violates check constraint: source");
        }

        let mut seen = BTreeSet::new();
        for s in batch {
            if !seen.insert((s.symbol.as_str(), s.exchange.as_str())) && mode == ConflictMode::Update {
                bail!("ON CONFLICT DO UPDATE command cannot affect row a second time");
            }
        }

        // Non-zero marker for rows that already had a version.
        let marker = self.merge_calls.to_string();
        let mut next = self.symbols.clone();
        let mut next_pkey = self.next_pkey;
        let mut out = Vec::new();
        for s in batch {
            let existing = next
                .iter()
                .find(|(_, r)| r.symbol == s.symbol && r.exchange == s.exchange && r.source == source)
                .map(|(k, _)| *k);
            match (existing, mode) {
                (Some(_), ConflictMode::Ignore) => {}
                (Some(pkey), ConflictMode::Update) => {
                    if let Some(r) = next.get_mut(&pkey) {
                        r.name = s.name.clone();
                        r.asset_class = s.asset_class.clone();
                        r.attrs = s.attrs.clone();
                    }
                    out.push(MergedRow {
                        pkey,
                        conflict_marker: marker.clone(),
                    });
                }
                (None, _) => {
                    let pkey = next_pkey;
                    next_pkey += 1;
                    next.insert(
                        pkey,
                        SymbolRow {
                            symbol: s.symbol.clone(),
                            name: s.name.clone(),
                            exchange: s.exchange.clone(),
                            asset_class: s.asset_class.clone(),
                            source: source.to_string(),
                            attrs: s.attrs.clone(),
                            flags: StorageFlags::default(),
                        },
                    );
                    out.push(MergedRow {
                        pkey,
                        conflict_marker: "0".to_string(),
                    });
                }
            }
        }

        self.symbols = next;
        self.next_pkey = next_pkey;
        Ok(out)
    }

    async fn symbol_storage(&mut self, pkey: i64) -> Result<Option<SymbolStorage>> {
        Ok(self.symbols.get(&pkey).map(|r| SymbolStorage {
            asset_class: r.asset_class.clone(),
            flags: r.flags,
        }))
    }

    async fn update_symbol_storage(&mut self, pkey: i64, flags: StorageFlags) -> Result<bool> {
        match self.symbols.get_mut(&pkey) {
            Some(r) => {
                r.flags = flags;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn series_metadata(
        &mut self,
        pkey: i64,
        schema: SchemaKind,
        tables: &[AssetTable],
    ) -> Result<Vec<MetadataInfo>> {
        let live = self.tables(schema);
        let mut out = Vec::new();
        for t in tables {
            let name = t.table_name();
            if !live.contains(&name) {
                continue;
            }
            if let Some((start, end)) = self.series.get(&(schema, name.clone(), pkey)) {
                out.push(MetadataInfo {
                    table_name: name,
                    schema,
                    start: *start,
                    end: *end,
                    table: t.clone(),
                });
            }
        }
        Ok(out)
    }
}
