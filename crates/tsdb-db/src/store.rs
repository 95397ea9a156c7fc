use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Executor, PgConnection, PgPool, Postgres, Row, Transaction};
use std::collections::{BTreeMap, BTreeSet};

use tsdb_schema::{
    AssetTable, CatalogStore, ConflictMode, MergedRow, MetadataInfo, Origins, SchemaCommand,
    SchemaKind, SecurityStore, StagedSymbol, StorageFlags, SymbolStorage, ORIGIN_TABLE,
};

use crate::sql::{
    render_catalog_query, render_schema_command, render_security_command, CatalogQuery, Param,
    SecurityCommand, Statement,
};

/// Both store seams over one pool.
///
/// Catalog work runs in a lazily opened transaction that lives until
/// [`CatalogStore::commit`]; dropping the store rolls it back. Security
/// operations each run on their own connection or transaction.
pub struct PgStore {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Discard uncommitted catalog work.
    pub async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.context("rollback failed")?;
        }
        Ok(())
    }

    async fn catalog_conn(&mut self) -> Result<&mut PgConnection> {
        if self.tx.is_none() {
            let tx = self
                .pool
                .begin()
                .await
                .context("begin catalog transaction failed")?;
            self.tx = Some(tx);
        }
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(anyhow!("catalog transaction not open")),
        }
    }

    async fn tables_in(&mut self, schema: SchemaKind) -> Result<BTreeSet<String>> {
        let stmt = render_catalog_query(&CatalogQuery::ListTables { schema });
        let conn = self.catalog_conn().await?;
        let rows = fetch_all(conn, &stmt)
            .await
            .with_context(|| format!("list tables in {schema} failed"))?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("name").context("decode table name"))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Execution helpers
// ---------------------------------------------------------------------------

fn bind<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: &'q [Param],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        q = match p {
            Param::Text(s) => q.bind(s.as_str()),
            Param::BigInt(n) => q.bind(*n),
            Param::Bool(b) => q.bind(*b),
            Param::Timestamp(t) => q.bind(*t),
        };
    }
    q
}

// Parameterless statements go over the simple-query protocol so DDL is never
// cached as a prepared statement.
async fn execute(conn: &mut PgConnection, stmt: &Statement) -> Result<u64> {
    let done = if stmt.params.is_empty() {
        (&mut *conn).execute(stmt.sql.as_str()).await
    } else {
        bind(sqlx::query(&stmt.sql), &stmt.params)
            .execute(&mut *conn)
            .await
    };
    done.map(|r| r.rows_affected())
        .with_context(|| format!("statement failed: {}", stmt.sql))
}

async fn fetch_all(conn: &mut PgConnection, stmt: &Statement) -> Result<Vec<PgRow>> {
    bind(sqlx::query(&stmt.sql), &stmt.params)
        .fetch_all(&mut *conn)
        .await
        .with_context(|| format!("query failed: {}", stmt.sql))
}

fn staged_csv(batch: &[StagedSymbol]) -> Result<Vec<u8>> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for s in batch {
        w.write_record(s.fields())
            .with_context(|| format!("encode staging row failed: {}", s.symbol))?;
    }
    w.into_inner()
        .map_err(|e| anyhow!("flush staging rows failed: {}", e.error()))
}

// ---------------------------------------------------------------------------
// CatalogStore
// ---------------------------------------------------------------------------

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_schemas(&mut self) -> Result<BTreeSet<String>> {
        let stmt = render_catalog_query(&CatalogQuery::ListSchemas);
        let conn = self.catalog_conn().await?;
        let rows = fetch_all(conn, &stmt).await.context("list schemas failed")?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("name").context("decode schema name"))
            .collect()
    }

    async fn list_tables(&mut self, schema: SchemaKind) -> Result<BTreeSet<String>> {
        self.tables_in(schema).await
    }

    async fn select_origins(&mut self, schema: SchemaKind) -> Result<BTreeMap<String, Origins>> {
        if !self.tables_in(schema).await?.contains(ORIGIN_TABLE) {
            return Ok(BTreeMap::new());
        }

        let stmt = render_catalog_query(&CatalogQuery::SelectOrigins { schema });
        let conn = self.catalog_conn().await?;
        let rows = fetch_all(conn, &stmt)
            .await
            .with_context(|| format!("select origins in {schema} failed"))?;

        let mut out = BTreeMap::new();
        for r in rows {
            let asset: String = r.try_get("asset_class").context("decode asset_class")?;
            let origins = Origins::new(
                r.try_get("origin_rth").context("decode origin_rth")?,
                r.try_get("origin_eth").context("decode origin_eth")?,
                r.try_get("origin_htf").context("decode origin_htf")?,
            );
            out.insert(asset, origins);
        }
        Ok(out)
    }

    async fn apply(&mut self, command: &SchemaCommand) -> Result<()> {
        let stmts = render_schema_command(command);
        let conn = self.catalog_conn().await?;
        for stmt in &stmts {
            tracing::debug!(sql = %stmt.sql, "apply");
            execute(conn, stmt)
                .await
                .with_context(|| format!("apply '{command}' failed"))?;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.context("commit failed")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SecurityStore
// ---------------------------------------------------------------------------

#[async_trait]
impl SecurityStore for PgStore {
    async fn merge_symbols(
        &mut self,
        batch: &[StagedSymbol],
        source: &str,
        mode: ConflictMode,
    ) -> Result<Vec<MergedRow>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let payload = staged_csv(batch)?;

        // The staging table is ON COMMIT DROP and the transaction rolls back
        // on drop, so no exit path leaves it behind.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin merge transaction failed")?;

        execute(
            &mut tx,
            &render_security_command(&SecurityCommand::CreateSymbolsBuffer),
        )
        .await?;

        let copy_sql = render_security_command(&SecurityCommand::CopySymbolsBuffer).sql;
        let mut copy = tx
            .copy_in_raw(&copy_sql)
            .await
            .context("COPY into symbols_buffer failed to start")?;
        let sent = copy.send(payload).await.map(|_| ());
        if let Err(e) = sent {
            // Best effort: the transaction is discarded either way.
            let _ = copy.abort("staging load failed").await;
            return Err(anyhow!(e).context("COPY into symbols_buffer failed"));
        }
        let copied = copy
            .finish()
            .await
            .context("COPY into symbols_buffer failed to finish")?;

        let merge = render_security_command(&SecurityCommand::MergeSymbols {
            source: source.to_string(),
            mode,
        });
        let rows = fetch_all(&mut tx, &merge).await?;
        tx.commit().await.context("commit merge transaction failed")?;

        tracing::info!(
            source = %source,
            staged = copied,
            returned = rows.len(),
            "merged symbols"
        );

        rows.iter()
            .map(|r| {
                Ok::<_, anyhow::Error>(MergedRow {
                    pkey: r.try_get("pkey").context("decode pkey")?,
                    conflict_marker: r
                        .try_get("conflict_marker")
                        .context("decode conflict_marker")?,
                })
            })
            .collect()
    }

    async fn symbol_storage(&mut self, pkey: i64) -> Result<Option<SymbolStorage>> {
        let stmt = render_security_command(&SecurityCommand::SelectSymbolStorage { pkey });
        let mut conn = self.pool.acquire().await.context("acquire failed")?;
        let rows = fetch_all(&mut conn, &stmt).await?;
        let Some(r) = rows.first() else {
            return Ok(None);
        };
        Ok(Some(SymbolStorage {
            asset_class: r.try_get("asset_class").context("decode asset_class")?,
            flags: StorageFlags {
                tick: r.try_get("store_tick").context("decode store_tick")?,
                minute: r.try_get("store_minute").context("decode store_minute")?,
                aggregate: r
                    .try_get("store_aggregate")
                    .context("decode store_aggregate")?,
            },
        }))
    }

    async fn update_symbol_storage(&mut self, pkey: i64, flags: StorageFlags) -> Result<bool> {
        let stmt = render_security_command(&SecurityCommand::UpdateSymbolStorage { pkey, flags });
        let mut conn = self.pool.acquire().await.context("acquire failed")?;
        Ok(execute(&mut conn, &stmt).await? > 0)
    }

    async fn series_metadata(
        &mut self,
        pkey: i64,
        schema: SchemaKind,
        tables: &[AssetTable],
    ) -> Result<Vec<MetadataInfo>> {
        let mut conn = self.pool.acquire().await.context("acquire failed")?;

        let list = render_catalog_query(&CatalogQuery::ListTables { schema });
        let existing: BTreeSet<String> = fetch_all(&mut conn, &list)
            .await?
            .iter()
            .map(|r| r.try_get::<String, _>("name").context("decode table name"))
            .collect::<Result<_>>()?;

        let mut out = Vec::new();
        for t in tables {
            let name = t.table_name();
            if !existing.contains(&name) {
                continue;
            }
            let stmt = render_catalog_query(&CatalogQuery::SeriesRange {
                schema,
                table: name.clone(),
                pkey,
            });
            let rows = fetch_all(&mut conn, &stmt).await?;
            let Some(r) = rows.first() else {
                continue;
            };
            let start: Option<DateTime<Utc>> = r.try_get("start_dt").context("decode start_dt")?;
            let end: Option<DateTime<Utc>> = r.try_get("end_dt").context("decode end_dt")?;
            if let (Some(start), Some(end)) = (start, end) {
                out.push(MetadataInfo {
                    table_name: name,
                    schema,
                    start,
                    end,
                    table: t.clone(),
                });
            }
        }
        Ok(out)
    }
}
