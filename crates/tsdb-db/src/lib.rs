//! tsdb-db
//!
//! PostgreSQL / TimescaleDB backend:
//! - pool from `TSDB_DATABASE_URL`
//! - embedded migrations for the `security` schema
//! - `sql`: the statement renderer
//! - `PgStore`: `CatalogStore` + `SecurityStore` over one pool

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub mod sql;
mod store;

pub use store::PgStore;

pub const ENV_DB_URL: &str = "TSDB_DATABASE_URL";

/// Connect to Postgres using TSDB_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    /// Installed TimescaleDB extension version, if any.
    pub timescaledb: Option<String>,
    pub has_symbols_table: bool,
}

/// Connectivity, extension and migration presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let timescaledb: Option<String> = sqlx::query_scalar(
        "select extversion::text from pg_catalog.pg_extension where extname = 'timescaledb'",
    )
    .fetch_optional(pool)
    .await
    .context("status extension query failed")?;

    let (has_symbols_table,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'security' and table_name = 'symbols'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        timescaledb,
        has_symbols_table,
    })
}
