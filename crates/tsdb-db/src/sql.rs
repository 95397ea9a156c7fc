//! Statement renderer.
//!
//! Every command the stores issue is a typed value keyed by
//! `(Operation, Target)`. Rendering is one exhaustive `match` per command
//! family, so adding a variant without SQL for it does not compile.
//!
//! Identifiers are always quoted. Values are bound parameters, except the
//! bucket origin inside continuous-aggregate DDL, which TimescaleDB needs as a
//! literal; it is rendered from a validated `DateTime<Utc>`.

use chrono::{DateTime, SecondsFormat, Utc};

use tsdb_schema::{
    AssetTable, ConflictMode, Operation, SchemaCommand, SchemaKind, StagedSymbol, StorageFlags,
    Target, ORIGIN_TABLE,
};

/// Name of the transaction-scoped staging table for the symbol merge.
pub const SYMBOLS_BUFFER: &str = "symbols_buffer";

#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Text(String),
    BigInt(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Statement {
    fn plain(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn with(sql: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

// ---------------------------------------------------------------------------
// Quoting
// ---------------------------------------------------------------------------

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn qualified(schema: SchemaKind, name: &str) -> String {
    format!("{}.{}", quote_ident(schema.as_str()), quote_ident(name))
}

fn timestamptz_literal(ts: DateTime<Utc>) -> String {
    format!(
        "TIMESTAMPTZ {}",
        quote_literal(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    )
}

fn interval_literal(secs: i64) -> String {
    format!("INTERVAL {}", quote_literal(&format!("{secs} seconds")))
}

// ---------------------------------------------------------------------------
// Structural commands
// ---------------------------------------------------------------------------

pub fn render_schema_command(cmd: &SchemaCommand) -> Vec<Statement> {
    match cmd {
        SchemaCommand::CreateSchema { schema } => vec![Statement::plain(format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_ident(schema.as_str())
        ))],

        SchemaCommand::CreateOriginTable { schema } => vec![Statement::plain(format!(
            "CREATE TABLE IF NOT EXISTS {} (\
               asset_class TEXT PRIMARY KEY, \
               origin_rth TIMESTAMPTZ NOT NULL, \
               origin_eth TIMESTAMPTZ NOT NULL, \
               origin_htf TIMESTAMPTZ NOT NULL)",
            qualified(*schema, ORIGIN_TABLE)
        ))],

        SchemaCommand::InsertOrigin {
            schema,
            asset_class,
            origins,
        } => vec![Statement::with(
            format!(
                "INSERT INTO {} (asset_class, origin_rth, origin_eth, origin_htf) \
                 VALUES ($1, $2, $3, $4)",
                qualified(*schema, ORIGIN_TABLE)
            ),
            origin_params(asset_class, origins),
        )],

        SchemaCommand::UpsertOrigin {
            schema,
            asset_class,
            origins,
        } => vec![Statement::with(
            format!(
                "INSERT INTO {} (asset_class, origin_rth, origin_eth, origin_htf) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (asset_class) DO UPDATE SET \
                   origin_rth = EXCLUDED.origin_rth, \
                   origin_eth = EXCLUDED.origin_eth, \
                   origin_htf = EXCLUDED.origin_htf",
                qualified(*schema, ORIGIN_TABLE)
            ),
            origin_params(asset_class, origins),
        )],

        SchemaCommand::DeleteOrigin {
            schema,
            asset_class,
        } => vec![Statement::with(
            format!(
                "DELETE FROM {} WHERE asset_class = $1",
                qualified(*schema, ORIGIN_TABLE)
            ),
            vec![Param::Text(asset_class.clone())],
        )],

        SchemaCommand::CreateRawTable { schema, table } => {
            let name = qualified(*schema, &table.table_name());
            let columns = if table.is_tick() {
                "dt TIMESTAMPTZ NOT NULL, \
                 symbol_id BIGINT NOT NULL, \
                 price DOUBLE PRECISION NOT NULL, \
                 volume DOUBLE PRECISION, \
                 PRIMARY KEY (symbol_id, dt)"
            } else {
                "dt TIMESTAMPTZ NOT NULL, \
                 symbol_id BIGINT NOT NULL, \
                 open DOUBLE PRECISION NOT NULL, \
                 high DOUBLE PRECISION NOT NULL, \
                 low DOUBLE PRECISION NOT NULL, \
                 close DOUBLE PRECISION NOT NULL, \
                 volume DOUBLE PRECISION, \
                 vwap DOUBLE PRECISION, \
                 ticks BIGINT, \
                 PRIMARY KEY (symbol_id, dt)"
            };
            vec![
                Statement::plain(format!("CREATE TABLE {name} ({columns})")),
                Statement::plain(format!(
                    "SELECT create_hypertable({}, 'dt')",
                    quote_literal(&name)
                )),
            ]
        }

        SchemaCommand::CreateAggregate {
            schema,
            table,
            source,
            origin,
        } => vec![Statement::plain(continuous_aggregate(
            *schema, table, source, *origin,
        ))],

        SchemaCommand::DropView { schema, name } => vec![Statement::plain(format!(
            "DROP MATERIALIZED VIEW IF EXISTS {} CASCADE",
            qualified(*schema, name)
        ))],

        SchemaCommand::DropTable { schema, name } => vec![Statement::plain(format!(
            "DROP TABLE IF EXISTS {} CASCADE",
            qualified(*schema, name)
        ))],

        SchemaCommand::RenameTable { schema, from, to } => vec![Statement::plain(format!(
            "ALTER TABLE {} RENAME TO {}",
            qualified(*schema, from),
            quote_ident(to)
        ))],
    }
}

fn origin_params(asset_class: &str, origins: &tsdb_schema::Origins) -> Vec<Param> {
    vec![
        Param::Text(asset_class.to_string()),
        Param::Timestamp(origins.rth),
        Param::Timestamp(origins.eth),
        Param::Timestamp(origins.htf),
    ]
}

fn continuous_aggregate(
    schema: SchemaKind,
    table: &AssetTable,
    source: &AssetTable,
    origin: DateTime<Utc>,
) -> String {
    let bucket = format!(
        "time_bucket({}, dt, origin => {})",
        interval_literal(table.period.secs()),
        timestamptz_literal(origin)
    );
    let select = if source.is_tick() {
        "first(price, dt) AS open, \
         max(price) AS high, \
         min(price) AS low, \
         last(price, dt) AS close, \
         sum(volume) AS volume, \
         sum(price * volume) / NULLIF(sum(volume), 0) AS vwap, \
         count(*) AS ticks"
    } else {
        "first(open, dt) AS open, \
         max(high) AS high, \
         min(low) AS low, \
         last(close, dt) AS close, \
         sum(volume) AS volume, \
         sum(vwap * volume) / NULLIF(sum(volume), 0) AS vwap, \
         sum(ticks)::BIGINT AS ticks"
    };
    format!(
        "CREATE MATERIALIZED VIEW {view} WITH (timescaledb.continuous) AS \
         SELECT symbol_id, {bucket} AS dt, {select} \
         FROM {src} \
         GROUP BY symbol_id, {bucket} \
         WITH NO DATA",
        view = qualified(schema, &table.table_name()),
        src = qualified(schema, &source.table_name()),
    )
}

// ---------------------------------------------------------------------------
// Catalog reads
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogQuery {
    ListSchemas,
    ListTables { schema: SchemaKind },
    SelectOrigins { schema: SchemaKind },
    SeriesRange { schema: SchemaKind, table: String, pkey: i64 },
}

impl CatalogQuery {
    pub fn kind(&self) -> (Operation, Target) {
        match self {
            CatalogQuery::ListSchemas => (Operation::Select, Target::Schema),
            CatalogQuery::ListTables { .. } => (Operation::Select, Target::Table),
            CatalogQuery::SelectOrigins { .. } => (Operation::Select, Target::OriginRow),
            CatalogQuery::SeriesRange { .. } => (Operation::Select, Target::RawAggregateTable),
        }
    }
}

pub fn render_catalog_query(q: &CatalogQuery) -> Statement {
    match q {
        CatalogQuery::ListSchemas => {
            Statement::plain("SELECT nspname::TEXT AS name FROM pg_catalog.pg_namespace")
        }
        // Tables, views and materialized views; continuous aggregates surface as views.
        CatalogQuery::ListTables { schema } => Statement::with(
            "SELECT c.relname::TEXT AS name \
             FROM pg_catalog.pg_class c \
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
             WHERE n.nspname = $1 AND c.relkind IN ('r', 'p', 'v', 'm')",
            vec![Param::Text(schema.as_str().to_string())],
        ),
        CatalogQuery::SelectOrigins { schema } => Statement::plain(format!(
            "SELECT asset_class, origin_rth, origin_eth, origin_htf FROM {}",
            qualified(*schema, ORIGIN_TABLE)
        )),
        CatalogQuery::SeriesRange {
            schema,
            table,
            pkey,
        } => Statement::with(
            format!(
                "SELECT min(dt) AS start_dt, max(dt) AS end_dt FROM {} WHERE symbol_id = $1",
                qualified(*schema, table)
            ),
            vec![Param::BigInt(*pkey)],
        ),
    }
}

// ---------------------------------------------------------------------------
// Security commands
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecurityCommand {
    CreateSymbolsBuffer,
    CopySymbolsBuffer,
    MergeSymbols { source: String, mode: ConflictMode },
    SelectSymbolStorage { pkey: i64 },
    UpdateSymbolStorage { pkey: i64, flags: StorageFlags },
}

impl SecurityCommand {
    pub fn kind(&self) -> (Operation, Target) {
        match self {
            SecurityCommand::CreateSymbolsBuffer => (Operation::Create, Target::SymbolsBuffer),
            SecurityCommand::CopySymbolsBuffer => (Operation::Copy, Target::SymbolsBuffer),
            SecurityCommand::MergeSymbols { mode, .. } => match mode {
                ConflictMode::Ignore => (Operation::Insert, Target::SymbolsBuffer),
                ConflictMode::Update => (Operation::Upsert, Target::SymbolsBuffer),
            },
            SecurityCommand::SelectSymbolStorage { .. } => (Operation::Select, Target::Symbols),
            SecurityCommand::UpdateSymbolStorage { .. } => (Operation::Update, Target::Symbols),
        }
    }
}

pub fn render_security_command(cmd: &SecurityCommand) -> Statement {
    let symbols = qualified(SchemaKind::Security, "symbols");
    match cmd {
        SecurityCommand::CreateSymbolsBuffer => Statement::plain(format!(
            "CREATE TEMPORARY TABLE {} (\
               symbol TEXT NOT NULL, \
               name TEXT NOT NULL, \
               exchange TEXT NOT NULL, \
               asset_class TEXT NOT NULL, \
               attrs JSONB) \
             ON COMMIT DROP",
            quote_ident(SYMBOLS_BUFFER)
        )),

        SecurityCommand::CopySymbolsBuffer => {
            let cols = StagedSymbol::COLUMNS
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            Statement::plain(format!(
                "COPY {} ({cols}) FROM STDIN WITH (FORMAT csv)",
                quote_ident(SYMBOLS_BUFFER)
            ))
        }

        SecurityCommand::MergeSymbols { source, mode } => {
            let on_conflict = match mode {
                ConflictMode::Ignore => "DO NOTHING",
                ConflictMode::Update => {
                    "DO UPDATE SET \
                       name = EXCLUDED.name, \
                       asset_class = EXCLUDED.asset_class, \
                       attrs = EXCLUDED.attrs"
                }
            };
            Statement::with(
                format!(
                    "INSERT INTO {symbols} (symbol, name, exchange, asset_class, source, attrs) \
                     SELECT symbol, name, exchange, asset_class, $1, attrs FROM {buffer} \
                     ON CONFLICT (symbol, exchange, source) {on_conflict} \
                     RETURNING pkey, xmax::TEXT AS conflict_marker",
                    buffer = quote_ident(SYMBOLS_BUFFER)
                ),
                vec![Param::Text(source.clone())],
            )
        }

        SecurityCommand::SelectSymbolStorage { pkey } => Statement::with(
            format!(
                "SELECT asset_class, store_tick, store_minute, store_aggregate \
                 FROM {symbols} WHERE pkey = $1"
            ),
            vec![Param::BigInt(*pkey)],
        ),

        SecurityCommand::UpdateSymbolStorage { pkey, flags } => Statement::with(
            format!(
                "UPDATE {symbols} SET store_tick = $2, store_minute = $3, store_aggregate = $4 \
                 WHERE pkey = $1"
            ),
            vec![
                Param::BigInt(*pkey),
                Param::Bool(flags.tick),
                Param::Bool(flags.minute),
                Param::Bool(flags.aggregate),
            ],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tsdb_schema::{Origins, Period};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 3, 14, 30, 0).unwrap()
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_ident(r#"a"b"#), r#""a""b""#);
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn tick_table_becomes_hypertable() {
        let stmts = render_schema_command(&SchemaCommand::CreateRawTable {
            schema: SchemaKind::Tick,
            table: AssetTable::raw("crypto", Period::TICK),
        });
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0]
            .sql
            .starts_with(r#"CREATE TABLE "tick_data"."crypto_tick_raw" (dt TIMESTAMPTZ"#));
        assert!(stmts[0].sql.contains("price DOUBLE PRECISION"));
        assert_eq!(
            stmts[1].sql,
            r#"SELECT create_hypertable('"tick_data"."crypto_tick_raw"', 'dt')"#
        );
    }

    #[test]
    fn continuous_aggregate_embeds_origin_and_source() {
        let stmts = render_schema_command(&SchemaCommand::CreateAggregate {
            schema: SchemaKind::Minute,
            table: AssetTable::aggregate("us_stock", Period::minutes(5)),
            source: AssetTable::raw("us_stock", Period::minutes(1)),
            origin: ts(),
        });
        let sql = &stmts[0].sql;
        assert!(sql.contains(r#"CREATE MATERIALIZED VIEW "minute_data"."us_stock_5m""#));
        assert!(sql.contains("WITH (timescaledb.continuous)"));
        assert!(sql.contains(
            "time_bucket(INTERVAL '300 seconds', dt, origin => TIMESTAMPTZ '2000-01-03T14:30:00Z')"
        ));
        assert!(sql.contains(r#"FROM "minute_data"."us_stock_1m_raw""#));
        assert!(sql.contains("first(open, dt)"));
        assert!(sql.ends_with("WITH NO DATA"));
        assert!(stmts[0].params.is_empty());
    }

    #[test]
    fn origin_values_are_bound_not_inlined() {
        let o = Origins::new(ts(), ts(), ts());
        let stmts = render_schema_command(&SchemaCommand::InsertOrigin {
            schema: SchemaKind::Minute,
            asset_class: "us_stock".to_string(),
            origins: o,
        });
        assert!(!stmts[0].sql.contains("us_stock"));
        assert!(!stmts[0].sql.contains("ON CONFLICT"));
        assert_eq!(stmts[0].params.len(), 4);
        assert_eq!(stmts[0].params[0], Param::Text("us_stock".to_string()));
    }

    #[test]
    fn merge_modes_differ_only_in_conflict_clause() {
        let ignore = render_security_command(&SecurityCommand::MergeSymbols {
            source: "polygon".to_string(),
            mode: ConflictMode::Ignore,
        });
        let update = render_security_command(&SecurityCommand::MergeSymbols {
            source: "polygon".to_string(),
            mode: ConflictMode::Update,
        });
        assert!(ignore.sql.contains("DO NOTHING"));
        assert!(update.sql.contains("DO UPDATE SET"));
        for s in [&ignore, &update] {
            assert!(s.sql.contains("RETURNING pkey, xmax::TEXT AS conflict_marker"));
            assert_eq!(s.params, vec![Param::Text("polygon".to_string())]);
        }
    }

    #[test]
    fn staging_buffer_is_transaction_scoped() {
        let s = render_security_command(&SecurityCommand::CreateSymbolsBuffer);
        assert!(s.sql.starts_with("CREATE TEMPORARY TABLE"));
        assert!(s.sql.ends_with("ON COMMIT DROP"));

        let copy = render_security_command(&SecurityCommand::CopySymbolsBuffer);
        assert_eq!(
            copy.sql,
            r#"COPY "symbols_buffer" ("symbol", "name", "exchange", "asset_class", "attrs") FROM STDIN WITH (FORMAT csv)"#
        );
    }

    #[test]
    fn command_keys() {
        assert_eq!(
            SecurityCommand::MergeSymbols {
                source: "x".to_string(),
                mode: ConflictMode::Ignore
            }
            .kind(),
            (Operation::Insert, Target::SymbolsBuffer)
        );
        assert_eq!(
            CatalogQuery::ListSchemas.kind(),
            (Operation::Select, Target::Schema)
        );
    }
}
