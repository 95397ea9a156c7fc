use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "tsdb")]
#[command(about = "TimescaleDB timeseries schema + securities CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Timeseries schema reconciliation
    Schema {
        #[command(subcommand)]
        cmd: SchemaCmd,
    },

    /// security.symbols commands
    Symbols {
        #[command(subcommand)]
        cmd: SymbolsCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply embedded SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum SchemaCmd {
    /// Print what `apply` would change. Read-only, never prompts.
    Plan {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Fail instead of warn on config keys nothing reads
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Converge the database onto the config. Destructive steps prompt on the terminal.
    Apply {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Fail instead of warn on config keys nothing reads
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

#[derive(Subcommand)]
enum SymbolsCmd {
    /// Merge a CSV of symbols into security.symbols
    Upsert {
        /// CSV with header: symbol,name,exchange,asset_class[,extra...]
        #[arg(long)]
        csv: PathBuf,

        /// Data provider the symbols came from (e.g. alpaca, polygon)
        #[arg(long)]
        source: String,

        /// update | ignore
        #[arg(long, default_value = "update")]
        on_conflict: String,
    },

    /// Set which timeseries schemas store data for a symbol
    Storage {
        #[arg(long)]
        pkey: i64,

        #[arg(long, default_value_t = false)]
        tick: bool,

        #[arg(long, default_value_t = false)]
        minute: bool,

        #[arg(long, default_value_t = false)]
        aggregate: bool,
    },

    /// List tables a symbol should have data in but does not yet
    Updates {
        #[arg(long)]
        pkey: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = tsdb_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = tsdb_db::status(&pool).await?;
                    println!(
                        "db_ok={} timescaledb={} has_symbols_table={}",
                        s.ok,
                        s.timescaledb.as_deref().unwrap_or("NONE"),
                        s.has_symbols_table
                    );
                }
                DbCmd::Migrate => {
                    tsdb_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = tsdb_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Schema { cmd } => match cmd {
            SchemaCmd::Plan {
                config_paths,
                strict,
            } => commands::schema::schema_plan(config_paths, strict).await?,
            SchemaCmd::Apply {
                config_paths,
                strict,
            } => commands::schema::schema_apply(config_paths, strict).await?,
        },

        Commands::Symbols { cmd } => match cmd {
            SymbolsCmd::Upsert {
                csv,
                source,
                on_conflict,
            } => commands::symbols::symbols_upsert(csv, source, on_conflict).await?,
            SymbolsCmd::Storage {
                pkey,
                tick,
                minute,
                aggregate,
            } => commands::symbols::symbols_storage(pkey, tick, minute, aggregate).await?,
            SymbolsCmd::Updates { pkey } => commands::symbols::symbols_updates(pkey).await?,
        },
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
