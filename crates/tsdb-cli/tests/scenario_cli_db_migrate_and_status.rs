//! Scenario: CLI DB Migrate And Status
//!
//! `tsdb db migrate` is repeatable and `tsdb db status` reports the symbols
//! table afterwards.
//!
//! DB-backed test, skipped if TSDB_DATABASE_URL is not set.

use predicates::prelude::*;

#[allow(deprecated)]
#[test]
fn cli_db_migrate_then_status() -> anyhow::Result<()> {
    let url = match std::env::var("TSDB_DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: TSDB_DATABASE_URL not set");
            return Ok(());
        }
    };

    for _ in 0..2 {
        let mut cmd = assert_cmd::Command::cargo_bin("tsdb")?;
        cmd.env("TSDB_DATABASE_URL", &url).args(["db", "migrate"]);
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("migrations_applied=true"));
    }

    let mut cmd = assert_cmd::Command::cargo_bin("tsdb")?;
    cmd.env("TSDB_DATABASE_URL", &url).args(["db", "status"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("db_ok=true"))
        .stdout(predicate::str::contains("has_symbols_table=true"));

    Ok(())
}
