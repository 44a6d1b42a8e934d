//! Schema migrations, tracked through `PRAGMA user_version`.

use rusqlite::Connection;

use crate::OpenError;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_init.sql"),
}];

/// The newest schema version this build knows.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Apply every pending migration in one transaction.
pub fn apply_migrations(conn: &mut Connection) -> Result<(), OpenError> {
    let current = current_user_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(OpenError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    tracing::debug!(from = current, to = latest, "applied schema migrations");
    Ok(())
}

fn current_user_version(conn: &Connection) -> Result<u32, OpenError> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}
