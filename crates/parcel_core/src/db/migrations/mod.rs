//! Parcel schema migrations.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Report whether a connection's `parcel` schema matches this build.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_init.sql"),
}];

/// Where a connection's schema stands relative to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// All known migrations are applied.
    Current,
    /// Older schema; `apply_migrations` will upgrade it.
    Behind { db_version: u32 },
    /// Written by a newer build; must not be touched.
    Ahead { db_version: u32 },
}

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Compares `PRAGMA user_version` against the latest known migration.
pub fn schema_state(conn: &Connection) -> DbResult<SchemaState> {
    let db_version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let latest = latest_version();
    Ok(if db_version == latest {
        SchemaState::Current
    } else if db_version < latest {
        SchemaState::Behind { db_version }
    } else {
        SchemaState::Ahead { db_version }
    })
}

/// Brings the parcel schema up to date in a single transaction.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = match schema_state(conn)? {
        SchemaState::Current => return Ok(()),
        SchemaState::Ahead { db_version } => {
            return Err(DbError::UnsupportedSchemaVersion {
                db_version,
                latest_supported: latest_version(),
            })
        }
        SchemaState::Behind { db_version } => db_version,
    };

    let tx = conn.transaction()?;
    for migration in MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from_version)
    {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        from_version,
        latest_version()
    );
    Ok(())
}
