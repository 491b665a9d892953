//! Versioned schema migrations for the local history database.
//!
//! Applied versions are recorded in `_migrations`. Each pending version runs in
//! its own transaction together with its bookkeeping row.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_document_processing_history",
        sql: include_str!("sql/001_create_processing_history.sql"),
    },
    Migration {
        version: 2,
        description: "index_history_by_user",
        sql: include_str!("sql/002_index_history_by_user.sql"),
    },
];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Highest applied version, or 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}

pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let found = current_version(conn)?;
    if found > latest_version() {
        return Err(DatabaseError::SchemaTooNew {
            found,
            supported: latest_version(),
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > found) {
        log::info!(
            "Applying history schema v{} ({})",
            migration.version,
            migration.description
        );
        apply(conn, migration).map_err(|source| DatabaseError::Migration {
            version: migration.version,
            description: migration.description,
            source,
        })?;
    }

    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.description],
    )?;
    tx.commit()
}
