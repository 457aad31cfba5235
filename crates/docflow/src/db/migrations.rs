//! Versioned schema migrations.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration
//! runs in its own transaction together with its bookkeeping row, so a
//! failure leaves the schema at the previous version.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    /// `(table, column)` whose presence means the migration is already in
    /// effect, for `ADD COLUMN` steps that SQLite cannot make conditional.
    unless_column: Option<(&'static str, &'static str)>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_file_records_table",
        sql: include_str!("sql/001_create_file_records.sql"),
        unless_column: None,
    },
    Migration {
        version: 2,
        description: "create_processing_results_table",
        sql: include_str!("sql/002_create_processing_results.sql"),
        unless_column: None,
    },
    Migration {
        version: 3,
        description: "index_batch_job_id",
        sql: include_str!("sql/003_index_batch_job_id.sql"),
        unless_column: None,
    },
    Migration {
        version: 4,
        description: "add_processing_duration_to_file_records",
        sql: include_str!("sql/004_add_processing_duration.sql"),
        unless_column: Some(("file_records", "processing_duration_ms")),
    },
];

/// Newest schema version this build knows how to produce.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Highest applied version, 0 for a fresh database.
pub fn applied_version(conn: &Connection) -> Result<u32, DatabaseError> {
    ensure_ledger(conn)?;
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    let current = applied_version(conn)?;
    let supported = latest_version();
    if current > supported {
        return Err(DatabaseError::SchemaTooNew {
            found: current,
            supported,
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration)?;
    }
    Ok(())
}

fn ensure_ledger(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );",
    )?;
    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let failed = |e: rusqlite::Error| DatabaseError::Migration {
        version: migration.version,
        description: migration.description,
        reason: e.to_string(),
    };

    let already_in_effect = match migration.unless_column {
        Some((table, column)) => column_exists(conn, table, column)?,
        None => false,
    };

    let tx = conn.unchecked_transaction().map_err(failed)?;
    if already_in_effect {
        log::info!(
            "Recording migration v{} ({}) without running it: column already present",
            migration.version,
            migration.description
        );
    } else {
        log::info!(
            "Applying migration v{}: {}",
            migration.version,
            migration.description
        );
        tx.execute_batch(migration.sql).map_err(failed)?;
    }
    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        params![migration.version, migration.description],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    // pragma_table_info takes the table name as a bound parameter.
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}
