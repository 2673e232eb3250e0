//! Schema versioning for the SQLite backend.
//!
//! The initial schema ([`INIT_SCHEMA`]) is version 1. Later changes are
//! appended to [`MIGRATIONS`] with increasing version numbers and applied
//! in order, inside one transaction, whenever a database is opened.
//!
//! # Adding a migration
//!
//! ```text
//! Migration {
//!     version: 4,
//!     up: "ALTER TABLE tasks ADD COLUMN archived BOOLEAN NOT NULL DEFAULT 0;",
//! },
//! ```
//!
//! Prefer `IF NOT EXISTS` so a half-upgraded file can be reopened.

use super::StorageError;
use rusqlite::{Connection, Transaction};

pub const INIT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_sync TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    color TEXT NOT NULL,
    icon TEXT NOT NULL,
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    completed BOOLEAN NOT NULL DEFAULT 0,
    priority TEXT NOT NULL,
    due_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    category TEXT NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    tags TEXT NOT NULL,
    reminder BOOLEAN NOT NULL DEFAULT 0,
    reminder_date TEXT,
    estimated_time REAL,
    actual_time REAL,
    subtasks TEXT NOT NULL,
    position INTEGER NOT NULL
);
"#;

/// A forward-only schema change.
#[derive(Debug)]
pub struct Migration {
    pub version: i32,
    pub up: &'static str,
}

/// Applied in order after [`INIT_SCHEMA`].
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 2,
        up: r#"
            CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date);
            CREATE INDEX IF NOT EXISTS idx_tasks_category ON tasks(category);
        "#,
    },
    // Category ids come from imported documents and need not be unique;
    // rows are keyed by position instead.
    Migration {
        version: 3,
        up: r#"
            CREATE TABLE categories_by_position (
                position INTEGER PRIMARY KEY,
                id TEXT NOT NULL,
                name TEXT NOT NULL,
                color TEXT NOT NULL,
                icon TEXT NOT NULL
            );
            INSERT INTO categories_by_position (position, id, name, color, icon)
                SELECT position, id, name, color, icon FROM categories;
            DROP TABLE categories;
            ALTER TABLE categories_by_position RENAME TO categories;
        "#,
    },
];

fn schema_error(context: String) -> impl FnOnce(rusqlite::Error) -> StorageError {
    move |e| StorageError::Storage(format!("{context}: {e}"))
}

/// Creates the version-1 schema if needed and records its version.
pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(INIT_SCHEMA)
        .map_err(schema_error("Failed to create schema".to_string()))?;
    conn.execute(
        "INSERT INTO schema_version (version)
         SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM schema_version)",
        [],
    )?;
    Ok(())
}

pub fn get_current_version(conn: &Connection) -> Result<i32, StorageError> {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .map_err(schema_error("Failed to read schema version".to_string()))
}

/// Brings the database up to the newest version in [`MIGRATIONS`].
///
/// Pending migrations share one transaction; a failure leaves the
/// database at its previous version.
pub fn apply_migrations(conn: &mut Connection) -> Result<(), StorageError> {
    apply_pending(conn, MIGRATIONS)
}

fn apply_pending(conn: &mut Connection, migrations: &[Migration]) -> Result<(), StorageError> {
    let current = get_current_version(conn)?;
    let pending: Vec<&Migration> = migrations.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in pending {
        log::info!("Applying schema migration {}", migration.version);
        apply_migration(&tx, migration)?;
    }
    tx.commit()?;
    Ok(())
}

fn apply_migration(tx: &Transaction, migration: &Migration) -> Result<(), StorageError> {
    tx.execute_batch(migration.up)
        .map_err(schema_error(format!("Migration {} failed", migration.version)))?;
    tx.execute("UPDATE schema_version SET version = ?1", [migration.version])
        .map_err(schema_error(format!("Could not record schema version {}", migration.version)))?;
    Ok(())
}
