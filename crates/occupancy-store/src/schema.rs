//! Database schema.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

/// Get the current schema version.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the initial schema (version 1).
fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        -- Singleton live state; occupancy is derived on every write
        CREATE TABLE IF NOT EXISTS live (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            count_in INTEGER NOT NULL DEFAULT 0 CHECK (count_in >= 0),
            count_out INTEGER NOT NULL DEFAULT 0 CHECK (count_out >= 0),
            occupancy INTEGER NOT NULL DEFAULT 0 CHECK (occupancy >= 0),
            base_in INTEGER NOT NULL DEFAULT 0,
            base_out INTEGER NOT NULL DEFAULT 0,
            last_update TEXT,
            last_reset_date TEXT
        );

        -- Append-only snapshots, timestamps in sensor-local wall time
        CREATE TABLE IF NOT EXISTS counts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            count_in INTEGER NOT NULL DEFAULT 0,
            count_out INTEGER NOT NULL DEFAULT 0,
            occupancy INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_counts_timestamp
            ON counts(timestamp);
        "#,
    )?;

    Ok(())
}
