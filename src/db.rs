//! Embedded SQLite database: connection, schema creation, and migration
//!
//! Opens a single connection shared by every `*Store` (see §5 of the spec
//! for the concurrency contract — callers serialize access through
//! [`crate::store::SharedConnection`]). Schema creation is idempotent
//! (`CREATE TABLE IF NOT EXISTS`); the `verdicts` table additionally gets
//! column-introspection-based additive migrations so a database predating
//! `from`/`subject`/`receivedDate`/`imapUID` still opens cleanly.

use std::time::Duration;

use rusqlite::Connection;

use crate::errors::AppResult;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the database at `path` (or `:memory:` for tests), creating its
/// parent directory if needed, applying the busy timeout, creating tables,
/// and running additive migrations.
pub fn open(path: &str) -> AppResult<Connection> {
    if path != ":memory:"
        && let Some(parent) = std::path::Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = if path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    conn.busy_timeout(BUSY_TIMEOUT)?;

    create_tables(&conn)?;
    migrate_verdicts(&conn)?;

    Ok(conn)
}

fn create_tables(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS verdicts (
            messageId    TEXT PRIMARY KEY,
            score        INTEGER NOT NULL,
            reasons_json TEXT NOT NULL,
            timestamp    TEXT NOT NULL,
            actionTaken  TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_verdicts_timestamp ON verdicts(timestamp);

        CREATE TABLE IF NOT EXISTS blacklist (
            domain      TEXT PRIMARY KEY,
            source      TEXT NOT NULL,
            lastUpdated TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS allowlist (
            domain       TEXT PRIMARY KEY,
            addedByUser  INTEGER NOT NULL,
            timestamp    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS trusted_link_domains (
            domain    TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS safeonweb_campaigns (
            brand         TEXT NOT NULL,
            publishedDate TEXT NOT NULL,
            fetchedDate   TEXT NOT NULL,
            articleTitle  TEXT NOT NULL,
            UNIQUE(brand, articleTitle)
        );
        "#,
    )?;
    Ok(())
}

/// Additive-only migration: introspect the `verdicts` table's columns via
/// `PRAGMA table_info` and `ALTER TABLE ... ADD COLUMN` any of
/// `from`/`subject`/`receivedDate`/`imapUID` that a pre-existing database
/// is missing, with explicit defaults for existing rows.
fn migrate_verdicts(conn: &Connection) -> AppResult<()> {
    let existing: Vec<String> = {
        let mut stmt = conn.prepare("PRAGMA table_info(verdicts)")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
        rows.collect::<Result<_, _>>()?
    };

    let additive_columns: &[(&str, &str)] = &[
        ("from", "TEXT NOT NULL DEFAULT ''"),
        ("subject", "TEXT"),
        ("receivedDate", "TEXT NOT NULL DEFAULT ''"),
        ("imapUID", "INTEGER"),
    ];

    for (name, ddl) in additive_columns {
        if !existing.iter().any(|c| c == name) {
            conn.execute(&format!("ALTER TABLE verdicts ADD COLUMN \"{name}\" {ddl}"), [])?;
        }
    }

    Ok(())
}
