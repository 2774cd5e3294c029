//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, labeller_core::now_millis()],
            )?;
            tracing::info!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE users (
            user_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_type TEXT NOT NULL,           -- POSITIVE | NEGATIVE
            created_at INTEGER NOT NULL
        );

        -- Append-only access log
        CREATE TABLE visits (
            visit_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(user_id),
            client_address TEXT,
            timestamp INTEGER NOT NULL
        );

        -- Pre-seeded, read-only to the service
        CREATE TABLE contexts (
            context_id INTEGER PRIMARY KEY,
            content TEXT NOT NULL
        );

        CREATE TABLE labels (
            label_id INTEGER PRIMARY KEY AUTOINCREMENT,
            sequence_index INTEGER NOT NULL,
            user_id INTEGER NOT NULL REFERENCES users(user_id),
            visit_id INTEGER NOT NULL REFERENCES visits(visit_id),
            intent_label TEXT NOT NULL,
            abuse_label TEXT NOT NULL,
            created_at INTEGER NOT NULL,

            UNIQUE(user_id, sequence_index)
        );

        CREATE INDEX idx_visits_user ON visits(user_id, visit_id);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in ["users", "visits", "contexts", "labels", "schema_migrations"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_unreadable_version_is_an_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_migrations (version TEXT PRIMARY KEY, applied_at INTEGER NOT NULL);
             INSERT INTO schema_migrations VALUES ('corrupt', 0);",
        )
        .unwrap();

        assert!(migrate(&mut conn).is_err());

        let users: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='users'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(users, 0);
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_label_positions_are_unique() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (user_type, created_at) VALUES ('POSITIVE', 0);
             INSERT INTO visits (user_id, client_address, timestamp) VALUES (1, NULL, 0);
             INSERT INTO labels (sequence_index, user_id, visit_id, intent_label, abuse_label, created_at)
                 VALUES (0, 1, 1, 'POSITIVE', 'NEGATIVE', 0);",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO labels (sequence_index, user_id, visit_id, intent_label, abuse_label, created_at)
             VALUES (0, 1, 1, 'NEGATIVE', 'NEGATIVE', 0)",
            [],
        );
        assert!(dup.is_err());
    }
}
