use rusqlite::{Connection, Result};
use std::collections::HashMap;

/// Current database schema version
const CURRENT_VERSION: u32 = 2;

type Migration = fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>;

/// Migration system for managing database schema versions
pub struct MigrationManager;

impl MigrationManager {
    /// Initialize the database with the current schema
    /// This creates the schema_version table and applies all migrations
    pub fn initialize(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version = Self::get_version(conn)?;

        for version in (current_version + 1)..=CURRENT_VERSION {
            Self::apply_migration(conn, version)?;
        }

        Ok(())
    }

    /// Apply a specific migration by version number
    fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
        let migrations = get_migrations();
        if let Some(migration) = migrations.get(&version) {
            let tx = conn.unchecked_transaction()?;
            migration(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            log::debug!("Applied schema migration v{}", version);
            Ok(())
        } else {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some(format!("No migration found for version {}", version)),
            ))
        }
    }

    /// Get the current schema version
    pub fn get_version(conn: &Connection) -> Result<u32> {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

/// Get all migrations indexed by version
fn get_migrations() -> HashMap<u32, Migration> {
    let mut migrations: HashMap<u32, Migration> = HashMap::new();
    migrations.insert(1, migration_v1);
    migrations.insert(2, migration_v2);
    migrations
}

/// Migration v1: trucks, their stage records, and users
fn migration_v1(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE trucks (
            tracking_number TEXT PRIMARY KEY,
            details_json TEXT NULL,
            current_stage INTEGER NOT NULL DEFAULT 0 CHECK(current_stage >= 0),
            finished INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 0,
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;
    // Note: details_json stores a flat JSON object of string values

    tx.execute(
        "CREATE TABLE truck_stages (
            tracking_number TEXT NOT NULL REFERENCES trucks(tracking_number) ON DELETE CASCADE,
            stage_number INTEGER NOT NULL CHECK(stage_number >= 0),
            name TEXT NOT NULL,
            start_ts INTEGER NULL,
            end_ts INTEGER NULL,
            PRIMARY KEY (tracking_number, stage_number)
        )",
        [],
    )?;

    tx.execute(
        "CREATE INDEX idx_trucks_finished ON trucks(finished)",
        [],
    )?;

    tx.execute(
        "CREATE TABLE users (
            identity TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin','operator')),
            created_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE user_checkpoints (
            identity TEXT NOT NULL REFERENCES users(identity) ON DELETE CASCADE,
            checkpoint TEXT NOT NULL,
            PRIMARY KEY (identity, checkpoint)
        )",
        [],
    )?;

    Ok(())
}

/// Migration v2: audit trail of progression events and overrides
fn migration_v2(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE events (
            id INTEGER PRIMARY KEY,
            tracking_number TEXT NOT NULL REFERENCES trucks(tracking_number) ON DELETE CASCADE,
            kind TEXT NOT NULL CHECK(kind IN ('start','end','override')),
            detail TEXT NOT NULL,
            actor TEXT NOT NULL,
            ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_events_tracking_number ON events(tracking_number, ts)",
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();
        MigrationManager::initialize(&conn).unwrap();
        assert_eq!(MigrationManager::get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_schema_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();

        for table in ["trucks", "truck_stages", "users", "user_checkpoints", "events"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_role_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO users (identity, name, role, created_ts) VALUES ('x', 'X', 'guest', 0)",
            [],
        );
        assert!(result.is_err());
    }
}
