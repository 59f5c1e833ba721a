//! Versioned schema upgrades for the tasting database.
//!
//! Each step is applied inside its own transaction and recorded in
//! `schema_migrations`, so a database opened by an older build picks up
//! only the steps it is missing.

mod v1_initial;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

pub trait Migration {
    fn version(&self) -> u32;
    fn description(&self) -> &'static str;
    fn up(&self, conn: &Connection) -> Result<()>;
}

/// Every known step, oldest first.
fn all_migrations() -> Vec<Box<dyn Migration>> {
    vec![Box::new(v1_initial::V1Initial)]
}

fn has_version_table(conn: &Connection) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
            [],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Bring the schema up to date. Safe to call on every open.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let applied = get_applied_versions(conn)?;

    for migration in all_migrations() {
        let version = migration.version();
        if applied.contains(&version) {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        migration.up(&tx)?;
        tx.execute(
            "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        tracing::debug!(version, description = migration.description(), "tasting schema migrated");
    }

    Ok(())
}

/// Versions recorded in `schema_migrations`, ascending. Empty for a fresh file.
pub fn get_applied_versions(conn: &Connection) -> Result<Vec<u32>> {
    if !has_version_table(conn)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<u32>, _>>()?;
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::SCHEMA_VERSION;

    #[test]
    fn test_migrations_run_once() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let versions = get_applied_versions(&conn).unwrap();
        assert_eq!(versions, vec![SCHEMA_VERSION]);
    }

    #[test]
    fn test_fresh_connection_has_no_versions() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!has_version_table(&conn).unwrap());
        assert!(get_applied_versions(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_initial_step_creates_flag_and_rating_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["wine_contributions", "duplicate_flags", "ratings"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "{table} missing");
        }
    }
}
