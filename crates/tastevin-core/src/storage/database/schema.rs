use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 1;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id                      TEXT PRIMARY KEY,
            title                   TEXT NOT NULL,
            description             TEXT,
            created_by              TEXT NOT NULL,
            finalized               INTEGER NOT NULL DEFAULT 0,
            finalized_at            TEXT,
            selected_time_option_id TEXT,
            created_at              TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS time_options (
            id         TEXT PRIMARY KEY,
            event_id   TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            start_time TEXT NOT NULL,
            end_time   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS invitees (
            id           TEXT PRIMARY KEY,
            event_id     TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            name         TEXT NOT NULL,
            email        TEXT,
            token        TEXT UNIQUE NOT NULL,
            responded_at TEXT,
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS availability_responses (
            invitee_id     TEXT NOT NULL REFERENCES invitees(id) ON DELETE CASCADE,
            time_option_id TEXT NOT NULL REFERENCES time_options(id) ON DELETE CASCADE,
            available      INTEGER NOT NULL,
            PRIMARY KEY (invitee_id, time_option_id)
        );

        CREATE TABLE IF NOT EXISTS wine_contributions (
            id         TEXT PRIMARY KEY,
            event_id   TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            invitee_id TEXT NOT NULL REFERENCES invitees(id) ON DELETE CASCADE,
            wine_type  TEXT NOT NULL,
            producer   TEXT,
            varietal   TEXT,
            region     TEXT,
            vintage    INTEGER,
            price      REAL,
            notes      TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS duplicate_flags (
            id                TEXT PRIMARY KEY,
            original_wine_id  TEXT NOT NULL REFERENCES wine_contributions(id) ON DELETE CASCADE,
            duplicate_wine_id TEXT NOT NULL REFERENCES wine_contributions(id) ON DELETE CASCADE,
            confidence        TEXT NOT NULL CHECK(confidence IN ('high', 'medium', 'low')),
            flagged_by        TEXT NOT NULL CHECK(flagged_by IN ('system', 'human')) DEFAULT 'system',
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL,
            UNIQUE (original_wine_id, duplicate_wine_id),
            CHECK (original_wine_id != duplicate_wine_id)
        );

        CREATE TABLE IF NOT EXISTS ratings (
            id         TEXT PRIMARY KEY,
            wine_id    TEXT NOT NULL REFERENCES wine_contributions(id) ON DELETE CASCADE,
            invitee_id TEXT NOT NULL REFERENCES invitees(id) ON DELETE CASCADE,
            score      INTEGER NOT NULL CHECK(score BETWEEN 0 AND 100),
            notes      TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (wine_id, invitee_id)
        );
        ",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_events_created_by     ON events(created_by);
        CREATE INDEX IF NOT EXISTS idx_time_options_event    ON time_options(event_id);
        CREATE INDEX IF NOT EXISTS idx_invitees_event        ON invitees(event_id);
        CREATE INDEX IF NOT EXISTS idx_wines_event           ON wine_contributions(event_id);
        CREATE INDEX IF NOT EXISTS idx_flags_original        ON duplicate_flags(original_wine_id);
        CREATE INDEX IF NOT EXISTS idx_flags_duplicate       ON duplicate_flags(duplicate_wine_id);
        CREATE INDEX IF NOT EXISTS idx_ratings_wine          ON ratings(wine_id);
        ",
    )?;
    Ok(())
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    create_tables(conn)?;
    create_indexes(conn)?;
    Ok(())
}
