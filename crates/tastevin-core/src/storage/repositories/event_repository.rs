use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Event, TimeOption};

use super::{opt_timestamp_at, opt_uuid_at, timestamp_at, uuid_at, Repository};

const EVENT_COLUMNS: &str =
    "id, title, description, created_by, finalized, finalized_at, selected_time_option_id, created_at";

pub trait EventRepository: Repository<Entity = Event, Id = Uuid> {
    /// Newest first, optionally restricted to one host.
    fn list(&self, created_by: Option<&str>) -> Result<Vec<Event>>;
    fn finalize(&self, id: &Uuid, time_option_id: &Uuid, at: DateTime<Utc>) -> Result<bool>;
    fn save_time_option(&self, option: &TimeOption) -> Result<()>;
    fn find_time_option(&self, id: &Uuid) -> Result<Option<TimeOption>>;
    fn list_time_options(&self, event_id: &Uuid) -> Result<Vec<TimeOption>>;
}

pub struct SqliteEventRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteEventRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
        Ok(Event {
            id: uuid_at(row, 0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            created_by: row.get(3)?,
            finalized: row.get(4)?,
            finalized_at: opt_timestamp_at(row, 5)?,
            selected_time_option_id: opt_uuid_at(row, 6)?,
            created_at: timestamp_at(row, 7)?,
        })
    }

    fn row_to_time_option(row: &rusqlite::Row) -> rusqlite::Result<TimeOption> {
        Ok(TimeOption {
            id: uuid_at(row, 0)?,
            event_id: uuid_at(row, 1)?,
            start_time: timestamp_at(row, 2)?,
            end_time: timestamp_at(row, 3)?,
        })
    }
}

impl<'a> Repository for SqliteEventRepository<'a> {
    type Entity = Event;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
        let event = self
            .conn
            .query_row(&sql, params![id.to_string()], Self::row_to_event)
            .optional()?;
        Ok(event)
    }

    fn save(&self, event: &Self::Entity) -> Result<()> {
        self.conn.execute(
            "INSERT INTO events (id, title, description, created_by, finalized, finalized_at,
                                 selected_time_option_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                finalized = excluded.finalized,
                finalized_at = excluded.finalized_at,
                selected_time_option_id = excluded.selected_time_option_id",
            params![
                event.id.to_string(),
                event.title,
                event.description,
                event.created_by,
                event.finalized,
                event.finalized_at.map(|t| t.to_rfc3339()),
                event.selected_time_option_id.map(|id| id.to_string()),
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1", params![id.to_string()])?;
        Ok(deleted > 0)
    }
}

impl<'a> EventRepository for SqliteEventRepository<'a> {
    fn list(&self, created_by: Option<&str>) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE (?1 IS NULL OR created_by = ?1)
             ORDER BY created_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![created_by], Self::row_to_event)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn finalize(&self, id: &Uuid, time_option_id: &Uuid, at: DateTime<Utc>) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE events SET finalized = 1, finalized_at = ?1, selected_time_option_id = ?2
             WHERE id = ?3",
            params![at.to_rfc3339(), time_option_id.to_string(), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    fn save_time_option(&self, option: &TimeOption) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO time_options (id, event_id, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                option.id.to_string(),
                option.event_id.to_string(),
                option.start_time.to_rfc3339(),
                option.end_time.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn find_time_option(&self, id: &Uuid) -> Result<Option<TimeOption>> {
        let option = self
            .conn
            .query_row(
                "SELECT id, event_id, start_time, end_time FROM time_options WHERE id = ?1",
                params![id.to_string()],
                Self::row_to_time_option,
            )
            .optional()?;
        Ok(option)
    }

    fn list_time_options(&self, event_id: &Uuid) -> Result<Vec<TimeOption>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_id, start_time, end_time FROM time_options
             WHERE event_id = ?1 ORDER BY start_time",
        )?;
        let rows = stmt.query_map(params![event_id.to_string()], Self::row_to_time_option)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}
