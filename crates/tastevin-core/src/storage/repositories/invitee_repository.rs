use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AvailabilityResponse, Invitee};

use super::{opt_timestamp_at, timestamp_at, uuid_at, Repository};

const INVITEE_COLUMNS: &str = "id, event_id, name, email, token, responded_at, created_at";

pub trait InviteeRepository: Repository<Entity = Invitee, Id = Uuid> {
    fn list_by_event(&self, event_id: &Uuid) -> Result<Vec<Invitee>>;
    fn count_by_event(&self, event_id: &Uuid) -> Result<usize>;
    fn find_by_token(&self, token: &str) -> Result<Option<Invitee>>;
    /// Drop the invitee's earlier votes, store `responses`, stamp `responded_at`.
    fn replace_availability(
        &self,
        invitee_id: &Uuid,
        responses: &[AvailabilityResponse],
        at: DateTime<Utc>,
    ) -> Result<()>;
    fn list_availability(&self, invitee_id: &Uuid) -> Result<Vec<AvailabilityResponse>>;
}

pub struct SqliteInviteeRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteInviteeRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_invitee(row: &rusqlite::Row) -> rusqlite::Result<Invitee> {
        Ok(Invitee {
            id: uuid_at(row, 0)?,
            event_id: uuid_at(row, 1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            token: row.get(4)?,
            responded_at: opt_timestamp_at(row, 5)?,
            created_at: timestamp_at(row, 6)?,
        })
    }
}

impl<'a> Repository for SqliteInviteeRepository<'a> {
    type Entity = Invitee;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let sql = format!("SELECT {INVITEE_COLUMNS} FROM invitees WHERE id = ?1");
        let invitee = self
            .conn
            .query_row(&sql, params![id.to_string()], Self::row_to_invitee)
            .optional()?;
        Ok(invitee)
    }

    fn save(&self, invitee: &Self::Entity) -> Result<()> {
        self.conn.execute(
            "INSERT INTO invitees (id, event_id, name, email, token, responded_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                responded_at = excluded.responded_at",
            params![
                invitee.id.to_string(),
                invitee.event_id.to_string(),
                invitee.name,
                invitee.email,
                invitee.token,
                invitee.responded_at.map(|t| t.to_rfc3339()),
                invitee.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM invitees WHERE id = ?1", params![id.to_string()])?;
        Ok(deleted > 0)
    }
}

impl<'a> InviteeRepository for SqliteInviteeRepository<'a> {
    fn list_by_event(&self, event_id: &Uuid) -> Result<Vec<Invitee>> {
        let sql = format!(
            "SELECT {INVITEE_COLUMNS} FROM invitees WHERE event_id = ?1 ORDER BY created_at, name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![event_id.to_string()], Self::row_to_invitee)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn count_by_event(&self, event_id: &Uuid) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM invitees WHERE event_id = ?1",
            params![event_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn find_by_token(&self, token: &str) -> Result<Option<Invitee>> {
        let sql = format!("SELECT {INVITEE_COLUMNS} FROM invitees WHERE token = ?1");
        let invitee = self
            .conn
            .query_row(&sql, params![token], Self::row_to_invitee)
            .optional()?;
        Ok(invitee)
    }

    fn replace_availability(
        &self,
        invitee_id: &Uuid,
        responses: &[AvailabilityResponse],
        at: DateTime<Utc>,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM availability_responses WHERE invitee_id = ?1",
            params![invitee_id.to_string()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO availability_responses (invitee_id, time_option_id, available)
                 VALUES (?1, ?2, ?3)",
            )?;
            for response in responses {
                stmt.execute(params![
                    invitee_id.to_string(),
                    response.time_option_id.to_string(),
                    response.available,
                ])?;
            }
        }
        tx.execute(
            "UPDATE invitees SET responded_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), invitee_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn list_availability(&self, invitee_id: &Uuid) -> Result<Vec<AvailabilityResponse>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.time_option_id, a.available
             FROM availability_responses a
             JOIN time_options t ON t.id = a.time_option_id
             WHERE a.invitee_id = ?1
             ORDER BY t.start_time",
        )?;
        let rows = stmt.query_map(params![invitee_id.to_string()], |row| {
            Ok(AvailabilityResponse {
                time_option_id: uuid_at(row, 0)?,
                available: row.get(1)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}
