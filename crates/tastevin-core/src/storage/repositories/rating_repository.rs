use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, TastevinError};
use crate::models::Rating;

use super::{timestamp_at, uuid_at, Repository};

const RATING_COLUMNS: &str = "id, wine_id, invitee_id, score, notes, created_at, updated_at";

pub trait RatingRepository: Repository<Entity = Rating, Id = Uuid> {
    /// One rating per (wine, invitee): a second submission replaces score and notes.
    fn upsert_by_pair(
        &self,
        wine_id: &Uuid,
        invitee_id: &Uuid,
        score: u8,
        notes: Option<&str>,
    ) -> Result<Rating>;
    fn list_by_wine(&self, wine_id: &Uuid) -> Result<Vec<Rating>>;
}

pub struct SqliteRatingRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRatingRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_rating(row: &rusqlite::Row) -> rusqlite::Result<Rating> {
        Ok(Rating {
            id: uuid_at(row, 0)?,
            wine_id: uuid_at(row, 1)?,
            invitee_id: uuid_at(row, 2)?,
            score: row.get(3)?,
            notes: row.get(4)?,
            created_at: timestamp_at(row, 5)?,
            updated_at: timestamp_at(row, 6)?,
        })
    }
}

impl<'a> Repository for SqliteRatingRepository<'a> {
    type Entity = Rating;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let sql = format!("SELECT {RATING_COLUMNS} FROM ratings WHERE id = ?1");
        let rating = self
            .conn
            .query_row(&sql, params![id.to_string()], Self::row_to_rating)
            .optional()?;
        Ok(rating)
    }

    fn save(&self, rating: &Self::Entity) -> Result<()> {
        self.upsert_by_pair(
            &rating.wine_id,
            &rating.invitee_id,
            rating.score,
            rating.notes.as_deref(),
        )?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM ratings WHERE id = ?1", params![id.to_string()])?;
        Ok(deleted > 0)
    }
}

impl<'a> RatingRepository for SqliteRatingRepository<'a> {
    fn upsert_by_pair(
        &self,
        wine_id: &Uuid,
        invitee_id: &Uuid,
        score: u8,
        notes: Option<&str>,
    ) -> Result<Rating> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO ratings (id, wine_id, invitee_id, score, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(wine_id, invitee_id) DO UPDATE SET
                score = excluded.score,
                notes = excluded.notes,
                updated_at = excluded.updated_at",
            params![
                Uuid::now_v7().to_string(),
                wine_id.to_string(),
                invitee_id.to_string(),
                score,
                notes,
                now,
            ],
        )?;

        let sql = format!("SELECT {RATING_COLUMNS} FROM ratings WHERE wine_id = ?1 AND invitee_id = ?2");
        self.conn
            .query_row(
                &sql,
                params![wine_id.to_string(), invitee_id.to_string()],
                Self::row_to_rating,
            )
            .optional()?
            .ok_or_else(|| TastevinError::WineNotFound(wine_id.to_string()))
    }

    fn list_by_wine(&self, wine_id: &Uuid) -> Result<Vec<Rating>> {
        let sql = format!("SELECT {RATING_COLUMNS} FROM ratings WHERE wine_id = ?1 ORDER BY created_at");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![wine_id.to_string()], Self::row_to_rating)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}
