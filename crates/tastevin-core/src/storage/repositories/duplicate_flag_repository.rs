use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, TastevinError};
use crate::models::{Confidence, DuplicateFlag, FlaggedBy};

use super::{parsed_at, timestamp_at, uuid_at, Repository};

const FLAG_COLUMNS: &str =
    "id, original_wine_id, duplicate_wine_id, confidence, flagged_by, created_at, updated_at";

/// Directed duplicate edges between wines of one event.
pub trait DuplicateFlagRepository: Repository<Entity = DuplicateFlag, Id = Uuid> {
    /// Insert the `(original, duplicate)` edge, or refresh only its confidence
    /// when it already exists. Both wines must exist and share an event.
    fn upsert_by_pair(
        &self,
        original: &Uuid,
        duplicate: &Uuid,
        confidence: Confidence,
        flagged_by: FlaggedBy,
    ) -> Result<DuplicateFlag>;
    fn find_by_pair(&self, original: &Uuid, duplicate: &Uuid) -> Result<Option<DuplicateFlag>>;
    /// Remove every edge touching `wine_id` on either side; returns how many went.
    fn delete_all_for_wine(&self, wine_id: &Uuid) -> Result<usize>;
    fn list_as_original(&self, wine_id: &Uuid) -> Result<Vec<DuplicateFlag>>;
    fn list_as_duplicate(&self, wine_id: &Uuid) -> Result<Vec<DuplicateFlag>>;
    fn list_by_event(&self, event_id: &Uuid) -> Result<Vec<DuplicateFlag>>;
}

pub struct SqliteDuplicateFlagRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteDuplicateFlagRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_flag(row: &rusqlite::Row) -> rusqlite::Result<DuplicateFlag> {
        Ok(DuplicateFlag {
            id: uuid_at(row, 0)?,
            original_wine_id: uuid_at(row, 1)?,
            duplicate_wine_id: uuid_at(row, 2)?,
            confidence: parsed_at(row, 3)?,
            flagged_by: parsed_at(row, 4)?,
            created_at: timestamp_at(row, 5)?,
            updated_at: timestamp_at(row, 6)?,
        })
    }

    fn event_of(&self, wine_id: &Uuid) -> Result<Uuid> {
        let event_id: Option<String> = self
            .conn
            .query_row(
                "SELECT event_id FROM wine_contributions WHERE id = ?1",
                params![wine_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let event_id = event_id.ok_or_else(|| TastevinError::WineNotFound(wine_id.to_string()))?;
        Uuid::parse_str(&event_id).map_err(|_| TastevinError::WineNotFound(wine_id.to_string()))
    }

    fn list_where(&self, column: &str, wine_id: &Uuid) -> Result<Vec<DuplicateFlag>> {
        let sql = format!(
            "SELECT {FLAG_COLUMNS} FROM duplicate_flags WHERE {column} = ?1 ORDER BY created_at, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![wine_id.to_string()], Self::row_to_flag)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}

impl<'a> Repository for SqliteDuplicateFlagRepository<'a> {
    type Entity = DuplicateFlag;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let sql = format!("SELECT {FLAG_COLUMNS} FROM duplicate_flags WHERE id = ?1");
        let flag = self
            .conn
            .query_row(&sql, params![id.to_string()], Self::row_to_flag)
            .optional()?;
        Ok(flag)
    }

    fn save(&self, flag: &Self::Entity) -> Result<()> {
        self.upsert_by_pair(
            &flag.original_wine_id,
            &flag.duplicate_wine_id,
            flag.confidence,
            flag.flagged_by,
        )?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM duplicate_flags WHERE id = ?1", params![id.to_string()])?;
        Ok(deleted > 0)
    }
}

impl<'a> DuplicateFlagRepository for SqliteDuplicateFlagRepository<'a> {
    fn upsert_by_pair(
        &self,
        original: &Uuid,
        duplicate: &Uuid,
        confidence: Confidence,
        flagged_by: FlaggedBy,
    ) -> Result<DuplicateFlag> {
        if original == duplicate {
            return Err(TastevinError::ValidationError(format!(
                "wine {original} cannot be flagged as a duplicate of itself"
            )));
        }
        let original_event = self.event_of(original)?;
        let duplicate_event = self.event_of(duplicate)?;
        if original_event != duplicate_event {
            return Err(TastevinError::ValidationError(format!(
                "wines {original} and {duplicate} belong to different events"
            )));
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO duplicate_flags (id, original_wine_id, duplicate_wine_id, confidence,
                                          flagged_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(original_wine_id, duplicate_wine_id) DO UPDATE SET
                confidence = excluded.confidence,
                updated_at = excluded.updated_at",
            params![
                Uuid::now_v7().to_string(),
                original.to_string(),
                duplicate.to_string(),
                confidence.as_str(),
                flagged_by.as_str(),
                now,
            ],
        )?;

        self.find_by_pair(original, duplicate)?
            .ok_or_else(|| TastevinError::WineNotFound(duplicate.to_string()))
    }

    fn find_by_pair(&self, original: &Uuid, duplicate: &Uuid) -> Result<Option<DuplicateFlag>> {
        let sql = format!(
            "SELECT {FLAG_COLUMNS} FROM duplicate_flags
             WHERE original_wine_id = ?1 AND duplicate_wine_id = ?2"
        );
        let flag = self
            .conn
            .query_row(
                &sql,
                params![original.to_string(), duplicate.to_string()],
                Self::row_to_flag,
            )
            .optional()?;
        Ok(flag)
    }

    fn delete_all_for_wine(&self, wine_id: &Uuid) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM duplicate_flags WHERE original_wine_id = ?1 OR duplicate_wine_id = ?1",
            params![wine_id.to_string()],
        )?;
        Ok(deleted)
    }

    fn list_as_original(&self, wine_id: &Uuid) -> Result<Vec<DuplicateFlag>> {
        self.list_where("original_wine_id", wine_id)
    }

    fn list_as_duplicate(&self, wine_id: &Uuid) -> Result<Vec<DuplicateFlag>> {
        self.list_where("duplicate_wine_id", wine_id)
    }

    fn list_by_event(&self, event_id: &Uuid) -> Result<Vec<DuplicateFlag>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.original_wine_id, f.duplicate_wine_id, f.confidence, f.flagged_by,
                    f.created_at, f.updated_at
             FROM duplicate_flags f
             JOIN wine_contributions w ON w.id = f.original_wine_id
             WHERE w.event_id = ?1
             ORDER BY f.created_at, f.id",
        )?;
        let rows = stmt.query_map(params![event_id.to_string()], Self::row_to_flag)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, Invitee, WineContribution, WineType};
    use crate::storage::database::open_in_memory;
    use crate::storage::repositories::{
        SqliteEventRepository, SqliteInviteeRepository, SqliteWineRepository, WineRepository,
    };

    fn seed_wines(conn: &Connection, count: usize) -> Vec<Uuid> {
        let event = Event::new("Burgundy", "ana");
        SqliteEventRepository::new(conn).save(&event).unwrap();
        let guest = Invitee::new(event.id, "Bo", format!("tok-{}", event.id));
        SqliteInviteeRepository::new(conn).save(&guest).unwrap();

        let wines = SqliteWineRepository::new(conn);
        (0..count)
            .map(|_| {
                let wine = WineContribution::new(event.id, guest.id, WineType::Red);
                wines.create(&wine).unwrap();
                wine.id
            })
            .collect()
    }

    #[test]
    fn test_upsert_updates_confidence_only() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let ids = seed_wines(&conn, 2);
        let repo = SqliteDuplicateFlagRepository::new(&conn);

        let first = repo
            .upsert_by_pair(&ids[0], &ids[1], Confidence::Low, FlaggedBy::Human)
            .unwrap();
        let second = repo
            .upsert_by_pair(&ids[0], &ids[1], Confidence::High, FlaggedBy::System)
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.confidence, Confidence::High);
        assert_eq!(second.flagged_by, FlaggedBy::Human);
        assert_eq!(repo.list_as_original(&ids[0]).unwrap().len(), 1);
    }

    #[test]
    fn test_reverse_pair_is_a_separate_flag() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let ids = seed_wines(&conn, 2);
        let repo = SqliteDuplicateFlagRepository::new(&conn);

        repo.upsert_by_pair(&ids[0], &ids[1], Confidence::High, FlaggedBy::System)
            .unwrap();
        repo.upsert_by_pair(&ids[1], &ids[0], Confidence::Medium, FlaggedBy::System)
            .unwrap();

        assert_eq!(repo.list_as_original(&ids[0]).unwrap().len(), 1);
        assert_eq!(repo.list_as_duplicate(&ids[0]).unwrap().len(), 1);
        assert_eq!(
            repo.find_by_pair(&ids[1], &ids[0]).unwrap().unwrap().confidence,
            Confidence::Medium
        );
    }

    #[test]
    fn test_upsert_missing_wine_is_not_found() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let ids = seed_wines(&conn, 1);
        let repo = SqliteDuplicateFlagRepository::new(&conn);

        let err = repo
            .upsert_by_pair(&ids[0], &Uuid::now_v7(), Confidence::High, FlaggedBy::System)
            .unwrap_err();
        assert!(matches!(err, TastevinError::WineNotFound(_)));
    }

    #[test]
    fn test_upsert_rejects_self_and_cross_event_pairs() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let here = seed_wines(&conn, 1);
        let there = seed_wines(&conn, 1);
        let repo = SqliteDuplicateFlagRepository::new(&conn);

        assert!(matches!(
            repo.upsert_by_pair(&here[0], &here[0], Confidence::High, FlaggedBy::System),
            Err(TastevinError::ValidationError(_))
        ));
        assert!(matches!(
            repo.upsert_by_pair(&here[0], &there[0], Confidence::High, FlaggedBy::System),
            Err(TastevinError::ValidationError(_))
        ));
    }

    #[test]
    fn test_delete_all_for_wine_clears_both_sides() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let ids = seed_wines(&conn, 3);
        let repo = SqliteDuplicateFlagRepository::new(&conn);

        repo.upsert_by_pair(&ids[0], &ids[1], Confidence::High, FlaggedBy::System)
            .unwrap();
        repo.upsert_by_pair(&ids[2], &ids[0], Confidence::Low, FlaggedBy::System)
            .unwrap();
        repo.upsert_by_pair(&ids[1], &ids[2], Confidence::Medium, FlaggedBy::System)
            .unwrap();

        assert_eq!(repo.delete_all_for_wine(&ids[0]).unwrap(), 2);
        assert!(repo.list_as_original(&ids[0]).unwrap().is_empty());
        assert!(repo.list_as_duplicate(&ids[0]).unwrap().is_empty());
        assert!(repo.find_by_pair(&ids[1], &ids[2]).unwrap().is_some());

        assert_eq!(repo.delete_all_for_wine(&ids[0]).unwrap(), 0);
    }

    #[test]
    fn test_flags_cascade_with_wine_delete() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let ids = seed_wines(&conn, 2);
        let repo = SqliteDuplicateFlagRepository::new(&conn);

        repo.upsert_by_pair(&ids[0], &ids[1], Confidence::High, FlaggedBy::System)
            .unwrap();
        SqliteWineRepository::new(&conn).delete(&ids[1]).unwrap();

        assert!(repo.list_as_original(&ids[0]).unwrap().is_empty());
    }
}
