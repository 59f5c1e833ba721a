use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, TastevinError};
use crate::models::WineContribution;

use super::{parsed_at, timestamp_at, uuid_at, Repository};

const WINE_COLUMNS: &str = "id, event_id, invitee_id, wine_type, producer, varietal, region, \
                            vintage, price, notes, created_at, updated_at";

pub trait WineRepository: Repository<Entity = WineContribution, Id = Uuid> {
    /// Every wine of `event_id`, minus `exclude` when given.
    fn find_all_by_event(
        &self,
        event_id: &Uuid,
        exclude: Option<&Uuid>,
    ) -> Result<Vec<WineContribution>>;
    fn create(&self, wine: &WineContribution) -> Result<()>;
    /// Overwrite the attributes of an existing wine; fails with `WineNotFound` if it is gone.
    fn update(&self, wine: &WineContribution) -> Result<()>;
}

pub struct SqliteWineRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteWineRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn row_to_wine(row: &rusqlite::Row) -> rusqlite::Result<WineContribution> {
        Ok(WineContribution {
            id: uuid_at(row, 0)?,
            event_id: uuid_at(row, 1)?,
            invitee_id: uuid_at(row, 2)?,
            wine_type: parsed_at(row, 3)?,
            producer: row.get(4)?,
            varietal: row.get(5)?,
            region: row.get(6)?,
            vintage: row.get(7)?,
            price: row.get(8)?,
            notes: row.get(9)?,
            created_at: timestamp_at(row, 10)?,
            updated_at: timestamp_at(row, 11)?,
        })
    }
}

impl<'a> Repository for SqliteWineRepository<'a> {
    type Entity = WineContribution;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let sql = format!("SELECT {WINE_COLUMNS} FROM wine_contributions WHERE id = ?1");
        let wine = self
            .conn
            .query_row(&sql, params![id.to_string()], Self::row_to_wine)
            .optional()?;
        Ok(wine)
    }

    fn save(&self, wine: &Self::Entity) -> Result<()> {
        if self.find_by_id(&wine.id)?.is_some() {
            self.update(wine)
        } else {
            self.create(wine)
        }
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM wine_contributions WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(deleted > 0)
    }
}

impl<'a> WineRepository for SqliteWineRepository<'a> {
    fn find_all_by_event(
        &self,
        event_id: &Uuid,
        exclude: Option<&Uuid>,
    ) -> Result<Vec<WineContribution>> {
        let sql = format!(
            "SELECT {WINE_COLUMNS} FROM wine_contributions
             WHERE event_id = ?1 AND (?2 IS NULL OR id != ?2)
             ORDER BY created_at, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![event_id.to_string(), exclude.map(|id| id.to_string())],
            Self::row_to_wine,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn create(&self, wine: &WineContribution) -> Result<()> {
        self.conn.execute(
            "INSERT INTO wine_contributions (id, event_id, invitee_id, wine_type, producer, varietal,
                                             region, vintage, price, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                wine.id.to_string(),
                wine.event_id.to_string(),
                wine.invitee_id.to_string(),
                wine.wine_type.as_str(),
                wine.producer,
                wine.varietal,
                wine.region,
                wine.vintage,
                wine.price,
                wine.notes,
                wine.created_at.to_rfc3339(),
                wine.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update(&self, wine: &WineContribution) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE wine_contributions
             SET wine_type = ?1, producer = ?2, varietal = ?3, region = ?4,
                 vintage = ?5, price = ?6, notes = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                wine.wine_type.as_str(),
                wine.producer,
                wine.varietal,
                wine.region,
                wine.vintage,
                wine.price,
                wine.notes,
                wine.updated_at.to_rfc3339(),
                wine.id.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(TastevinError::WineNotFound(wine.id.to_string()));
        }
        Ok(())
    }
}
