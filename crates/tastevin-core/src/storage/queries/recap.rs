use std::cmp::Ordering;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::models::RecapEntry;
use crate::storage::repositories::SqliteWineRepository;

/// Post-event ranking of every wine by average guest score.
pub struct EventRecapQuery<'a> {
    conn: &'a Connection,
}

impl<'a> EventRecapQuery<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Highest average first; unrated wines trail in contribution order.
    pub fn ranked(&self, event_id: &Uuid) -> Result<Vec<RecapEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT w.id, w.event_id, w.invitee_id, w.wine_type, w.producer, w.varietal, w.region,
                    w.vintage, w.price, w.notes, w.created_at, w.updated_at,
                    i.name, AVG(r.score), COUNT(r.id)
             FROM wine_contributions w
             JOIN invitees i ON i.id = w.invitee_id
             LEFT JOIN ratings r ON r.wine_id = w.id
             WHERE w.event_id = ?1
             GROUP BY w.id
             ORDER BY w.created_at, w.id",
        )?;

        let rows = stmt.query_map(params![event_id.to_string()], |row| {
            Ok(RecapEntry {
                rank: 0,
                wine: SqliteWineRepository::row_to_wine(row)?,
                contributor: row.get(12)?,
                average_score: row.get(13)?,
                rating_count: row.get::<_, i64>(14)? as usize,
            })
        })?;
        let mut entries = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        entries.sort_by(|a, b| match (a.average_score, b.average_score) {
            (Some(x), Some(y)) => y
                .partial_cmp(&x)
                .unwrap_or(Ordering::Equal)
                .then(b.rating_count.cmp(&a.rating_count)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        for (idx, entry) in entries.iter_mut().enumerate() {
            entry.rank = idx + 1;
        }

        Ok(entries)
    }
}
