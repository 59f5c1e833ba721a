use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WineContribution;

pub const MAX_SCORE: u8 = 100;

/// A guest's score for one wine; one per (wine, invitee).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub wine_id: Uuid,
    pub invitee_id: Uuid,
    pub score: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rating {
    pub fn new(wine_id: Uuid, invitee_id: Uuid, score: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            wine_id,
            invitee_id,
            score,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One row of the post-event ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecapEntry {
    pub rank: usize,
    pub wine: WineContribution,
    pub contributor: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,

    pub rating_count: usize,
}
