use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TastevinError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = TastevinError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(TastevinError::ValidationError(format!(
                "unknown confidence: {other}"
            ))),
        }
    }
}

/// Who raised a duplicate flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlaggedBy {
    #[default]
    System,
    Human,
}

impl FlaggedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Human => "human",
        }
    }
}

impl std::fmt::Display for FlaggedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlaggedBy {
    type Err = TastevinError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Self::System),
            "human" => Ok(Self::Human),
            other => Err(TastevinError::ValidationError(format!(
                "unknown flag source: {other}"
            ))),
        }
    }
}

/// Directed edge: `original_wine_id` is a probable duplicate of `duplicate_wine_id`.
///
/// Unique per ordered pair; `(a, b)` and `(b, a)` are separate flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateFlag {
    pub id: Uuid,
    pub original_wine_id: Uuid,
    pub duplicate_wine_id: Uuid,
    pub confidence: Confidence,
    pub flagged_by: FlaggedBy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DuplicateFlag {
    pub fn new(
        original_wine_id: Uuid,
        duplicate_wine_id: Uuid,
        confidence: Confidence,
        flagged_by: FlaggedBy,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            original_wine_id,
            duplicate_wine_id,
            confidence,
            flagged_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touches(&self, wine_id: &Uuid) -> bool {
        self.original_wine_id == *wine_id || self.duplicate_wine_id == *wine_id
    }
}

/// Both directions of the flag table as seen from one wine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateStatus {
    pub wine_id: Uuid,
    /// Flags where this wine is the original side.
    pub duplicate_flags: Vec<DuplicateFlag>,
    /// Flags where this wine is the duplicate side.
    pub flagged_as: Vec<DuplicateFlag>,
}

impl DuplicateStatus {
    /// True when a flag exists in either direction.
    pub fn is_possible_duplicate(&self) -> bool {
        !self.duplicate_flags.is_empty() || !self.flagged_as.is_empty()
    }

    pub fn highest_confidence(&self) -> Option<Confidence> {
        self.duplicate_flags
            .iter()
            .chain(&self.flagged_as)
            .map(|flag| flag.confidence)
            .max()
    }
}
