use uuid::Uuid;

use crate::error::Result;
use crate::models::{Confidence, DuplicateFlag, DuplicateStatus, FlaggedBy};
use crate::storage::repositories::DuplicateFlagRepository;

/// Bookkeeping for directed duplicate flags on top of a flag store.
pub struct DuplicateRegistry<'r, F> {
    flags: &'r F,
}

impl<'r, F: DuplicateFlagRepository> DuplicateRegistry<'r, F> {
    pub fn new(flags: &'r F) -> Self {
        Self { flags }
    }

    /// Create the `(original, duplicate)` flag or refresh its confidence.
    /// `flagged_by` is only written on creation.
    pub fn upsert_flag(
        &self,
        original: &Uuid,
        duplicate: &Uuid,
        confidence: Confidence,
        flagged_by: FlaggedBy,
    ) -> Result<DuplicateFlag> {
        let flag = self
            .flags
            .upsert_by_pair(original, duplicate, confidence, flagged_by)?;
        tracing::debug!(
            original = %original,
            duplicate = %duplicate,
            confidence = %flag.confidence,
            flagged_by = %flag.flagged_by,
            "duplicate flag recorded"
        );
        Ok(flag)
    }

    /// Remove every flag the wine takes part in. Safe to call when there are none.
    pub fn clear_flags_for_wine(&self, wine_id: &Uuid) -> Result<usize> {
        let removed = self.flags.delete_all_for_wine(wine_id)?;
        if removed > 0 {
            tracing::debug!(wine = %wine_id, removed, "cleared duplicate flags");
        }
        Ok(removed)
    }

    pub fn status(&self, wine_id: &Uuid) -> Result<DuplicateStatus> {
        Ok(DuplicateStatus {
            wine_id: *wine_id,
            duplicate_flags: self.flags.list_as_original(wine_id)?,
            flagged_as: self.flags.list_as_duplicate(wine_id)?,
        })
    }
}
