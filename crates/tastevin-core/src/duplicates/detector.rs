use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DuplicateConfig;
use crate::error::{Result, TastevinError};
use crate::models::{DuplicateFlag, FlaggedBy};
use crate::storage::repositories::{DuplicateFlagRepository, WineRepository};

use super::registry::DuplicateRegistry;
use super::scorer::SimilarityScorer;

/// What one detection pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub wine_id: Uuid,
    /// Sibling wines scored against the target.
    pub compared: usize,
    /// Flags written with the target as the original side.
    pub flags: Vec<DuplicateFlag>,
}

/// Scores a wine against every other wine of its event and records flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateDetector {
    scorer: SimilarityScorer,
}

impl DuplicateDetector {
    pub fn new(scorer: SimilarityScorer) -> Self {
        Self { scorer }
    }

    pub fn with_thresholds(thresholds: DuplicateConfig) -> Self {
        Self::new(SimilarityScorer::new().with_thresholds(thresholds))
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Run one pass for `wine_id`.
    ///
    /// Never removes flags: callers re-evaluating an edited wine clear it
    /// first. A target that no longer exists yields an empty report. A sibling
    /// deleted mid-pass is skipped.
    pub fn detect<W, F>(&self, wines: &W, flags: &F, wine_id: &Uuid) -> Result<DetectionReport>
    where
        W: WineRepository,
        F: DuplicateFlagRepository,
    {
        let mut report = DetectionReport {
            wine_id: *wine_id,
            ..Default::default()
        };

        let Some(target) = wines.find_by_id(wine_id)? else {
            tracing::debug!(wine = %wine_id, "wine vanished before duplicate detection");
            return Ok(report);
        };

        let siblings = wines.find_all_by_event(&target.event_id, Some(&target.id))?;
        let registry = DuplicateRegistry::new(flags);

        for sibling in siblings.iter().filter(|w| w.id != target.id) {
            report.compared += 1;
            let similarity = self.scorer.score(&target, sibling);
            tracing::debug!(
                wine = %target.id,
                sibling = %sibling.id,
                percentage = similarity.percentage,
                duplicate = similarity.is_duplicate,
                "scored wine pair"
            );
            if !similarity.is_duplicate {
                continue;
            }

            match registry.upsert_flag(
                &target.id,
                &sibling.id,
                similarity.confidence,
                FlaggedBy::System,
            ) {
                Ok(flag) => report.flags.push(flag),
                Err(TastevinError::WineNotFound(id)) => {
                    tracing::debug!(wine = %target.id, missing = %id, "sibling vanished during detection");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}
