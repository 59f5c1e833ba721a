use serde::{Deserialize, Serialize};

use crate::config::DuplicateConfig;
use crate::models::{Confidence, WineContribution};

use super::normalize::normalize;

pub const PRODUCER_WEIGHT: u32 = 30;
pub const VARIETAL_WEIGHT: u32 = 25;
pub const VINTAGE_WEIGHT: u32 = 20;
pub const REGION_WEIGHT: u32 = 15;
pub const WINE_TYPE_WEIGHT: u32 = 10;

/// Outcome of comparing two wines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    pub is_duplicate: bool,
    pub confidence: Confidence,
    /// Weighted match percentage in `0.0..=100.0`.
    pub percentage: f64,
}

/// Weighted multi-attribute scorer.
///
/// A dimension only counts when both wines have a value for it, so fields
/// missing on either side never dilute the percentage. Wine type is always
/// present, always counts, and is compared by variant rather than by label.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityScorer {
    thresholds: DuplicateConfig,
}

impl SimilarityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(mut self, thresholds: DuplicateConfig) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &DuplicateConfig {
        &self.thresholds
    }

    pub fn score(&self, a: &WineContribution, b: &WineContribution) -> Similarity {
        let mut tally = Tally::default();

        tally.text(PRODUCER_WEIGHT, a.producer.as_deref(), b.producer.as_deref());
        tally.text(VARIETAL_WEIGHT, a.varietal.as_deref(), b.varietal.as_deref());
        tally.exact(VINTAGE_WEIGHT, a.vintage, b.vintage);
        tally.text(REGION_WEIGHT, a.region.as_deref(), b.region.as_deref());
        tally.exact(WINE_TYPE_WEIGHT, Some(a.wine_type), Some(b.wine_type));

        self.classify(tally.percentage())
    }

    /// Map a percentage onto the duplicate decision and confidence tier.
    pub fn classify(&self, percentage: f64) -> Similarity {
        let t = &self.thresholds;
        let confidence = if percentage >= t.high_confidence {
            Confidence::High
        } else if percentage >= t.medium_confidence {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        Similarity {
            is_duplicate: percentage >= t.duplicate_threshold,
            confidence,
            percentage,
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    score: u32,
    max_score: u32,
}

impl Tally {
    fn text(&mut self, weight: u32, a: Option<&str>, b: Option<&str>) {
        fn present(v: Option<&str>) -> Option<&str> {
            v.filter(|s| !s.is_empty())
        }

        if let (Some(a), Some(b)) = (present(a), present(b)) {
            self.max_score += weight;
            if normalize(a) == normalize(b) {
                self.score += weight;
            }
        }
    }

    fn exact<T: PartialEq>(&mut self, weight: u32, a: Option<T>, b: Option<T>) {
        if let (Some(a), Some(b)) = (a, b) {
            self.max_score += weight;
            if a == b {
                self.score += weight;
            }
        }
    }

    fn percentage(&self) -> f64 {
        if self.max_score == 0 {
            return 0.0;
        }
        f64::from(self.score) * 100.0 / f64::from(self.max_score)
    }
}
