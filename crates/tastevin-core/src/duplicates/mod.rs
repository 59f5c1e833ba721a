//! Duplicate-wine detection: normalize free text, score wine pairs, and keep
//! directed duplicate flags in step with the current attributes of each wine.

pub mod detector;
pub mod normalize;
pub mod registry;
pub mod scorer;

pub use detector::{DetectionReport, DuplicateDetector};
pub use normalize::normalize;
pub use registry::DuplicateRegistry;
pub use scorer::{Similarity, SimilarityScorer};
