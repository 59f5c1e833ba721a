pub mod config;
pub mod duplicates;
pub mod error;
pub mod models;
pub mod storage;
pub mod tokens;

pub use config::{AppConfig, CoreConfig, DuplicateConfig, EventsConfig, LoggingConfig};
pub use error::{ExitCode, Result, TastevinError};
pub use models::*;

pub use duplicates::{
    normalize, DetectionReport, DuplicateDetector, DuplicateRegistry, Similarity,
    SimilarityScorer,
};
pub use tokens::{TokenGenerator, UlidTokenGenerator};

pub use storage::database::{open_database, open_in_memory, ConnectionPool, Database};

pub use storage::repositories::{
    Repository, DuplicateFlagRepository, SqliteDuplicateFlagRepository,
    EventRepository, SqliteEventRepository,
    InviteeRepository, SqliteInviteeRepository,
    RatingRepository, SqliteRatingRepository,
    WineRepository, SqliteWineRepository,
};

pub use storage::queries::EventRecapQuery;
