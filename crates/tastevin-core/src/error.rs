use thiserror::Error;

/// All errors that can occur in tastevin-core.
#[derive(Debug, Error)]
pub enum TastevinError {
    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Invitee not found: {0}")]
    InviteeNotFound(String),

    #[error("Time option not found: {0}")]
    TimeOptionNotFound(String),

    #[error("Wine not found: {0}")]
    WineNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Event is finalized: {0}")]
    EventFinalized(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl TastevinError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EventNotFound(_)
                | Self::InviteeNotFound(_)
                | Self::TimeOptionNotFound(_)
                | Self::WineNotFound(_)
        )
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            e if e.is_not_found() => ExitCode::NotFound,
            Self::ValidationError(_) => ExitCode::InvalidArgs,
            Self::EventFinalized(_) => ExitCode::Conflict,
            Self::Io(_) => ExitCode::FileSystemError,
            _ => ExitCode::GeneralError,
        }
    }
}

/// Exit codes used by the CLI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    FileSystemError = 4,
    Conflict = 7,
}

pub type Result<T> = std::result::Result<T, TastevinError>;
