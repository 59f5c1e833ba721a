use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TastevinError};

/// Root application configuration, loaded from `~/.config/tastevin/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub core: CoreConfig,
    pub events: EventsConfig,
    pub duplicates: DuplicateConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub data_path: String,
}

/// Guest-count bounds applied when creating events and adding invitees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub min_participants: usize,
    pub max_participants: usize,
}

/// Percentage thresholds used by the duplicate-wine scorer.
///
/// `duplicate_threshold` and `medium_confidence` are independent: a score
/// between them is flagged as a duplicate with low confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    pub duplicate_threshold: f64,
    pub medium_confidence: f64,
    pub high_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("tastevin");

        Self {
            data_path: data_dir.to_string_lossy().to_string(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            min_participants: 2,
            max_participants: 8,
        }
    }
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: 70.0,
            medium_confidence: 80.0,
            high_confidence: 90.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

// ─── Validation ────────────────────────────────────────────

impl EventsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_participants == 0 || self.min_participants > self.max_participants {
            return Err(TastevinError::ConfigError(format!(
                "invalid participant bounds: min {} / max {}",
                self.min_participants, self.max_participants
            )));
        }
        Ok(())
    }
}

impl DuplicateConfig {
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.duplicate_threshold)
            || !in_range(self.medium_confidence)
            || !in_range(self.high_confidence)
        {
            return Err(TastevinError::ConfigError(
                "duplicate thresholds must be between 0 and 100".to_string(),
            ));
        }
        if self.medium_confidence > self.high_confidence {
            return Err(TastevinError::ConfigError(format!(
                "medium_confidence ({}) exceeds high_confidence ({})",
                self.medium_confidence, self.high_confidence
            )));
        }
        Ok(())
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/tastevin/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TASTEVIN_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("tastevin")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.events.validate()?;
        self.duplicates.validate()
    }

    pub fn set_data_path(&mut self, path: PathBuf) {
        self.core.data_path = path.to_string_lossy().to_string();
    }

    /// Path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.core.data_path).join("tastevin.db")
    }
}
