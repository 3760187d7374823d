//! Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use wxhist_core::{LocalZone, RollupPolicy};
use wxhist_types::Station;

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage settings.
    pub storage: StorageConfig,
    /// History rollup settings.
    pub history: HistoryConfig,
    /// Stations to roll up.
    #[serde(default)]
    pub stations: Vec<StationConfig>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every error found.
    ///
    /// This checks:
    /// - Storage path is not empty
    /// - `runs_per_day` and `window_end_hour` are within `1..=24`
    /// - The run timeout is not zero
    /// - Station ids are not empty and not duplicated
    /// - Station timezones parse
    ///
    /// # Example
    ///
    /// ```
    /// use wxhist_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.storage.validate());
        errors.extend(self.history.validate());

        let mut seen_ids = std::collections::HashSet::new();
        for (i, station) in self.stations.iter().enumerate() {
            let prefix = format!("stations[{}]", i);
            errors.extend(station.validate(&prefix));

            let id_lower = station.id.to_lowercase();
            if !station.id.is_empty() && !seen_ids.insert(id_lower) {
                errors.push(ValidationError {
                    field: format!("{}.id", prefix),
                    message: format!("duplicate station id '{}'", station.id),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Configured stations, in file order.
    pub fn stations(&self) -> Vec<Station> {
        self.stations.iter().map(StationConfig::to_station).collect()
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: wxhist_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Maximum number of passes per day (one per hour).
pub const MAX_RUNS_PER_DAY: u32 = 24;

/// History rollup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Build history. When disabled, passes only purge the daily store.
    pub enabled: bool,
    /// Include extended measurement kinds and full operator sets.
    pub full: bool,
    /// Number of scheduled passes per day.
    pub runs_per_day: u32,
    /// Local hour closing yesterday's window.
    pub window_end_hour: u8,
    /// Upper bound for one pass, in seconds.
    pub run_timeout_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            full: false,
            runs_per_day: 4,
            window_end_hour: wxhist_core::DEFAULT_WINDOW_END_HOUR,
            run_timeout_secs: 600,
        }
    }
}

impl HistoryConfig {
    /// Validate history configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !(1..=MAX_RUNS_PER_DAY).contains(&self.runs_per_day) {
            errors.push(ValidationError {
                field: "history.runs_per_day".to_string(),
                message: format!(
                    "runs per day {} is out of range (1 to {})",
                    self.runs_per_day, MAX_RUNS_PER_DAY
                ),
            });
        }

        if !(1..=24).contains(&self.window_end_hour) {
            errors.push(ValidationError {
                field: "history.window_end_hour".to_string(),
                message: format!(
                    "window end hour {} is out of range (1 to 24)",
                    self.window_end_hour
                ),
            });
        }

        if self.run_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "history.run_timeout_secs".to_string(),
                message: "run timeout cannot be 0".to_string(),
            });
        }

        errors
    }

    /// Policy handed to the history builder.
    pub fn policy(&self) -> RollupPolicy {
        RollupPolicy {
            historization: self.enabled,
            full_mode: self.full,
            window_end_hour: self.window_end_hour,
        }
    }

    /// Time between two scheduled passes.
    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(86_400 / u64::from(self.runs_per_day.max(1)))
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

/// Configuration for a station to roll up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Station (device) id as found in the daily store.
    pub id: String,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    /// IANA zone or UTC offset.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Build history for this station. The daily store is purged either way.
    #[serde(default = "default_build")]
    pub build: bool,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_build() -> bool {
    true
}

impl StationConfig {
    /// Validate station configuration.
    pub fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push(ValidationError {
                field: format!("{}.id", prefix),
                message: "station id cannot be empty".to_string(),
            });
        }

        if let Some(name) = &self.name
            && name.is_empty()
        {
            errors.push(ValidationError {
                field: format!("{}.name", prefix),
                message: "name cannot be empty string (omit it instead)".to_string(),
            });
        }

        if let Err(e) = self.timezone.parse::<LocalZone>() {
            errors.push(ValidationError {
                field: format!("{}.timezone", prefix),
                message: e.to_string(),
            });
        }

        errors
    }

    pub fn to_station(&self) -> Station {
        let name = self.name.as_deref().unwrap_or(&self.id);
        Station::new(&self.id, name, &self.timezone).with_build(self.build)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `history.runs_per_day` or `stations[0].id`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wxhist")
        .join("config.toml")
}
