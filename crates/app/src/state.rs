use std::{fs, path::PathBuf};

use common::config::{SyncConfig, DEFAULT_MAX_IN_FLIGHT};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "arbore";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const SHARES_FILE_NAME: &str = "shares.json";
pub const BLOBS_DIR_NAME: &str = "blobs";
pub const OUTBOX_DIR_NAME: &str = "outbox";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default log level, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily rolling log files (optional, stderr only if unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// How many store requests a traversal keeps in flight
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Name published as the author of new shares
    #[serde(default)]
    pub author: Option<String>,
    /// Node ids content is fetched from
    #[serde(default)]
    pub peers: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: None,
            max_in_flight: default_max_in_flight(),
            author: None,
            peers: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            max_in_flight: self.max_in_flight,
            ..SyncConfig::default()
        }
    }

    /// Parsed log level, INFO if the configured one is not a level
    pub fn level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the arbore directory (~/.arbore)
    pub arbore_dir: PathBuf,
    /// Path to the blobs directory
    pub blobs_path: PathBuf,
    /// Path to the persisted shares
    pub shares_path: PathBuf,
    /// Path to undelivered share notifications
    pub outbox_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the arbore directory path (custom or default ~/.arbore)
    pub fn arbore_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new arbore state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let arbore_dir = Self::arbore_dir(custom_path)?;

        if arbore_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&arbore_dir)?;

        let blobs_path = arbore_dir.join(BLOBS_DIR_NAME);
        fs::create_dir_all(&blobs_path)?;
        let outbox_path = arbore_dir.join(OUTBOX_DIR_NAME);
        fs::create_dir_all(&outbox_path)?;

        let config = config.unwrap_or_default();
        let config_path = arbore_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        let shares_path = arbore_dir.join(SHARES_FILE_NAME);
        fs::write(&shares_path, "[]")?;

        Ok(Self {
            arbore_dir,
            blobs_path,
            shares_path,
            outbox_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the arbore directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let arbore_dir = Self::arbore_dir(custom_path)?;

        if !arbore_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let blobs_path = arbore_dir.join(BLOBS_DIR_NAME);
        let shares_path = arbore_dir.join(SHARES_FILE_NAME);
        let outbox_path = arbore_dir.join(OUTBOX_DIR_NAME);
        let config_path = arbore_dir.join(CONFIG_FILE_NAME);

        if !blobs_path.exists() {
            return Err(StateError::MissingFile("blobs/".to_string()));
        }
        if !config_path.exists() {
            return Err(StateError::MissingFile("config.toml".to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            arbore_dir,
            blobs_path,
            shares_path,
            outbox_path,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("arbore directory not initialized. Run 'arbore init' first")]
    NotInitialized,

    #[error("arbore directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
