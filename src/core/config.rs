/*
 * Persists the application settings: where the stencil store lives, the author
 * name stamped on saved versions, and the stencil that was edited last. The
 * settings are one JSON document in the per-user local configuration directory.
 *
 * It uses a trait-based approach (`ConfigManagerOperations`) so callers and
 * tests can substitute another backend.
 */
use crate::core::path_utils;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

const SETTINGS_FILENAME: &str = "settings.json";
const STORE_SUBFOLDER_NAME: &str = "stencils";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoProjectDirectory,
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serde(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Serde(e) => write!(f, "Configuration format error: {e}"),
            ConfigError::NoProjectDirectory => {
                write!(f, "Could not determine project directory for configuration")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /* Root of the file-backed stencil store; `None` means the default location. */
    pub store_root: Option<PathBuf>,
    pub author: Option<String>,
    pub last_stencil_id: Option<String>,
}

pub trait ConfigManagerOperations: Send + Sync {
    /* Missing settings are not an error; they load as `AppSettings::default()`. */
    fn load_settings(&self, app_name: &str) -> Result<AppSettings>;
    fn save_settings(&self, app_name: &str, settings: &AppSettings) -> Result<()>;
    /* The store root to use when the settings do not name one. */
    fn default_store_root(&self, app_name: &str) -> Result<PathBuf>;
}

pub struct CoreConfigManager {
    config_dir_override: Option<PathBuf>,
}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {
            config_dir_override: None,
        }
    }

    /* Uses `config_dir` instead of the per-user directory. */
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        CoreConfigManager {
            config_dir_override: Some(config_dir),
        }
    }

    fn config_dir(&self, app_name: &str) -> Result<PathBuf> {
        if let Some(dir) = &self.config_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }
        path_utils::get_base_app_config_local_dir(app_name).ok_or(ConfigError::NoProjectDirectory)
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_settings(&self, app_name: &str) -> Result<AppSettings> {
        log::trace!("CoreConfigManager: Loading settings for app '{app_name}'");
        let file_path = self.config_dir(app_name)?.join(SETTINGS_FILENAME);
        if !file_path.exists() {
            log::debug!("CoreConfigManager: Settings file {file_path:?} does not exist.");
            return Ok(AppSettings::default());
        }
        let reader = BufReader::new(File::open(&file_path)?);
        let settings: AppSettings = serde_json::from_reader(reader)?;
        log::debug!("CoreConfigManager: Loaded settings from {file_path:?}.");
        Ok(settings)
    }

    fn save_settings(&self, app_name: &str, settings: &AppSettings) -> Result<()> {
        let file_path = self.config_dir(app_name)?.join(SETTINGS_FILENAME);
        let writer = BufWriter::new(File::create(&file_path)?);
        serde_json::to_writer_pretty(writer, settings)?;
        log::debug!("CoreConfigManager: Saved settings to {file_path:?}.");
        Ok(())
    }

    fn default_store_root(&self, app_name: &str) -> Result<PathBuf> {
        Ok(self.config_dir(app_name)?.join(STORE_SUBFOLDER_NAME))
    }
}
