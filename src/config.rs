use crate::handlers::{AppOptions, RepositoryScope};
use crate::storage::{create_store, SessionStore, StorageError, StoreType};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl From<StorageError> for ConfigError {
    fn from(error: StorageError) -> Self {
        ConfigError::Storage(error.to_string())
    }
}

pub const KEYS: &[&str] = &[
    "repository.scope",
    "session.store",
    "session.path",
    "session.max-age-days",
    "seed-data",
    "log-level",
];

const VALID_SCOPES: &[&str] = &["session", "process"];
const VALID_STORE_TYPES: &[&str] = &["memory", "json", "sqlite"];
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

fn validate_path(path: &str) -> Result<PathBuf, ConfigError> {
    if path.contains('\0') {
        return Err(ConfigError::InvalidConfig(
            "Path contains invalid characters".to_string(),
        ));
    }

    let path = PathBuf::from(shellexpand::tilde(path).as_ref());
    if path.as_os_str().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "Path cannot be empty".to_string(),
        ));
    }

    Ok(path)
}

fn validate_one_of(key: &str, value: &str, valid: &[&str]) -> Result<(), ConfigError> {
    if !valid.contains(&value) {
        return Err(ConfigError::InvalidConfig(format!(
            "{} must be one of: {}",
            key,
            valid.join(", ")
        )));
    }
    Ok(())
}

fn validate_max_age(value: &str) -> Result<u32, ConfigError> {
    match value.parse::<u32>() {
        Ok(days) if days > 0 => Ok(days),
        _ => Err(ConfigError::InvalidConfig(
            "session.max-age-days must be a positive integer".to_string(),
        )),
    }
}

fn validate_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidConfig(format!("{} must be true or false", key)))
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub repository_scope: Option<String>,
    #[serde(default)]
    pub session_store: Option<String>,
    #[serde(default)]
    pub session_path: Option<String>,
    #[serde(default)]
    pub session_max_age_days: Option<u32>,
    #[serde(default)]
    pub seed_data: Option<bool>,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Config {
    pub fn with_defaults() -> Self {
        Self {
            repository_scope: Some("session".to_string()),
            session_store: Some("json".to_string()),
            session_path: default_session_path(StoreType::Json)
                .map(|p| p.to_string_lossy().to_string()),
            session_max_age_days: Some(31),
            seed_data: Some(false),
            log_level: Some("warn".to_string()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref scope) = self.repository_scope {
            validate_one_of("repository.scope", scope, VALID_SCOPES)?;
        }
        if let Some(ref store) = self.session_store {
            validate_one_of("session.store", store, VALID_STORE_TYPES)?;
        }
        if let Some(ref path) = self.session_path {
            validate_path(path)?;
        }
        if let Some(days) = self.session_max_age_days {
            validate_max_age(&days.to_string())?;
        }
        if let Some(ref level) = self.log_level {
            validate_one_of("log-level", level, VALID_LOG_LEVELS)?;
        }
        Ok(())
    }

    pub fn scope(&self) -> RepositoryScope {
        self.repository_scope
            .as_deref()
            .and_then(|scope| scope.parse().ok())
            .unwrap_or(RepositoryScope::Session)
    }

    pub fn store_type(&self) -> StoreType {
        self.session_store
            .as_deref()
            .and_then(|store| store.parse().ok())
            .unwrap_or(StoreType::Json)
    }

    /// The configured session path, or the per-store default under the data directory.
    pub fn session_path(&self) -> Option<PathBuf> {
        match self.session_path {
            Some(ref path) => Some(PathBuf::from(shellexpand::tilde(path).as_ref())),
            None => default_session_path(self.store_type()),
        }
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("warn")
    }

    pub fn app_options(&self) -> AppOptions {
        AppOptions {
            scope: self.scope(),
            seed: self.seed_data.unwrap_or(false),
            session_max_age: Duration::days(i64::from(self.session_max_age_days.unwrap_or(31))),
        }
    }

    pub fn create_store(&self) -> Result<Box<dyn SessionStore>, ConfigError> {
        let store_type = self.store_type();
        let path = match store_type {
            StoreType::Memory => None,
            StoreType::Json | StoreType::Sqlite => Some(self.session_path().ok_or_else(|| {
                ConfigError::InvalidConfig("Could not determine session path".to_string())
            })?),
        };
        Ok(create_store(store_type, path.as_deref())?)
    }
}

fn default_session_path(store_type: StoreType) -> Option<PathBuf> {
    let file_name = match store_type {
        StoreType::Sqlite => "sessions.db",
        StoreType::Memory | StoreType::Json => "sessions.json",
    };
    dirs::data_dir().map(|dir| dir.join("todos").join(file_name))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("todos").join("config.json"))
}

pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Loads the configuration at `config_path`, or the default location.
    /// A missing or empty file yields an empty configuration.
    pub fn new(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_path {
            Some(path) => validate_path(&path.to_string_lossy())?,
            None => default_config_path().ok_or_else(|| {
                ConfigError::InvalidConfig("Could not determine config directory".to_string())
            })?,
        };

        let config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                Config::default()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            Config::default()
        };
        config.validate()?;

        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        // Create parent directories if they don't exist
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Explicitly configured values layered over the defaults.
    pub fn effective(&self) -> Config {
        let defaults = Config::with_defaults();
        let config = &self.config;
        Config {
            repository_scope: config
                .repository_scope
                .clone()
                .or(defaults.repository_scope),
            session_store: config.session_store.clone().or(defaults.session_store),
            // The default path depends on the store type, so leave it unresolved here.
            session_path: config.session_path.clone(),
            session_max_age_days: config
                .session_max_age_days
                .or(defaults.session_max_age_days),
            seed_data: config.seed_data.or(defaults.seed_data),
            log_level: config.log_level.clone().or(defaults.log_level),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let config = &self.config;
        match key {
            "repository.scope" => config.repository_scope.clone(),
            "session.store" => config.session_store.clone(),
            "session.path" => config.session_path.clone(),
            "session.max-age-days" => config.session_max_age_days.map(|v| v.to_string()),
            "seed-data" => config.seed_data.map(|v| v.to_string()),
            "log-level" => config.log_level.clone(),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut config = self.config.clone();

        match key {
            "repository.scope" => {
                validate_one_of(key, value, VALID_SCOPES)?;
                config.repository_scope = Some(value.to_string());
            }
            "session.store" => {
                validate_one_of(key, value, VALID_STORE_TYPES)?;
                if config.session_store.as_deref() != Some(value) {
                    tracing::warn!("changing session.store does not carry existing sessions over");
                }
                config.session_store = Some(value.to_string());
            }
            "session.path" => {
                let path = validate_path(value)?;
                config.session_path = Some(path.to_string_lossy().to_string());
            }
            "session.max-age-days" => {
                config.session_max_age_days = Some(validate_max_age(value)?);
            }
            "seed-data" => {
                config.seed_data = Some(validate_bool(key, value)?);
            }
            "log-level" => {
                validate_one_of(key, value, VALID_LOG_LEVELS)?;
                config.log_level = Some(value.to_string());
            }
            _ => {
                return Err(ConfigError::InvalidKey(key.to_string()));
            }
        }
        config.validate()?;
        self.config = config;
        self.save()
    }

    pub fn unset(&mut self, key: &str) -> Result<(), ConfigError> {
        let config = &mut self.config;
        match key {
            "repository.scope" => config.repository_scope = None,
            "session.store" => config.session_store = None,
            "session.path" => config.session_path = None,
            "session.max-age-days" => config.session_max_age_days = None,
            "seed-data" => config.seed_data = None,
            "log-level" => config.log_level = None,
            _ => return Err(ConfigError::InvalidKey(key.to_string())),
        }
        self.save()
    }

    /// Every key with its effective value and whether that value is a default.
    pub fn list(&self) -> Vec<(String, String, bool)> {
        let effective = self.effective();
        KEYS.iter()
            .map(|key| {
                if let Some(value) = self.get(key) {
                    return (key.to_string(), value, false);
                }
                let default = match *key {
                    "session.path" => effective
                        .session_path()
                        .map(|p| p.to_string_lossy().to_string()),
                    "repository.scope" => effective.repository_scope.clone(),
                    "session.store" => effective.session_store.clone(),
                    "session.max-age-days" => effective.session_max_age_days.map(|v| v.to_string()),
                    "seed-data" => effective.seed_data.map(|v| v.to_string()),
                    "log-level" => effective.log_level.clone(),
                    _ => None,
                };
                (
                    key.to_string(),
                    default.unwrap_or_else(|| "null".to_string()),
                    true,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::temp_session_path;

    fn create_test_config_manager() -> (ConfigManager, tempfile::TempDir) {
        let (path, temp_dir) = temp_session_path("config.json");
        let manager =
            ConfigManager::new(Some(path.as_path())).expect("Failed to create config manager");
        (manager, temp_dir)
    }

    #[test]
    fn test_config_manager() {
        let (mut manager, temp_dir) = create_test_config_manager();

        assert!(manager.set("repository.scope", "process").is_ok());
        assert_eq!(manager.get("repository.scope"), Some("process".to_string()));

        assert!(manager.set("session.store", "sqlite").is_ok());
        assert_eq!(manager.get("session.store"), Some("sqlite".to_string()));

        let session_path = "~/.local/share/todos/sessions.db";
        assert!(manager.set("session.path", session_path).is_ok());
        assert_eq!(
            manager.get("session.path"),
            Some(shellexpand::tilde(session_path).to_string())
        );

        assert!(manager.set("session.max-age-days", "7").is_ok());
        assert_eq!(manager.get("session.max-age-days"), Some("7".to_string()));

        assert!(manager.set("seed-data", "true").is_ok());
        assert_eq!(manager.get("seed-data"), Some("true".to_string()));

        assert!(manager.unset("seed-data").is_ok());
        assert_eq!(manager.get("seed-data"), None);

        // Values survive a reload from disk.
        let config_path = temp_dir.path().join("config.json");
        let reloaded = ConfigManager::new(Some(config_path.as_path())).unwrap();
        assert_eq!(reloaded.get("repository.scope"), Some("process".to_string()));
        assert_eq!(reloaded.get("session.max-age-days"), Some("7".to_string()));
    }

    #[test]
    fn test_config_manager_rejects_invalid_values() {
        let (mut manager, _temp_dir) = create_test_config_manager();

        assert!(matches!(
            manager.set("repository.scope", "global"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("session.store", "redis"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("session.max-age-days", "0"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("seed-data", "yes"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("color", "blue"),
            Err(ConfigError::InvalidKey(_))
        ));
        assert!(matches!(manager.unset("color"), Err(ConfigError::InvalidKey(_))));
        assert_eq!(manager.get("repository.scope"), None);
    }

    #[test]
    fn test_config_manager_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let effective = manager.effective();

        assert_eq!(effective.scope(), RepositoryScope::Session);
        assert_eq!(effective.store_type(), StoreType::Json);
        assert_eq!(effective.log_level(), "warn");

        let options = effective.app_options();
        assert!(!options.seed);
        assert_eq!(options.session_max_age, Duration::days(31));
    }

    #[test]
    fn test_config_manager_list() {
        let (mut manager, _temp_dir) = create_test_config_manager();
        manager.set("log-level", "debug").unwrap();

        let list = manager.list();
        assert_eq!(list.len(), KEYS.len());
        assert!(list
            .iter()
            .any(|(key, value, is_default)| key == "log-level" && value == "debug" && !is_default));
        assert!(list.iter().any(|(key, value, is_default)| {
            key == "session.store" && value == "json" && *is_default
        }));
        assert!(list.iter().any(|(key, value, is_default)| {
            key == "session.path" && (value.contains("sessions.json") || value == "null") && *is_default
        }));
    }

    #[test]
    fn test_create_store_from_config() {
        let (path, _temp_dir) = temp_session_path("sessions.db");
        let config = Config {
            session_store: Some("sqlite".to_string()),
            session_path: Some(path.to_string_lossy().to_string()),
            ..Config::default()
        };
        let store = config.create_store().unwrap();
        store
            .save(&crate::session::SessionId::new(), &crate::session::SessionData::new())
            .unwrap();
        assert!(path.exists());

        let memory = Config {
            session_store: Some("memory".to_string()),
            ..Config::default()
        };
        assert!(memory.create_store().is_ok());
    }

    #[test]
    fn test_empty_config_file() {
        let (path, _temp_dir) = temp_session_path("config.json");
        std::fs::write(&path, "").unwrap();
        let manager = ConfigManager::new(Some(path.as_path())).unwrap();
        assert_eq!(manager.get("session.store"), None);
    }
}
