use crate::models::{Priority, StorageError, DEFAULT_CATEGORY_NAME};
use crate::reminders::MissedReminderPolicy;
use crate::storage::{self, Storage, StorageType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "TASKFLOW_CONFIG";

const DEFAULT_POLL_SECONDS: u64 = 30;

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
    #[error("Could not determine home directory")]
    NoHomeDir,
}

impl From<StorageError> for ConfigError {
    fn from(error: StorageError) -> Self {
        ConfigError::Storage(error.to_string())
    }
}

pub const KEYS: &[&str] = &[
    "storage.type",
    "storage.path",
    "default-priority",
    "default-category",
    "reminders.missed",
    "reminders.poll-seconds",
];

/// Expands `~` and checks that the data file could be created: the
/// containing directory must already exist and be writable.
fn validate_storage_path(raw: &str) -> Result<PathBuf, ConfigError> {
    let invalid = |msg: String| Err(ConfigError::InvalidConfig(msg));
    if raw.trim().is_empty() || raw.contains('\0') {
        return invalid(format!("storage.path is not a usable path: {raw:?}"));
    }

    let expanded = PathBuf::from(shellexpand::tilde(raw).as_ref());
    let Some(dir) = expanded.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(expanded);
    };

    match dir.metadata() {
        Err(_) => invalid(format!("no such directory: {}", dir.display())),
        Ok(meta) if !meta.is_dir() => invalid(format!("not a directory: {}", dir.display())),
        Ok(meta) if meta.permissions().readonly() => {
            invalid(format!("directory is read-only: {}", dir.display()))
        }
        Ok(_) => Ok(expanded),
    }
}

fn validate_storage_type(value: &str) -> Result<StorageType, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidConfig("storage.type must be one of: json, sqlite".to_string())
    })
}

fn validate_priority(value: &str) -> Result<Priority, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidConfig("default-priority must be one of: high, medium, low".to_string())
    })
}

fn validate_missed_policy(value: &str) -> Result<MissedReminderPolicy, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidConfig("reminders.missed must be one of: drop, fire".to_string())
    })
}

fn validate_poll_seconds(value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(seconds),
        _ => Err(ConfigError::InvalidConfig(
            "reminders.poll-seconds must be a positive integer".to_string(),
        )),
    }
}

/// Values explicitly set by the user. Anything left `None` falls back to
/// its default.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missed_reminders: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_seconds: Option<u64>,
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref storage_type) = self.storage_type {
            validate_storage_type(storage_type)?;
        }
        if let Some(ref priority) = self.default_priority {
            validate_priority(priority)?;
        }
        if let Some(ref policy) = self.missed_reminders {
            validate_missed_policy(policy)?;
        }
        if let Some(seconds) = self.poll_seconds {
            validate_poll_seconds(&seconds.to_string())?;
        }
        Ok(())
    }

    /// Clears every value that would fail validation, keeping the rest.
    /// Returns the keys that were cleared.
    fn drop_invalid(&mut self) -> Vec<&'static str> {
        let mut dropped = Vec::new();
        if self.storage_type.as_deref().is_some_and(|v| validate_storage_type(v).is_err()) {
            self.storage_type = None;
            dropped.push("storage.type");
        }
        if self.default_priority.as_deref().is_some_and(|v| validate_priority(v).is_err()) {
            self.default_priority = None;
            dropped.push("default-priority");
        }
        if self.missed_reminders.as_deref().is_some_and(|v| validate_missed_policy(v).is_err()) {
            self.missed_reminders = None;
            dropped.push("reminders.missed");
        }
        if self.poll_seconds.is_some_and(|s| validate_poll_seconds(&s.to_string()).is_err()) {
            self.poll_seconds = None;
            dropped.push("reminders.poll-seconds");
        }
        dropped
    }
}

/// Resolves where the config file lives: explicit path, then
/// `TASKFLOW_CONFIG`, then `~/.config/taskflow/config.json`.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref()));
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&path).as_ref()));
        }
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".config").join("taskflow").join("config.json"))
}

pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    pub fn new(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = self::config_path(config_path)?;
        let config = Self::load(&path)?;
        log::debug!("Using config file {}", path.display());
        Ok(Self { path, config })
    }

    fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        let mut config: Config = serde_json::from_str(&contents)?;
        for key in config.drop_invalid() {
            log::warn!("Ignoring invalid {} in {}", key, path.display());
        }
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// The explicitly set value for `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let config = &self.config;
        let value = match key {
            "storage.type" => config.storage_type.clone(),
            "storage.path" => config.storage_path.clone(),
            "default-priority" => config.default_priority.clone(),
            "default-category" => config.default_category.clone(),
            "reminders.missed" => config.missed_reminders.clone(),
            "reminders.poll-seconds" => config.poll_seconds.map(|v| v.to_string()),
            _ => return Err(ConfigError::InvalidKey(key.to_string())),
        };
        Ok(value)
    }

    /// The value in effect for `key`: the explicit one, else the default.
    pub fn effective(&self, key: &str) -> Result<String, ConfigError> {
        match self.get(key)? {
            Some(value) => Ok(value),
            None => self.default_value(key),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut config = self.config.clone();
        match key {
            "storage.type" => {
                let storage_type = validate_storage_type(value)?;
                if storage_type != self.storage_type() {
                    log::warn!("Changing storage type does not migrate existing data");
                }
                config.storage_type = Some(storage_type.as_str().to_string());
            }
            "storage.path" => {
                let path = validate_storage_path(value)?;
                config.storage_path = Some(path.to_string_lossy().to_string());
            }
            "default-priority" => {
                config.default_priority = Some(validate_priority(value)?.as_str().to_string());
            }
            "default-category" => {
                if value.trim().is_empty() {
                    return Err(ConfigError::InvalidConfig(
                        "default-category cannot be empty".to_string(),
                    ));
                }
                config.default_category = Some(value.trim().to_string());
            }
            "reminders.missed" => {
                config.missed_reminders = Some(validate_missed_policy(value)?.as_str().to_string());
            }
            "reminders.poll-seconds" => {
                config.poll_seconds = Some(validate_poll_seconds(value)?);
            }
            _ => return Err(ConfigError::InvalidKey(key.to_string())),
        }
        config.validate()?;
        self.config = config;
        self.save()?;
        log::info!("Set {} = {}", key, value);
        Ok(())
    }

    pub fn unset(&mut self, key: &str) -> Result<(), ConfigError> {
        let config = &mut self.config;
        match key {
            "storage.type" => config.storage_type = None,
            "storage.path" => config.storage_path = None,
            "default-priority" => config.default_priority = None,
            "default-category" => config.default_category = None,
            "reminders.missed" => config.missed_reminders = None,
            "reminders.poll-seconds" => config.poll_seconds = None,
            _ => return Err(ConfigError::InvalidKey(key.to_string())),
        }
        self.save()
    }

    /// Every key with its effective value and whether that value is the
    /// default.
    pub fn list(&self) -> Result<Vec<(String, String, bool)>, ConfigError> {
        KEYS.iter()
            .map(|key| {
                let explicit = self.get(key)?;
                let is_default = explicit.is_none();
                let value = match explicit {
                    Some(value) => value,
                    None => self.default_value(key)?,
                };
                Ok((key.to_string(), value, is_default))
            })
            .collect()
    }

    fn default_value(&self, key: &str) -> Result<String, ConfigError> {
        let value = match key {
            "storage.type" => StorageType::default().as_str().to_string(),
            "storage.path" => self.default_storage_path().to_string_lossy().to_string(),
            "default-priority" => Priority::default().as_str().to_string(),
            "default-category" => DEFAULT_CATEGORY_NAME.to_string(),
            "reminders.missed" => MissedReminderPolicy::default().as_str().to_string(),
            "reminders.poll-seconds" => DEFAULT_POLL_SECONDS.to_string(),
            _ => return Err(ConfigError::InvalidKey(key.to_string())),
        };
        Ok(value)
    }

    // Data lives next to the config file unless configured otherwise.
    fn default_storage_path(&self) -> PathBuf {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let file = match self.storage_type() {
            StorageType::Json => "data.json",
            StorageType::Sqlite => "data.db",
        };
        dir.join(file)
    }

    pub fn storage_type(&self) -> StorageType {
        self.config
            .storage_type
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn storage_path(&self) -> PathBuf {
        match &self.config.storage_path {
            Some(path) => PathBuf::from(shellexpand::tilde(path).as_ref()),
            None => self.default_storage_path(),
        }
    }

    pub fn default_priority(&self) -> Priority {
        self.config
            .default_priority
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn default_category(&self) -> String {
        self.config
            .default_category
            .clone()
            .unwrap_or_else(|| DEFAULT_CATEGORY_NAME.to_string())
    }

    pub fn missed_reminder_policy(&self) -> MissedReminderPolicy {
        self.config
            .missed_reminders
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.poll_seconds.unwrap_or(DEFAULT_POLL_SECONDS))
    }

    pub fn create_storage(&self) -> Result<Box<dyn Storage>, ConfigError> {
        Ok(storage::create_storage(self.storage_type(), &self.storage_path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_in_temp_dir() -> (ConfigManager, TempDir) {
        let temp_dir = tempfile::Builder::new()
            .prefix("taskflow_config")
            .tempdir()
            .expect("Failed to create temporary directory");
        let manager = ConfigManager::new(Some(&temp_dir.path().join("config.json")))
            .expect("Failed to create config manager");
        (manager, temp_dir)
    }

    #[test]
    fn test_set_then_unset_each_key() {
        let (mut manager, temp_dir) = manager_in_temp_dir();

        assert!(manager.set("storage.type", "sqlite").is_ok());
        assert_eq!(manager.get("storage.type").unwrap(), Some("sqlite".to_string()));

        let storage_path = temp_dir.path().join("tasks.json");
        assert!(manager.set("storage.path", storage_path.to_str().unwrap()).is_ok());
        assert_eq!(manager.storage_path(), storage_path);

        assert!(manager.set("default-category", "Work").is_ok());
        assert_eq!(manager.default_category(), "Work");

        assert!(manager.set("default-priority", "HIGH").is_ok());
        assert_eq!(manager.get("default-priority").unwrap(), Some("high".to_string()));
        assert_eq!(manager.default_priority(), Priority::High);

        assert!(manager.set("reminders.missed", "fire").is_ok());
        assert_eq!(manager.missed_reminder_policy(), MissedReminderPolicy::Fire);

        assert!(manager.set("reminders.poll-seconds", "5").is_ok());
        assert_eq!(manager.poll_interval(), Duration::from_secs(5));

        assert!(manager.unset("default-category").is_ok());
        assert_eq!(manager.get("default-category").unwrap(), None);
        assert_eq!(manager.default_category(), DEFAULT_CATEGORY_NAME);
    }

    #[test]
    fn test_unset_keys_use_defaults() {
        let (manager, temp_dir) = manager_in_temp_dir();

        assert_eq!(manager.storage_type(), StorageType::Json);
        assert_eq!(manager.storage_path(), temp_dir.path().join("data.json"));
        assert_eq!(manager.default_priority(), Priority::Medium);
        assert_eq!(manager.missed_reminder_policy(), MissedReminderPolicy::Drop);
        assert_eq!(manager.poll_interval(), Duration::from_secs(30));
        assert_eq!(manager.get("storage.type").unwrap(), None);
        assert_eq!(manager.effective("storage.type").unwrap(), "json");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let (mut manager, temp_dir) = manager_in_temp_dir();

        assert!(matches!(
            manager.set("storage.type", "csv"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("default-priority", "urgent"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("reminders.poll-seconds", "0"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("reminders.missed", "later"),
            Err(ConfigError::InvalidConfig(_))
        ));
        let missing = temp_dir.path().join("missing").join("data.json");
        assert!(matches!(
            manager.set("storage.path", missing.to_str().unwrap()),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("colour", "blue"),
            Err(ConfigError::InvalidKey(_))
        ));
        assert!(matches!(manager.get("colour"), Err(ConfigError::InvalidKey(_))));
        assert!(matches!(manager.unset("colour"), Err(ConfigError::InvalidKey(_))));

        assert_eq!(manager.config(), &Config::default());
    }

    #[test]
    fn test_list_marks_defaults() {
        let (mut manager, _temp_dir) = manager_in_temp_dir();
        manager.set("default-priority", "low").unwrap();

        let list = manager.list().unwrap();
        assert_eq!(list.len(), KEYS.len());

        let entry = |key: &str| list.iter().find(|(k, _, _)| k == key).cloned().unwrap();
        assert_eq!(entry("default-priority"), ("default-priority".to_string(), "low".to_string(), false));
        assert_eq!(entry("storage.type"), ("storage.type".to_string(), "json".to_string(), true));
        assert!(entry("storage.path").1.ends_with("data.json"));
        assert_eq!(entry("reminders.missed").1, "drop");
    }

    #[test]
    fn test_settings_persist_across_instances() {
        let (mut manager, temp_dir) = manager_in_temp_dir();
        manager.set("storage.type", "sqlite").unwrap();
        drop(manager);

        let reopened = ConfigManager::new(Some(&temp_dir.path().join("config.json"))).unwrap();
        assert_eq!(reopened.storage_type(), StorageType::Sqlite);
        assert_eq!(reopened.storage_path(), temp_dir.path().join("data.db"));
    }

    #[test]
    fn test_invalid_entry_in_file_keeps_other_settings() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_file = temp_dir.path().join("config.json");
        let data_file = temp_dir.path().join("elsewhere.json");
        std::fs::write(
            &config_file,
            serde_json::json!({
                "storage_path": data_file.to_str().unwrap(),
                "default_priority": "urgent",
                "default_category": "Work",
            })
            .to_string(),
        )
        .unwrap();

        let manager = ConfigManager::new(Some(&config_file)).unwrap();
        assert_eq!(manager.storage_path(), data_file);
        assert_eq!(manager.default_category(), "Work");
        assert_eq!(manager.get("default-priority").unwrap(), None);
        assert_eq!(manager.default_priority(), Priority::Medium);
    }

    #[test]
    fn test_create_storage_uses_configured_backend() {
        let (mut manager, temp_dir) = manager_in_temp_dir();
        manager.set("storage.type", "sqlite").unwrap();

        let storage = manager.create_storage().unwrap();
        storage.save(&crate::models::StorageData::new()).unwrap();
        assert!(temp_dir.path().join("data.db").exists());
    }
}
