use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DB_ENV: &str = "TIMEDB_DBFILE";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    // Store location; `~/.timedatabase` when unset
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub language: String,
    // Colourise dump/search lines
    pub color: bool,
    // strftime pattern for the local start time
    pub time_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            language: "auto".to_string(),
            color: true,
            time_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl Config {
    /// Loads `~/.timedb/config.toml`, writing the defaults there on first use.
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            if let Err(e) = config.save_to(&config_path) {
                warn!("cannot write default config to {}: {e:#}", config_path.display());
            }
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(config_dir) = path.parent() {
            fs::create_dir_all(config_dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn get_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".timedb")
            .join("config.toml")
    }

    /// Store path: flag, then `TIMEDB_DBFILE`, then the config file, then
    /// `~/.timedatabase`.
    pub fn resolve_db_path(&self, flag: Option<PathBuf>) -> PathBuf {
        let env = std::env::var_os(DB_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        flag.or(env)
            .or_else(|| self.storage.db_path.clone())
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".timedatabase")
            })
    }

    pub fn get_effective_language(&self) -> String {
        if self.display.language == "auto" {
            // Try to get system language
            std::env::var("LANG")
                .unwrap_or_else(|_| "en_US".to_string())
                .split('.')
                .next()
                .unwrap_or("en")
                .to_string()
        } else {
            self.display.language.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[storage]\ndb_path = \"/tmp/history\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.storage.db_path, Some(PathBuf::from("/tmp/history")));
        assert!(config.display.color);
        assert_eq!(config.display.time_format, "%Y-%m-%d %H:%M:%S");
    }

    #[test]
    fn saved_defaults_load_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::default().save_to(&path).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.display.language, "auto");
        assert!(config.storage.db_path.is_none());
    }

    #[test]
    fn flag_wins_over_config() {
        let mut config = Config::default();
        config.storage.db_path = Some(PathBuf::from("/from/config"));
        let flag = PathBuf::from("/from/flag");
        assert_eq!(config.resolve_db_path(Some(flag.clone())), flag);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "storage = 3").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
