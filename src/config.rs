// TOML configuration for the clip store

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::gateway::StorageGateway;
use crate::storage::{get_default_db_path, DatabaseManager, StorageError, StorageResult};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct DatabaseConfig {
    /// Defaults to the platform data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_page_size() -> u32 {
    crate::storage::settings::DEFAULT_PAGE_SIZE
}

fn default_log_filter() -> String {
    "clip_store_lib=info".to_string()
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl StoreConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = toml::from_str(content)?;
        if config.pagination.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "pagination.default_page_size must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn resolve_db_path(&self) -> StorageResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => get_default_db_path(),
        }
    }

    /// Open the database and build a gateway over it
    pub fn open_gateway(&self) -> Result<StorageGateway, ConfigError> {
        let db = DatabaseManager::new(self.resolve_db_path()?)?;
        Ok(StorageGateway::new(Arc::new(db))
            .with_default_page_size(self.pagination.default_page_size))
    }
}
