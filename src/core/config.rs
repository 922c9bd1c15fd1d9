use crate::core::filter::DateFilter;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_firestore_url")]
    pub firestore_url: String,
}

fn default_auth_url() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_token_url() -> String {
    "https://securetoken.googleapis.com".to_string()
}

fn default_firestore_url() -> String {
    "https://firestore.googleapis.com".to_string()
}

/// Where transactions, profiles and audit records are kept.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Nothing survives the process.
    Memory,
    /// An embedded database under the data path.
    #[default]
    Local,
    Firebase(FirebaseConfig),
}

fn default_user() -> String {
    "local".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    /// Owner of the transactions on the memory and local backends.
    #[serde(default = "default_user")]
    pub user: String,
    pub data_path: Option<String>,
    /// Window used by `summary` and `analytics` when none is given.
    #[serde(default)]
    pub filter: DateFilter,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fintrack", "fintrack")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "fintrack", "fintrack")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!(backend = ?config.backend, "Successfully loaded config");
        Ok(config)
    }
}
