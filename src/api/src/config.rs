//! Configuration for the F1 statistics API.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ingest::LoadOptions;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/f1db.sqlite")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Directory holding the dataset CSV files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_error_sample_limit")]
    pub error_sample_limit: usize,
    #[serde(default = "default_error_message_max_len")]
    pub error_message_max_len: usize,
    /// Rows between progress log lines (0 disables)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/kaggle")
}

fn default_error_sample_limit() -> usize {
    10
}

fn default_error_message_max_len() -> usize {
    200
}

fn default_progress_interval() -> usize {
    1000
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            error_sample_limit: default_error_sample_limit(),
            error_message_max_len: default_error_message_max_len(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl LoaderConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            error_sample_limit: self.error_sample_limit,
            error_message_max_len: self.error_message_max_len,
            progress_interval: self.progress_interval,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (F1DB_DATABASE__PATH, etc.)
            .add_source(
                config::Environment::with_prefix("F1DB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
