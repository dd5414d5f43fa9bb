//! Application configuration: defaults, optional TOML file, environment.

use crate::error::{Result, StoreError};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_NAME: &str = "medimate";
/// Environment prefix, e.g. `MEDIMATE_DATA_DIR`.
pub const ENV_PREFIX: &str = "MEDIMATE";
/// Credential variable read as a fallback when no key is configured.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub google_api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_embedding_base_url")]
    pub embedding_base_url: String,

    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_embedding_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            google_api_key: None,
            embedding_model: default_embedding_model(),
            embedding_base_url: default_embedding_base_url(),
            request_timeout_secs: default_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// With `path`, that TOML file must exist. Without it, `medimate.toml`
    /// in the working directory is used if present. `MEDIMATE_*` variables
    /// override file values, and `GOOGLE_API_KEY` fills in a missing key.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to build config: {}", e)))?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| StoreError::Config(format!("Failed to deserialize config: {}", e)))?;

        if config.api_key().is_none() {
            config.google_api_key = std::env::var(API_KEY_ENV).ok();
        }

        Ok(config)
    }

    /// The API key, treating an empty string as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.google_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Directory holding one JSON file per namespace.
    pub fn vectors_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.vectors_dir(), PathBuf::from("data").join("vectors"));
        assert_eq!(config.embedding_model, "text-embedding-004");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_blank_key_is_absent() {
        let config = AppConfig {
            google_api_key: Some("   ".to_string()),
            ..AppConfig::default()
        };
        assert!(config.api_key().is_none());

        let config = AppConfig {
            google_api_key: Some("abc".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(config.api_key(), Some("abc"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("medimate.toml");
        fs::write(
            &path,
            "data_dir = \"/srv/medimate\"\ngoogle_api_key = \"from-file\"\nrequest_timeout_secs = 5\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/medimate"));
        assert_eq!(config.api_key(), Some("from-file"));
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.embedding_model, "text-embedding-004");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = AppConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(StoreError::Config(_))));
    }
}
