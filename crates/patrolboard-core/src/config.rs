//! TOML-based application configuration.
//!
//! Stores the board's connection settings:
//! - Base URL and client id for the scoring service
//! - Token file location
//! - Realtime channel toggle
//! - Log filter
//!
//! Configuration is stored at `~/.config/patrolboard/config.toml`.
//! Environment variables override the file for the common knobs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::error::ConfigError;

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/patrolboard/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Base URL of the scoring service.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Client identifier presented during device authorization.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Where the bearer token is persisted between runs.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    /// Whether to bring up the realtime push channel after the first
    /// successful fetch.
    #[serde(default = "default_true")]
    pub realtime_enabled: bool,
    /// Default tracing filter, overridable via RUST_LOG.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            client_id: default_client_id(),
            token_file: default_token_file(),
            realtime_enabled: true,
            log_filter: default_log_filter(),
        }
    }
}

impl BoardConfig {
    /// Path of the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join("patrolboard").join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when the file does
    /// not exist, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
                path: path.clone(),
                message: e.to_string(),
            })?;
            toml::from_str(&text).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            })?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Write the configuration to the config file, creating parent
    /// directories as needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed {
                path: path.clone(),
                message: e.to_string(),
            })?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, text).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Environment overrides for deployments that never touch the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PATROLBOARD_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Ok(v) = std::env::var("PATROLBOARD_CLIENT_ID") {
            self.client_id = v;
        }
        if let Ok(v) = std::env::var("PATROLBOARD_TOKEN_FILE") {
            self.token_file = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PATROLBOARD_REALTIME") {
            self.realtime_enabled = v != "false" && v != "0";
        }
    }

    /// Derive the push-channel endpoint from the API base URL
    /// (`http` -> `ws`, `https` -> `wss`, path `/ws/device`).
    pub fn realtime_url(&self) -> Result<Option<Url>, ConfigError> {
        if !self.realtime_enabled {
            return Ok(None);
        }
        let base = self
            .api_base_url
            .trim_end_matches('/')
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        let url = Url::parse(&format!("{base}/ws/device")).map_err(|e| {
            ConfigError::InvalidValue {
                key: "api_base_url".into(),
                message: e.to_string(),
            }
        })?;
        Ok(Some(url))
    }
}

// Default functions
fn default_api_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_client_id() -> String {
    "patrolboard".to_string()
}
fn default_token_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("patrolboard")
        .join("token.txt")
}
fn default_log_filter() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
