//! Application settings and configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::jellyfin::DeviceIdentity;
use crate::mpv::MpvConfig;
use crate::player::PlayerOptions;
use crate::session::SessionConfig;

const CONFIG_LOG_TARGET: &str = "r_jellyshim::config";

/// Application settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Jellyfin server URL
    pub server_url: String,
    /// Access token (optional if using username/password)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Username for Jellyfin login
    #[serde(default)]
    pub username: Option<String>,
    /// User ID for Jellyfin requests
    #[serde(default)]
    pub user_id: Option<String>,
    /// Stable identifier the server uses to recognise this device across restarts
    #[serde(default)]
    pub device_id: Option<String>,
    /// Name shown in the server's cast menu
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_mpv_path")]
    pub mpv_path: String,
    /// Extra arguments appended to every mpv launch
    #[serde(default)]
    pub mpv_args: Vec<String>,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
    #[serde(default = "default_capabilities_interval_secs")]
    pub capabilities_interval_secs: u64,
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,
}

fn default_device_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "r-jellyshim".to_string())
}

fn default_mpv_path() -> String {
    "mpv".to_string()
}

fn default_progress_interval_secs() -> u64 {
    5
}

fn default_capabilities_interval_secs() -> u64 {
    300
}

fn default_reconnect_max_attempts() -> u32 {
    10
}

/// Error types for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server_url: "http://localhost:8096".to_string(),
            api_key: None,
            username: None,
            user_id: None,
            device_id: None,
            device_name: default_device_name(),
            mpv_path: default_mpv_path(),
            mpv_args: Vec::new(),
            fullscreen: false,
            progress_interval_secs: default_progress_interval_secs(),
            capabilities_interval_secs: default_capabilities_interval_secs(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
        }
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(target: CONFIG_LOG_TARGET, "No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        debug!(target: CONFIG_LOG_TARGET, "Saved settings to {}", path.display());
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("jellyshim").join("config.json")
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.is_empty() {
            return Err(ConfigError::ValidationError("Server URL cannot be empty".to_string()));
        }
        if url::Url::parse(&self.server_url).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Server URL is not a valid URL: {}",
                self.server_url
            )));
        }

        if self.api_key.is_none() && self.username.is_none() {
            return Err(ConfigError::ValidationError(
                "Either API key or username must be provided".to_string(),
            ));
        }

        if self.mpv_path.is_empty() {
            return Err(ConfigError::ValidationError("mpv path cannot be empty".to_string()));
        }
        if self.progress_interval_secs == 0 || self.capabilities_interval_secs == 0 {
            return Err(ConfigError::ValidationError("Intervals must be at least one second".to_string()));
        }
        if self.reconnect_max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect_max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Generates a device id if none is stored yet. Returns true when one was created.
    pub fn ensure_device_id(&mut self) -> bool {
        match &self.device_id {
            Some(id) if !id.is_empty() => false,
            _ => {
                let id = Uuid::new_v4().simple().to_string();
                info!(target: CONFIG_LOG_TARGET, "Generated new device id {}", id);
                self.device_id = Some(id);
                true
            }
        }
    }

    /// Identity sent with every request. Call [`ensure_device_id`](Self::ensure_device_id) first.
    pub fn device_identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.device_id.as_deref().unwrap_or_default(), &self.device_name)
    }

    pub fn mpv_config(&self) -> MpvConfig {
        MpvConfig {
            binary: self.mpv_path.clone(),
            extra_args: self.mpv_args.clone(),
            ..MpvConfig::default()
        }
    }

    pub fn player_options(&self) -> PlayerOptions {
        PlayerOptions {
            progress_interval: Duration::from_secs(self.progress_interval_secs.max(1)),
            fullscreen: self.fullscreen,
            ..PlayerOptions::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            mpv: self.mpv_config(),
            player: self.player_options(),
            capabilities_interval: Duration::from_secs(self.capabilities_interval_secs.max(1)),
            reconnect_max_attempts: self.reconnect_max_attempts.max(1),
        }
    }
}
