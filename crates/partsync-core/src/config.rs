//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/partsync/config.toml)
//! 3. Environment variables (PARTSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::models::{DocumentId, TranscriptionId};
use crate::store::StoreSettings;

/// Environment variable prefix
const ENV_PREFIX: &str = "PARTSYNC";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the transcription server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Document whose parts are edited
    #[serde(default)]
    pub document_id: Option<DocumentId>,

    /// Transcription layer shown by default
    #[serde(default)]
    pub transcription: Option<TranscriptionId>,

    /// CSRF token sent with every mutating request
    #[serde(default)]
    pub csrf_token: Option<String>,

    /// Session cookie of a logged in user
    #[serde(default)]
    pub session_id: Option<String>,

    /// Quiet period before masks are recomputed
    #[serde(default = "default_mask_window_ms")]
    pub mask_window_ms: u64,

    /// Quiet period before the reading order is recomputed
    #[serde(default = "default_ordering_window_ms")]
    pub ordering_window_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Store events buffered per subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Log level used when no --verbose flag is given
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            document_id: None,
            transcription: None,
            csrf_token: None,
            session_id: None,
            mask_window_ms: default_mask_window_ms(),
            ordering_window_ms: default_ordering_window_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            event_capacity: default_event_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (PARTSYNC_SERVER_URL, PARTSYNC_DOCUMENT, ...)
    /// 2. Config file (~/.config/partsync/config.toml or PARTSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // PARTSYNC_SERVER_URL
        if let Ok(val) = std::env::var(format!("{}_SERVER_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.server_url = val;
            }
        }

        // PARTSYNC_DOCUMENT
        if let Some(val) = env_id("DOCUMENT") {
            self.document_id = val;
        }

        // PARTSYNC_TRANSCRIPTION
        if let Some(val) = env_id("TRANSCRIPTION") {
            self.transcription = val;
        }

        // PARTSYNC_CSRF_TOKEN
        if let Ok(val) = std::env::var(format!("{}_CSRF_TOKEN", ENV_PREFIX)) {
            self.csrf_token = if val.is_empty() { None } else { Some(val) };
        }

        // PARTSYNC_SESSION_ID
        if let Ok(val) = std::env::var(format!("{}_SESSION_ID", ENV_PREFIX)) {
            self.session_id = if val.is_empty() { None } else { Some(val) };
        }
    }

    /// Get the config file path
    ///
    /// Can be overridden with PARTSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("partsync")
            .join("config.toml")
    }

    /// Settings for a `PartStore` built from this configuration
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            mask_window: Duration::from_millis(self.mask_window_ms),
            ordering_window: Duration::from_millis(self.ordering_window_ms),
            event_capacity: self.event_capacity,
        }
    }

    /// Copy with credentials masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        Self {
            csrf_token: mask(&self.csrf_token),
            session_id: mask(&self.session_id),
            ..self.clone()
        }
    }
}

/// Read an id override; `Some(None)` clears it, invalid values are ignored
fn env_id(suffix: &str) -> Option<Option<u64>> {
    let name = format!("{}_{}", ENV_PREFIX, suffix);
    let val = std::env::var(&name).ok()?;
    if val.is_empty() {
        return Some(None);
    }
    match val.parse() {
        Ok(id) => Some(Some(id)),
        Err(_) => {
            warn!("Ignoring {}: '{}' is not a numeric id", name, val);
            None
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_mask_window_ms() -> u64 {
    1500
}

fn default_ordering_window_ms() -> u64 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_event_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}
