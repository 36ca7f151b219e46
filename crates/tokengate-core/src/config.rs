//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the backend base URL, request timeout, keychain service
//! name and the last email used to log in.
//!
//! Configuration is stored at `~/.config/tokengate/config.json`.
//! `API_BASE_URL` and `TOKENGATE_TIMEOUT_SECS` override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::credentials::DEFAULT_SERVICE_NAME;

/// Application name used for config directory paths
const APP_NAME: &str = "tokengate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// HTTP request timeout in seconds.
/// Generous enough for a mobile connection; a timeout surfaces as a
/// connectivity failure.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const BASE_URL_ENV: &str = "API_BASE_URL";
const TIMEOUT_ENV: &str = "TOKENGATE_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub keyring_service: Option<String>,
    pub last_email: Option<String>,
}

/// Everything the shared client and store need, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub keyring_service: String,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            keyring_service: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.is_empty()) {
            self.api_base_url = Some(url);
        }
        if let Some(secs) = lookup(TIMEOUT_ENV) {
            let secs = secs
                .parse()
                .with_context(|| format!("{} must be a number of seconds", TIMEOUT_ENV))?;
            self.request_timeout_secs = Some(secs);
        }
        Ok(())
    }

    pub fn client_settings(&self) -> Result<ClientSettings> {
        let base_url = self.api_base_url.clone().ok_or_else(|| {
            anyhow::anyhow!("No API base URL configured (set {} or api_base_url)", BASE_URL_ENV)
        })?;
        Ok(ClientSettings {
            base_url,
            timeout: Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            keyring_service: self
                .keyring_service
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
        })
    }
}
