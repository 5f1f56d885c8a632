//! Application configuration
//!
//! Loaded from an optional YAML file; every field has a default so a missing
//! file means "run with defaults".

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Override for the profiles document location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles_path: Option<PathBuf>,
    /// Number of received messages kept in the log buffer
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    /// Device activated when the shell starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_device: Option<String>,
    /// How often the monitor drains the log buffer
    #[serde(default = "default_monitor_poll_ms")]
    pub monitor_poll_ms: u64,
    /// MIDI client name announced to the driver
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

fn default_log_capacity() -> usize {
    10
}

fn default_monitor_poll_ms() -> u64 {
    50
}

fn default_client_name() -> String {
    "midi-mapper".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profiles_path: None,
            log_capacity: default_log_capacity(),
            default_device: None,
            monitor_poll_ms: default_monitor_poll_ms(),
            client_name: default_client_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load the file if it exists, defaults otherwise
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate YAML contents
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.log_capacity == 0 {
            anyhow::bail!("log_capacity must be at least 1");
        }
        if self.monitor_poll_ms == 0 {
            anyhow::bail!("monitor_poll_ms must be at least 1");
        }
        if self.client_name.trim().is_empty() {
            anyhow::bail!("client_name cannot be empty");
        }
        if let Some(device) = &self.default_device {
            if device.trim().is_empty() {
                anyhow::bail!("default_device cannot be empty");
            }
        }
        Ok(())
    }
}
