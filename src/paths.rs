//! Application path management for portable and installed modes.
//!
//! - **Portable mode**: a `.portable` marker file next to the executable keeps
//!   every data file in that directory.
//! - **Installed mode** (default): data lives in the per-user config
//!   directory (`%APPDATA%\midi-mapper`, `~/.config/midi-mapper`, ...).

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::persistence::PROFILES_FILENAME;

/// Application name used for directories in installed mode
const APP_NAME: &str = "midi-mapper";

/// Application paths for config, profiles, and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the application config file
    pub config: PathBuf,
    /// Path to the device profiles document
    pub profiles: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether running in portable mode (files next to exe)
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialized, so nothing here is logged above
    /// debug level.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        if exe_dir.join(".portable").exists() {
            return Self::in_dir(exe_dir, true);
        }

        let base = dirs::config_dir().unwrap_or(exe_dir).join(APP_NAME);
        Self::in_dir(base, false)
    }

    /// Lay out every file under `base`
    pub fn in_dir(base: impl Into<PathBuf>, is_portable: bool) -> Self {
        let base = base.into();
        Self {
            config: base.join("config.yaml"),
            profiles: base.join(PROFILES_FILENAME),
            logs_dir: base.join("logs"),
            is_portable,
        }
    }

    /// Get the base directory (for displaying in logs)
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Ensure the base and logs directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [self.base_dir(), self.logs_dir.clone()] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}
