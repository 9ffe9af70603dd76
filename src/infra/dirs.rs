//! Config directory resolution
//!
//! - `AZDO_CONFIG_DIR` wins when set
//! - otherwise `$XDG_CONFIG_HOME/azdo`
//! - on Windows `%AppData%/AzDO CLI`
//! - otherwise `$HOME/.config/azdo`

use std::path::PathBuf;

use crate::config::env::{EnvVars, AZDO_CONFIG_DIR};

/// Application directory name on Unix-like systems
const APP_NAME: &str = "azdo";

/// Application directory name under `%AppData%`
const WINDOWS_APP_NAME: &str = "AzDO CLI";

/// Config file name
const CONFIG_FILE: &str = "config.yml";

/// Plaintext credentials file name
const CREDENTIALS_FILE: &str = "credentials.yml";

/// Platform-specific directory provider for azdo
#[derive(Debug, Clone)]
pub struct AzdoDirs {
    config_dir: PathBuf,
}

impl AzdoDirs {
    /// Resolve directories from an environment snapshot
    #[must_use]
    pub fn from_env(env: &EnvVars) -> Self {
        Self {
            config_dir: Self::resolve_config_dir(env),
        }
    }

    /// Use an explicit config directory
    #[must_use]
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// The config directory
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Path of `config.yml`
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Path of the plaintext `credentials.yml`
    #[must_use]
    pub fn credentials_path(&self) -> PathBuf {
        self.config_dir.join(CREDENTIALS_FILE)
    }

    fn resolve_config_dir(env: &EnvVars) -> PathBuf {
        if let Some(path) = env.get(AZDO_CONFIG_DIR) {
            return PathBuf::from(path);
        }
        if let Some(xdg) = env.get("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_NAME);
        }
        if cfg!(windows) {
            if let Some(app_data) = env.get("AppData") {
                return PathBuf::from(app_data).join(WINDOWS_APP_NAME);
            }
        }
        env.get("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .map(|h| h.join(".config").join(APP_NAME))
            .unwrap_or_else(|| PathBuf::from(".").join(".config").join(APP_NAME))
    }
}
