use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::discord::DiscordConfig;
use crate::watcher::DEFAULT_TICK_DELAY;

const SETTINGS_FILE: &str = "settings.json";
const APP_DIR: &str = "discord-party";

/// Overrides `client_id` from the settings file
pub const CLIENT_ID_ENV: &str = "DISCORD_PARTY_CLIENT_ID";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid Discord client id: {0}")]
    InvalidClientId(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// ID of the Discord application
    pub client_id: i64,
    /// How often the join watcher polls and calls back
    pub tick_delay_ms: u64,
    /// Interval for the optional background update loop
    pub update_interval_ms: u64,
    pub handshake_timeout_secs: u64,
    /// Give up waiting for a join after this long; wait forever when unset
    pub max_wait_secs: Option<u64>,
    /// Fail instead of running detached when Discord is not reachable
    pub raise_on_fail: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_id: 0,
            tick_delay_ms: DEFAULT_TICK_DELAY.as_millis() as u64,
            update_interval_ms: 15_000,
            handshake_timeout_secs: 10,
            max_wait_secs: None,
            raise_on_fail: false,
        }
    }
}

impl Settings {
    /// Where settings live when no path is given
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(SETTINGS_FILE)
    }

    /// Load settings from `path`, falling back to defaults when the file is missing
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        tracing::debug!("Loading settings from {}", path.display());

        let mut settings = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Ok(value) = std::env::var(CLIENT_ID_ENV) {
            settings.apply_client_id(&value)?;
        }

        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        tracing::debug!("Saving settings to {}", path.display());
        let io_error = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).map_err(io_error)
    }

    /// Parse and apply a client id given as text (e.g. from the environment)
    pub fn apply_client_id(&mut self, value: &str) -> Result<(), SettingsError> {
        self.client_id = value
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidClientId(value.to_string()))?;
        Ok(())
    }

    pub fn discord_config(&self) -> DiscordConfig {
        DiscordConfig {
            app_id: self.client_id,
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
        }
    }

    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_delay_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_secs.map(Duration::from_secs)
    }
}
