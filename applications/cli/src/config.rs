//! Player configuration

use crate::error::{CliError, Result};
use encore_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "encore.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub catalog: CatalogSettings,

    #[serde(default)]
    pub player: PlayerSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CatalogSettings {
    /// JSON catalog file
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlayerSettings {
    /// How often the player checks for the end of the current track
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Assumed bitrate used to estimate durations of undecoded sources
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            bitrate_kbps: default_bitrate_kbps(),
        }
    }
}

impl PlayerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// Reads `path` if given (it must exist), otherwise `encore.toml` when
    /// present. `ENCORE_`-prefixed variables override file values, with `__`
    /// between nested keys (`ENCORE_PLAYBACK__CACHE_CAPACITY=8`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("ENCORE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.playback.validate()?;

        if self.player.poll_interval_ms == 0 {
            return Err(CliError::Config(
                "player.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.player.bitrate_kbps == 0 {
            return Err(CliError::Config(
                "player.bitrate_kbps must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("catalog.json")
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_bitrate_kbps() -> u32 {
    128
}
