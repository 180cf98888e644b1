//! CLI error types

use encore_core::CoreError;
use encore_playback::PlaybackError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CoreError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Nothing to play: {0}")]
    EmptyQueue(String),
}

impl From<config::ConfigError> for CliError {
    fn from(err: config::ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}
