//! Core types for playback management

use crate::error::{PlaybackError, Result};
use encore_core::TrackId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback state
///
/// One per session. `Loading`, `Playing` and `Paused` name the active track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing selected yet
    #[default]
    Idle,

    /// Acquiring a resource for the track
    Loading(TrackId),

    /// Currently playing
    Playing(TrackId),

    /// Paused mid-track
    Paused(TrackId),

    /// Reached the end of the queue
    Ended,

    /// Last load or play attempt failed
    Error {
        track_id: TrackId,
        reason: PlaybackError,
    },
}

impl PlaybackState {
    /// Track in focus, if any
    pub fn active_track(&self) -> Option<&TrackId> {
        match self {
            Self::Loading(id) | Self::Playing(id) | Self::Paused(id) => Some(id),
            Self::Idle | Self::Ended | Self::Error { .. } => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }
}

/// Configuration for the playback session
///
/// Loader constants are configuration, not invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Maximum preloaded tracks kept in memory (default: 5)
    pub cache_capacity: usize,

    /// Per-attempt load deadline in milliseconds (default: 10000)
    pub load_timeout_ms: u64,

    /// Total load attempts before giving up (default: 3)
    pub max_retries: u32,

    /// Pause between attempts in milliseconds (default: 2000)
    pub retry_delay_ms: u64,

    /// Warm the cache with queue neighbours after a track starts (default: true)
    pub preload_neighbors: bool,

    /// Initial volume (0-100, default: 80)
    pub volume: u8,

    /// Initial shuffle flag (default: false)
    pub shuffle: bool,

    /// Initial repeat flag (default: false)
    pub repeat: bool,

    /// Buffered events per subscriber (default: 100)
    pub event_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 5,
            load_timeout_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 2_000,
            preload_neighbors: true,
            volume: 80,
            shuffle: false,
            repeat: false,
            event_capacity: 100,
        }
    }
}

impl PlaybackConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(PlaybackError::InvalidConfig(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(PlaybackError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.load_timeout_ms == 0 {
            return Err(PlaybackError::InvalidConfig(
                "load_timeout_ms must be positive".to_string(),
            ));
        }
        if self.volume > 100 {
            return Err(PlaybackError::InvalidConfig(format!(
                "volume must be 0-100, got {}",
                self.volume
            )));
        }
        if self.event_capacity == 0 {
            return Err(PlaybackError::InvalidConfig(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Elapsed and total time of the active track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub elapsed: Duration,
    /// Unknown until the resource reports it
    pub duration: Option<Duration>,
}

impl Progress {
    /// Position as a fraction of the duration, clamped to 0..=1
    pub fn fraction(&self) -> f64 {
        match self.duration {
            Some(total) if !total.is_zero() => {
                (self.elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// "elapsed / total" for display
    pub fn label(&self) -> String {
        format!(
            "{} / {}",
            format_time(self.elapsed),
            self.duration.map(format_time).unwrap_or_else(|| "0:00".to_string())
        )
    }
}

/// Format a duration as `m:ss`
pub fn format_time(time: Duration) -> String {
    let total = time.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}
