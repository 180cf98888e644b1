//! Error types for playback management

use encore_core::TrackId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a platform resource
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ResourceError(pub String);

impl ResourceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Loader failure
///
/// `Clone` so that every caller coalesced onto one load receives the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Source could not be fetched or decoded
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Resource did not become ready in time
    #[error("Load timed out after {0:?}")]
    Timeout(Duration),

    /// Loader was closed while the load was pending
    #[error("Loader closed")]
    Closed,
}

/// Playback errors
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PlaybackError {
    /// Source could not be fetched or decoded after all attempts
    #[error("Track {track_id} unavailable: {reason}")]
    ResourceUnavailable { track_id: TrackId, reason: String },

    /// Every attempt timed out
    #[error("Track {track_id} did not load within {after:?}")]
    Timeout { track_id: TrackId, after: Duration },

    /// Play call failed on a ready resource
    #[error("Playback of {track_id} rejected: {reason}")]
    PlaybackRejected { track_id: TrackId, reason: String },

    /// Track is not in the current queue
    #[error("Track not in queue: {0}")]
    NotFound(TrackId),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PlaybackError {
    /// Attach a track to a loader failure
    pub fn from_load(track_id: TrackId, err: LoadError) -> Self {
        match err {
            LoadError::ResourceUnavailable(reason) => Self::ResourceUnavailable { track_id, reason },
            LoadError::Timeout(after) => Self::Timeout { track_id, after },
            LoadError::Closed => Self::ResourceUnavailable {
                track_id,
                reason: LoadError::Closed.to_string(),
            },
        }
    }

    /// Track the error concerns, if any
    pub fn track_id(&self) -> Option<&TrackId> {
        match self {
            Self::ResourceUnavailable { track_id, .. }
            | Self::Timeout { track_id, .. }
            | Self::PlaybackRejected { track_id, .. }
            | Self::NotFound(track_id) => Some(track_id),
            Self::InvalidConfig(_) => None,
        }
    }

    /// User-facing message for this error
    pub fn notification(&self) -> Notification {
        match self {
            Self::Timeout { .. } => Notification::new(
                "Loading timeout",
                "The song is taking too long to load. Please try again.",
            ),
            Self::ResourceUnavailable { .. } => Notification::new(
                "Loading error",
                "Unable to load this song. Please try again.",
            ),
            Self::PlaybackRejected { .. } => Notification::new(
                "Playback error",
                "Unable to play this song. Please try again.",
            ),
            Self::NotFound(_) => Notification::new(
                "Song unavailable",
                "This song is not part of the current list.",
            ),
            Self::InvalidConfig(msg) => Notification::new("Configuration error", msg.clone()),
        }
    }
}

/// Toast-style message for the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
