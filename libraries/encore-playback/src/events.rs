//! Playback Events
//!
//! Change notifications for the UI layer. Events are emitted at key points:
//! - State transitions (loading, playing, paused, ended, error)
//! - Track changes
//! - Shuffle/repeat/volume changes
//! - Queue replacement
//!
//! Delivered over a `tokio::sync::broadcast` channel. A subscriber that falls
//! behind loses the oldest events; `PlaybackSession::current_state` is always
//! authoritative.

use crate::error::Notification;
use crate::types::PlaybackState;
use encore_core::TrackId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Playback state changed
    StateChanged {
        /// The new playback state
        state: PlaybackState,
    },

    /// Active track changed
    TrackChanged {
        /// ID of the new (current) track
        track_id: TrackId,
        /// ID of the previous track (if any)
        previous_track_id: Option<TrackId>,
    },

    /// Shuffle toggled
    ShuffleChanged {
        enabled: bool,
    },

    /// Repeat toggled
    RepeatChanged {
        enabled: bool,
    },

    /// Queue replaced
    QueueChanged {
        /// New queue length
        length: usize,
    },

    /// Volume changed
    VolumeChanged {
        /// New volume level (0-100)
        level: u8,
        /// Whether audio is muted
        is_muted: bool,
    },

    /// A load or play attempt failed
    Error {
        /// Track the failure concerns
        track_id: TrackId,
        /// Message for the user
        notification: Notification,
    },
}

/// Sending half of the session's event channel
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<PlaybackEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.tx.subscribe()
    }
}
