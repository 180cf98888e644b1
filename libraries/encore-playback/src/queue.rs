//! Playback queue
//!
//! The ordered tracks currently eligible for next/previous navigation: the
//! list the user is browsing or the active playlist. Replaced wholesale when
//! the user switches context; never merged or diffed.

use encore_core::{Track, TrackId};

#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
}

impl Queue {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Index of the first occurrence of `track_id`
    pub fn position(&self, track_id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == track_id)
    }

    pub fn track(&self, track_id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == track_id)
    }

    pub fn contains(&self, track_id: &TrackId) -> bool {
        self.position(track_id).is_some()
    }

    pub fn ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id.clone()).collect()
    }
}

impl From<Vec<Track>> for Queue {
    fn from(tracks: Vec<Track>) -> Self {
        Self::new(tracks)
    }
}
