//! Collaborator traits for Encore
//!
//! The catalog and playlist stores are external services. The playback engine
//! only consumes their read side.

use crate::error::Result;
use crate::types::{PlaylistId, Track, TrackFilter, TrackId};
use async_trait::async_trait;
use std::collections::HashMap;

/// Song catalog
///
/// Implementers return immutable `Track` records. No pagination is required.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// List every track in the catalog
    ///
    /// # Errors
    /// Returns an error if the catalog backend cannot be read
    async fn list_tracks(&self) -> Result<Vec<Track>>;

    /// List tracks passing `filter`
    ///
    /// The default implementation filters `list_tracks` in memory.
    ///
    /// # Errors
    /// Returns an error if the catalog backend cannot be read
    async fn list_tracks_matching(&self, filter: &TrackFilter) -> Result<Vec<Track>> {
        let tracks = self.list_tracks().await?;
        Ok(tracks.into_iter().filter(|t| filter.matches(t)).collect())
    }
}

/// Playlist store
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Ordered track IDs of a playlist
    ///
    /// # Errors
    /// Returns `PlaylistNotFound` if the playlist does not exist
    async fn playlist_track_ids(&self, playlist: &PlaylistId) -> Result<Vec<TrackId>>;
}

/// Build a playback queue from playlist order
///
/// Keeps the order of `ids`. IDs the catalog does not know are skipped.
pub fn resolve_queue(tracks: &[Track], ids: &[TrackId]) -> Vec<Track> {
    let by_id: HashMap<&TrackId, &Track> = tracks.iter().map(|t| (&t.id, t)).collect();
    ids.iter()
        .filter_map(|id| by_id.get(id).map(|t| (*t).clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_queue_keeps_playlist_order_and_skips_unknown() {
        let tracks = vec![
            Track::new("a", "A", "X", "/a.mp3"),
            Track::new("b", "B", "X", "/b.mp3"),
            Track::new("c", "C", "X", "/c.mp3"),
        ];
        let ids = vec![TrackId::new("c"), TrackId::new("zz"), TrackId::new("a")];

        let queue = resolve_queue(&tracks, &ids);
        let order: Vec<&str> = queue.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec!["c", "a"]);
    }
}
