//! In-memory catalog
//!
//! Serves tracks and playlists from memory, optionally loaded from a JSON
//! document of the form:
//!
//! ```json
//! {
//!   "tracks": [{ "id": "s1", "title": "...", "artist": "...", "source_url": "..." }],
//!   "playlists": { "favourites": ["s1"] }
//! }
//! ```

use crate::error::{CoreError, Result};
use crate::traits::{Catalog, PlaylistSource};
use crate::types::{PlaylistId, Track, TrackId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Catalog held entirely in memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryCatalog {
    /// Tracks in catalog order
    #[serde(default)]
    pub tracks: Vec<Track>,

    /// Playlists by name, each an ordered list of track IDs
    #[serde(default)]
    pub playlists: HashMap<String, Vec<TrackId>>,
}

impl MemoryCatalog {
    /// Create a catalog from tracks
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            playlists: HashMap::new(),
        }
    }

    /// Load a catalog from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a catalog from a JSON string
    ///
    /// # Errors
    /// Returns an error on malformed JSON or duplicate track IDs
    pub fn from_json(content: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(content)?;

        let mut seen = std::collections::HashSet::new();
        for track in &catalog.tracks {
            if !seen.insert(&track.id) {
                return Err(CoreError::invalid_input(format!(
                    "duplicate track id {}",
                    track.id
                )));
            }
        }

        Ok(catalog)
    }

    /// Add a playlist
    pub fn insert_playlist(&mut self, name: impl Into<String>, ids: Vec<TrackId>) {
        self.playlists.insert(name.into(), ids);
    }

    /// Look up a track by ID
    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == id)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn list_tracks(&self) -> Result<Vec<Track>> {
        Ok(self.tracks.clone())
    }
}

#[async_trait]
impl PlaylistSource for MemoryCatalog {
    async fn playlist_track_ids(&self, playlist: &PlaylistId) -> Result<Vec<TrackId>> {
        self.playlists
            .get(playlist.as_str())
            .cloned()
            .ok_or_else(|| CoreError::PlaylistNotFound(playlist.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackFilter;
    use std::io::Write;

    const CATALOG: &str = r#"{
        "tracks": [
            { "id": "s1", "title": "Naima", "artist": "John Coltrane", "source_url": "/m/naima.mp3", "category": "jazz" },
            { "id": "s2", "title": "Paranoid", "artist": "Black Sabbath", "file_url": "/m/paranoid.mp3", "category": "rock" },
            { "id": "s3", "title": "Giant Steps", "artist": "John Coltrane", "source_url": "/m/giant.mp3", "category": "jazz" }
        ],
        "playlists": { "late-night": ["s3", "s1"] }
    }"#;

    #[tokio::test]
    async fn lists_and_filters_tracks() {
        let catalog = MemoryCatalog::from_json(CATALOG).unwrap();

        assert_eq!(catalog.list_tracks().await.unwrap().len(), 3);

        let coltrane = catalog
            .list_tracks_matching(&TrackFilter::search("coltrane"))
            .await
            .unwrap();
        assert_eq!(coltrane.len(), 2);

        let rock = catalog
            .list_tracks_matching(&TrackFilter::default().in_category("rock"))
            .await
            .unwrap();
        assert_eq!(rock.len(), 1);
        assert_eq!(rock[0].id.as_str(), "s2");
    }

    #[tokio::test]
    async fn playlist_lookup() {
        let catalog = MemoryCatalog::from_json(CATALOG).unwrap();

        let ids = catalog
            .playlist_track_ids(&PlaylistId::new("late-night"))
            .await
            .unwrap();
        assert_eq!(ids, vec![TrackId::new("s3"), TrackId::new("s1")]);

        let missing = catalog
            .playlist_track_ids(&PlaylistId::new("nope"))
            .await;
        assert!(matches!(missing, Err(CoreError::PlaylistNotFound(_))));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let json = r#"{ "tracks": [
            { "id": "s1", "title": "A", "artist": "X", "source_url": "/a" },
            { "id": "s1", "title": "B", "artist": "Y", "source_url": "/b" }
        ] }"#;

        assert!(matches!(
            MemoryCatalog::from_json(json),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let catalog = MemoryCatalog::from_json_file(file.path()).unwrap();
        assert!(catalog.track(&TrackId::new("s2")).is_some());
    }
}
