//! Track domain type

use super::TrackId;
use serde::{Deserialize, Serialize};

/// Catalog track
///
/// Immutable once fetched from the catalog. The playback engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Location of the playable resource (file path or URL)
    #[serde(alias = "file_url")]
    pub source_url: String,

    /// Display duration as stored by the catalog (e.g. "3:41")
    #[serde(default, alias = "duration")]
    pub duration_label: String,

    /// Cover image reference
    #[serde(default, alias = "cover_image")]
    pub cover_image: Option<String>,

    /// Catalog category
    #[serde(default)]
    pub category: Option<String>,
}

impl Track {
    /// Create a track with the fields the player needs
    pub fn new(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        artist: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            source_url: source_url.into(),
            duration_label: String::new(),
            cover_image: None,
            category: None,
        }
    }

    /// Set the display duration
    #[must_use]
    pub fn with_duration_label(mut self, label: impl Into<String>) -> Self {
        self.duration_label = label.into();
        self
    }

    /// Set the category
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}
