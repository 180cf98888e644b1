//! Catalog query filter

use super::Track;
use serde::{Deserialize, Serialize};

/// Filter for "list tracks matching" catalog queries
///
/// The search text matches case-insensitively against title or artist.
/// An empty search matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFilter {
    /// Free-text search over title and artist
    #[serde(default)]
    pub search: String,

    /// Exact category match
    #[serde(default)]
    pub category: Option<String>,
}

impl TrackFilter {
    /// Filter by search text only
    pub fn search(query: impl Into<String>) -> Self {
        Self {
            search: query.into(),
            category: None,
        }
    }

    /// Restrict to a category
    #[must_use]
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Check whether a track passes this filter
    pub fn matches(&self, track: &Track) -> bool {
        if let Some(category) = &self.category {
            if track.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }

        if self.search.is_empty() {
            return true;
        }

        let query = self.search.to_lowercase();
        track.title.to_lowercase().contains(&query) || track.artist.to_lowercase().contains(&query)
    }
}
