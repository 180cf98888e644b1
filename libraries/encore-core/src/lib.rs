//! Encore Core
//!
//! Domain types and collaborator boundaries shared by the Encore crates.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `PlaylistId`, `TrackFilter`
//! - **Collaborator Traits**: `Catalog`, `PlaylistSource`
//! - **Error Handling**: `CoreError` and `Result`
//!
//! The catalog and playlist stores live outside this workspace. `MemoryCatalog`
//! is the in-process implementation used by the CLI and by tests.
//!
//! # Example
//!
//! ```rust
//! use encore_core::{Track, TrackFilter};
//!
//! let track = Track::new("s1", "Blue in Green", "Bill Evans", "/music/blue.mp3");
//! let filter = TrackFilter::search("evans");
//! assert!(filter.matches(&track));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod traits;
pub mod types;

pub use catalog::MemoryCatalog;
pub use error::{CoreError, Result};
pub use traits::{resolve_queue, Catalog, PlaylistSource};
pub use types::{PlaylistId, Track, TrackFilter, TrackId};
