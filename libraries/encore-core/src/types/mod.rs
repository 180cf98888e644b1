//! Domain types

mod filter;
mod ids;
mod track;

pub use filter::TrackFilter;
pub use ids::{PlaylistId, TrackId};
pub use track::Track;
