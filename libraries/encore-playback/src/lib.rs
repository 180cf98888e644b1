//! Encore - Playback Session
//!
//! Platform-agnostic playback engine for Encore.
//!
//! This crate provides:
//! - A single playback session with one active stream at a time
//! - A bounded preload cache (LRU, active track exempt from eviction)
//! - A loader that coalesces concurrent requests, times out and retries
//! - Sequential and shuffled traversal with repeat
//! - Volume/mute, seek and progress reporting
//! - Change notifications over a broadcast channel
//!
//! # Architecture
//!
//! `encore-playback` never touches an audio device. The platform layer
//! implements [`PlayableResource`] (one loadable audio instance) and hands the
//! session a [`ResourceFactory`]. Everything else (which track plays, what is
//! preloaded, when resources are freed) is decided here.
//!
//! # Example
//!
//! ```rust,no_run
//! use encore_core::{Track, TrackId};
//! use encore_playback::{PlaybackConfig, PlaybackSession, ResourceFactory};
//! use std::sync::Arc;
//!
//! # async fn run(factory: Arc<dyn ResourceFactory>) -> encore_playback::Result<()> {
//! let session = PlaybackSession::new(PlaybackConfig::default(), factory)?;
//!
//! let tracks = vec![
//!     Track::new("s1", "So What", "Miles Davis", "/music/so-what.mp3"),
//!     Track::new("s2", "Freddie Freeloader", "Miles Davis", "/music/freddie.mp3"),
//! ];
//! session.play_from(tracks, &TrackId::new("s1")).await?;
//!
//! session.toggle_pause()?; // pause
//! session.toggle_pause()?; // resume
//! session.next().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
mod error;
pub mod events;
mod handle;
pub mod loader;
mod queue;
pub mod sequencer;
mod session;
pub mod types;
mod volume;

// Public exports
pub use cache::PreloadCache;
pub use error::{LoadError, Notification, PlaybackError, ResourceError, Result};
pub use events::PlaybackEvent;
pub use handle::{PlayableResource, ReadyFuture, ResourceFactory, ResourceHandle};
pub use loader::{LoadPolicy, Loader};
pub use queue::Queue;
pub use sequencer::Sequencer;
pub use session::PlaybackSession;
pub use types::{format_time, PlaybackConfig, PlaybackState, Progress};
pub use volume::Volume;
