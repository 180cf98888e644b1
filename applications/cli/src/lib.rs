//! Encore CLI Library
//!
//! Headless player: loads a JSON catalog, builds a queue and plays it through
//! a file/HTTP resource backend.
//!
//! This library exposes the pieces of the `encore` binary for testing purposes.

pub mod backend;
pub mod config;
pub mod error;
pub mod player;

// Re-export commonly used types for convenience
pub use backend::{FetchBackend, FetchResource};
pub use config::AppConfig;
pub use error::{CliError, Result};
pub use player::QueueRequest;
