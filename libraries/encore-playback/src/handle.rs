//! Platform-agnostic playable resource and its shared handle
//!
//! Abstracts the audio element for different platforms. The session never
//! touches a `PlayableResource` directly; it goes through `ResourceHandle`.

use crate::error::ResourceError;
use encore_core::TrackId;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Future resolving once a bound resource is ready to play
pub type ReadyFuture = BoxFuture<'static, std::result::Result<(), ResourceError>>;

/// One loadable, playable audio instance
///
/// Implementors wrap whatever the platform plays audio with. Binding is split
/// from waiting: `bind` starts the load synchronously and hands back a future
/// for the "ready to play" signal, so no lock is held while loading.
pub trait PlayableResource: Send + 'static {
    /// Point the resource at `url` and start loading
    ///
    /// Any previous source is dropped and the position resets to zero.
    /// Dropping the returned future abandons the load.
    fn bind(&mut self, url: &str) -> ReadyFuture;

    /// Whether the bound source is loaded and playable
    fn is_ready(&self) -> bool;

    /// Start or resume output
    ///
    /// # Errors
    /// Returns an error when the platform refuses to play (device error,
    /// autoplay policy)
    fn play(&mut self) -> std::result::Result<(), ResourceError>;

    /// Pause output, keeping the position
    fn pause(&mut self);

    /// Move the play position
    ///
    /// # Errors
    /// Returns an error if the position is out of range or seeking is unsupported
    fn seek(&mut self, position: Duration) -> std::result::Result<(), ResourceError>;

    /// Current play position
    fn position(&self) -> Duration;

    /// Total length, once known
    fn duration(&self) -> Option<Duration>;

    /// True once output reached the end of the source
    fn is_finished(&self) -> bool;

    /// Linear output gain (0.0 = silent)
    fn set_gain(&mut self, gain: f32);

    /// Stop output and free the underlying source
    fn release(&mut self);
}

/// Creates fresh resources for the loader
pub trait ResourceFactory: Send + Sync + 'static {
    fn create(&self) -> Box<dyn PlayableResource>;
}

impl<F> ResourceFactory for F
where
    F: Fn() -> Box<dyn PlayableResource> + Send + Sync + 'static,
{
    fn create(&self) -> Box<dyn PlayableResource> {
        self()
    }
}

struct HandleState {
    resource: Box<dyn PlayableResource>,
    source_url: String,
    last_used: Instant,
    released: bool,
}

struct HandleInner {
    track_id: TrackId,
    state: Mutex<HandleState>,
}

/// Shared reference to a loaded resource
///
/// Cloning is cheap and yields another reference to the same resource. The
/// preload cache decides when the resource is released; holders of a clone
/// only drive playback.
#[derive(Clone)]
pub struct ResourceHandle {
    inner: Arc<HandleInner>,
}

impl ResourceHandle {
    /// Wrap a resource already bound to `source_url`
    pub fn new(
        track_id: TrackId,
        resource: Box<dyn PlayableResource>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                track_id,
                state: Mutex::new(HandleState {
                    resource,
                    source_url: source_url.into(),
                    last_used: Instant::now(),
                    released: false,
                }),
            }),
        }
    }

    pub fn track_id(&self) -> &TrackId {
        &self.inner.track_id
    }

    pub fn source_url(&self) -> String {
        self.inner.state.lock().source_url.clone()
    }

    pub fn last_used(&self) -> Instant {
        self.inner.state.lock().last_used
    }

    pub(crate) fn touch(&self) {
        self.inner.state.lock().last_used = Instant::now();
    }

    /// Whether both handles refer to the same resource
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// True if the handle is bound to `url` and still playable
    pub fn is_usable_for(&self, url: &str) -> bool {
        let state = self.inner.state.lock();
        !state.released && state.source_url == url && state.resource.is_ready()
    }

    pub fn is_released(&self) -> bool {
        self.inner.state.lock().released
    }

    /// Re-point the resource at `url`, reusing the underlying object
    pub(crate) fn rebind(&self, url: &str) -> ReadyFuture {
        let mut state = self.inner.state.lock();
        state.source_url = url.to_string();
        state.released = false;
        state.last_used = Instant::now();
        state.resource.bind(url)
    }

    pub fn play(&self) -> std::result::Result<(), ResourceError> {
        let mut state = self.inner.state.lock();
        if state.released {
            return Err(ResourceError::new("resource was released"));
        }
        state.last_used = Instant::now();
        state.resource.play()
    }

    pub fn pause(&self) {
        self.inner.state.lock().resource.pause();
    }

    /// Pause and return to the start of the track
    pub fn rewind(&self) {
        let mut state = self.inner.state.lock();
        state.resource.pause();
        // Position zero is always in range
        let _ = state.resource.seek(Duration::ZERO);
    }

    pub fn seek(&self, position: Duration) -> std::result::Result<(), ResourceError> {
        self.inner.state.lock().resource.seek(position)
    }

    pub fn position(&self) -> Duration {
        self.inner.state.lock().resource.position()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.inner.state.lock().resource.duration()
    }

    pub fn is_finished(&self) -> bool {
        let state = self.inner.state.lock();
        !state.released && state.resource.is_finished()
    }

    pub fn set_gain(&self, gain: f32) {
        self.inner.state.lock().resource.set_gain(gain);
    }

    /// Stop and free the resource. Idempotent.
    ///
    /// Only the preload cache and the loader (for attempts that never made it
    /// into the cache) call this.
    pub(crate) fn release(&self) {
        let mut state = self.inner.state.lock();
        if !state.released {
            state.resource.release();
            state.released = true;
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ResourceHandle")
            .field("track_id", &self.inner.track_id)
            .field("source_url", &state.source_url)
            .field("released", &state.released)
            .finish()
    }
}

/// In-memory resource for tests
///
/// Becomes ready immediately and plays nothing.
#[cfg(test)]
pub(crate) struct DummyResource {
    pub(crate) ready: bool,
    pub(crate) playing: bool,
    pub(crate) released: bool,
    pub(crate) position: Duration,
}

#[cfg(test)]
impl DummyResource {
    pub(crate) fn new() -> Self {
        Self {
            ready: false,
            playing: false,
            released: false,
            position: Duration::ZERO,
        }
    }
}

#[cfg(test)]
impl PlayableResource for DummyResource {
    fn bind(&mut self, _url: &str) -> ReadyFuture {
        self.ready = true;
        self.released = false;
        self.position = Duration::ZERO;
        Box::pin(async { Ok(()) })
    }

    fn is_ready(&self) -> bool {
        self.ready && !self.released
    }

    fn play(&mut self) -> std::result::Result<(), ResourceError> {
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, position: Duration) -> std::result::Result<(), ResourceError> {
        self.position = position;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs(180))
    }

    fn is_finished(&self) -> bool {
        false
    }

    fn set_gain(&mut self, _gain: f32) {}

    fn release(&mut self) {
        self.playing = false;
        self.released = true;
        self.ready = false;
    }
}
