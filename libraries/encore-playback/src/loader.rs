//! Track loader
//!
//! Acquires a playable handle for a track: reuses a cached handle when it can,
//! coalesces concurrent requests for the same track onto one load, bounds every
//! attempt with a timeout and retries with a fixed delay.
//!
//! Loads run as spawned tasks, so a load keeps going (and still lands in the
//! cache) after the caller that started it lost interest. Only `close` stops
//! them.

use crate::cache::PreloadCache;
use crate::error::LoadError;
use crate::handle::{ResourceFactory, ResourceHandle};
use crate::types::PlaybackConfig;
use encore_core::TrackId;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type LoadResult = std::result::Result<ResourceHandle, LoadError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

/// Timeout and retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    /// Deadline for one attempt
    pub timeout: Duration,

    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl From<&PlaybackConfig> for LoadPolicy {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            timeout: config.load_timeout(),
            max_attempts: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
        }
    }
}

struct LoaderInner {
    factory: Arc<dyn ResourceFactory>,
    cache: Arc<PreloadCache>,
    policy: LoadPolicy,
    in_flight: Mutex<HashMap<TrackId, SharedLoad>>,
    shutdown: CancellationToken,
}

/// Loads tracks into the preload cache
///
/// Cheap to clone; clones share the in-flight table.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

impl Loader {
    pub fn new(
        factory: Arc<dyn ResourceFactory>,
        cache: Arc<PreloadCache>,
        policy: LoadPolicy,
    ) -> Self {
        let policy = LoadPolicy {
            max_attempts: policy.max_attempts.max(1),
            ..policy
        };
        Self {
            inner: Arc::new(LoaderInner {
                factory,
                cache,
                policy,
                in_flight: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn policy(&self) -> LoadPolicy {
        self.inner.policy
    }

    /// Whether a load for `track_id` is currently running
    pub fn is_loading(&self, track_id: &TrackId) -> bool {
        self.inner.in_flight.lock().contains_key(track_id)
    }

    /// Cancel every running load and refuse new ones
    ///
    /// A cancelled attempt releases the resource it was binding. Callers
    /// waiting on a load receive `LoadError::Closed`.
    pub fn close(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!("Closing loader ({} loads in flight)", self.inner.in_flight.lock().len());
            self.inner.shutdown.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Get a ready handle for `track_id` bound to `source_url`
    ///
    /// On success the handle is in the cache. Every caller joined onto the same
    /// in-flight load receives the same outcome.
    ///
    /// # Errors
    /// `Timeout` or `ResourceUnavailable` from the final attempt, `Closed`
    /// once the loader was closed
    pub async fn acquire(&self, track_id: &TrackId, source_url: &str) -> LoadResult {
        if self.is_closed() {
            return Err(LoadError::Closed);
        }

        loop {
            if let Some(handle) = self.inner.cache.get(track_id) {
                if handle.is_usable_for(source_url) {
                    debug!("Cache hit for {}", track_id);
                    return Ok(handle);
                }
            }

            let (load, joined) = {
                let mut in_flight = self.inner.in_flight.lock();
                if let Some(existing) = in_flight.get(track_id) {
                    debug!("Joining in-flight load of {}", track_id);
                    (existing.clone(), true)
                } else {
                    // Spawned while the table is locked so the task cannot finish
                    // and deregister before it is registered
                    let load = Self::spawn_load(
                        Arc::clone(&self.inner),
                        track_id.clone(),
                        source_url.to_string(),
                    );
                    in_flight.insert(track_id.clone(), load.clone());
                    (load, false)
                }
            };

            match load.await {
                // The joined load was for another source; go again so the
                // cached handle is re-bound to ours
                Ok(handle) if joined && handle.source_url() != source_url => {
                    debug!(
                        "Joined load of {} bound {}, wanted {}",
                        track_id,
                        handle.source_url(),
                        source_url
                    );
                }
                result => return result,
            }
        }
    }

    /// Warm the cache in the background
    ///
    /// Failures are logged and dropped. No-op once closed.
    pub fn preload(&self, track_id: TrackId, source_url: String) {
        if self.is_closed() {
            return;
        }
        let loader = self.clone();
        tokio::spawn(async move {
            match loader.acquire(&track_id, &source_url).await {
                Ok(_) => debug!("Preloaded {}", track_id),
                Err(e) => debug!("Preload of {} failed: {}", track_id, e),
            }
        });
    }

    fn spawn_load(inner: Arc<LoaderInner>, track_id: TrackId, source_url: String) -> SharedLoad {
        let task = tokio::spawn(async move {
            let result = Self::load(&inner, &track_id, &source_url).await;
            inner.in_flight.lock().remove(&track_id);
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(LoadError::ResourceUnavailable(format!(
                    "load task failed: {e}"
                ))),
            }
        }
        .boxed()
        .shared()
    }

    async fn load(inner: &LoaderInner, track_id: &TrackId, source_url: &str) -> LoadResult {
        if let Some(handle) = Self::revalidate_cached(inner, track_id, source_url).await {
            return Ok(handle);
        }

        let policy = inner.policy;
        let mut last_error = LoadError::ResourceUnavailable("no load attempted".to_string());

        for attempt in 1..=policy.max_attempts {
            if attempt > 1 {
                tokio::select! {
                    biased;
                    () = inner.shutdown.cancelled() => return Err(LoadError::Closed),
                    () = tokio::time::sleep(policy.retry_delay) => {}
                }
            }

            debug!(
                "Loading {} (attempt {}/{})",
                track_id, attempt, policy.max_attempts
            );

            match Self::attempt(inner, track_id, source_url).await {
                Ok(handle) => {
                    // A closed cache releases the handle
                    if !inner.cache.put(track_id.clone(), handle.clone()) {
                        debug!("Dropping {}: cache closed", track_id);
                        return Err(LoadError::Closed);
                    }
                    info!("Loaded {} on attempt {}", track_id, attempt);
                    return Ok(handle);
                }
                Err(LoadError::Closed) => return Err(LoadError::Closed),
                Err(e) => {
                    warn!(
                        "Load of {} failed (attempt {}/{}): {}",
                        track_id, attempt, policy.max_attempts, e
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Re-point a cached handle at `source_url` instead of allocating a new one
    ///
    /// A cached handle that cannot be re-validated is dropped from the cache.
    async fn revalidate_cached(
        inner: &LoaderInner,
        track_id: &TrackId,
        source_url: &str,
    ) -> Option<ResourceHandle> {
        let handle = inner.cache.get(track_id)?;
        if handle.is_usable_for(source_url) {
            return Some(handle);
        }

        debug!("Re-binding cached {} to {}", track_id, source_url);
        match tokio::time::timeout(inner.policy.timeout, handle.rebind(source_url)).await {
            Ok(Ok(())) => {
                if inner.cache.put(track_id.clone(), handle.clone()) {
                    return Some(handle);
                }
                return None;
            }
            Ok(Err(e)) => warn!("Cached {} failed to re-bind: {}", track_id, e),
            Err(_) => warn!("Cached {} timed out re-binding", track_id),
        }

        inner.cache.remove(track_id);
        None
    }

    async fn attempt(inner: &LoaderInner, track_id: &TrackId, source_url: &str) -> LoadResult {
        let mut resource = inner.factory.create();
        let ready = resource.bind(source_url);
        let handle = ResourceHandle::new(track_id.clone(), resource, source_url);

        let outcome = tokio::select! {
            biased;
            () = inner.shutdown.cancelled() => None,
            result = tokio::time::timeout(inner.policy.timeout, ready) => Some(result),
        };

        // Dropping `ready` abandons the bind
        match outcome {
            Some(Ok(Ok(()))) => Ok(handle),
            Some(Ok(Err(e))) => {
                handle.release();
                Err(LoadError::ResourceUnavailable(e.to_string()))
            }
            Some(Err(_)) => {
                handle.release();
                Err(LoadError::Timeout(inner.policy.timeout))
            }
            None => {
                handle.release();
                Err(LoadError::Closed)
            }
        }
    }
}
