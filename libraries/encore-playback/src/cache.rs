//! Preload cache
//!
//! Bounded map of track ID to loaded resource handle with least-recently-used
//! eviction. The cache owns every handle it holds: eviction, `remove`,
//! `drain_all` and `close` are the only paths that release resources.
//!
//! The active (playing) track is exempt from eviction, so the cache may briefly
//! sit at capacity with the active entry being the oldest one.

use crate::handle::ResourceHandle;
use encore_core::TrackId;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

/// Default number of preloaded tracks
pub const DEFAULT_CAPACITY: usize = 5;

struct CacheState {
    // Unbounded: capacity is enforced by `evict_locked` so the active entry can be skipped
    entries: LruCache<TrackId, ResourceHandle>,
    active: Option<TrackId>,
    closed: bool,
}

/// LRU cache of preloaded tracks
///
/// All operations take one lock, so they are linearizable with respect to
/// each other. Handles are released after the lock is dropped.
pub struct PreloadCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl PreloadCache {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                active: None,
                closed: false,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check for an entry without touching its recency
    pub fn contains(&self, track_id: &TrackId) -> bool {
        self.state.lock().entries.contains(track_id)
    }

    /// Look up a handle, marking it most recently used
    pub fn get(&self, track_id: &TrackId) -> Option<ResourceHandle> {
        let mut state = self.state.lock();
        let handle = state.entries.get(track_id)?;
        handle.touch();
        Some(handle.clone())
    }

    /// Insert or replace an entry, then evict down to capacity
    ///
    /// A replaced handle that is a different resource is released. A closed
    /// cache refuses the entry and releases `handle` instead; returns whether
    /// the handle was stored.
    pub fn put(&self, track_id: TrackId, handle: ResourceHandle) -> bool {
        let mut released = Vec::new();
        let stored = {
            let mut state = self.state.lock();
            if state.closed {
                released.push(handle);
                false
            } else {
                handle.touch();
                if let Some(old) = state.entries.put(track_id, handle.clone()) {
                    if !old.ptr_eq(&handle) {
                        released.push(old);
                    }
                }
                self.evict_locked(&mut state, &mut released);
                true
            }
        };
        release_all(released);
        stored
    }

    /// Exempt a track from eviction
    ///
    /// The track does not need to be cached yet; the exemption applies as soon
    /// as its entry arrives.
    pub fn mark_active(&self, track_id: &TrackId) {
        self.state.lock().active = Some(track_id.clone());
    }

    pub fn clear_active(&self) {
        self.state.lock().active = None;
    }

    pub fn active(&self) -> Option<TrackId> {
        self.state.lock().active.clone()
    }

    /// Evict least-recently-used entries until at or under capacity
    ///
    /// Returns the IDs that were removed.
    pub fn evict(&self) -> Vec<TrackId> {
        let mut released = Vec::new();
        {
            let mut state = self.state.lock();
            self.evict_locked(&mut state, &mut released);
        }
        let ids = released.iter().map(|h| h.track_id().clone()).collect();
        release_all(released);
        ids
    }

    /// Drop and release one entry
    pub fn remove(&self, track_id: &TrackId) -> bool {
        let removed = self.state.lock().entries.pop(track_id);
        match removed {
            Some(handle) => {
                handle.release();
                true
            }
            None => false,
        }
    }

    /// Release every handle and empty the cache
    pub fn drain_all(&self) {
        let drained: Vec<ResourceHandle> = {
            let mut state = self.state.lock();
            state.active = None;
            let mut handles = Vec::with_capacity(state.entries.len());
            while let Some((_, handle)) = state.entries.pop_lru() {
                handles.push(handle);
            }
            handles
        };
        debug!("Draining {} cached tracks", drained.len());
        release_all(drained);
    }

    /// Drain the cache and refuse every later `put`
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.drain_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Cached IDs from least to most recently used
    pub fn ids_by_recency(&self) -> Vec<TrackId> {
        self.state
            .lock()
            .entries
            .iter()
            .rev()
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn evict_locked(&self, state: &mut CacheState, released: &mut Vec<ResourceHandle>) {
        while state.entries.len() > self.capacity {
            // iter() runs most- to least-recently used
            let victim = state
                .entries
                .iter()
                .rev()
                .map(|(id, _)| id)
                .find(|id| state.active.as_ref() != Some(*id))
                .cloned();

            let Some(victim) = victim else {
                break;
            };

            if let Some(handle) = state.entries.pop(&victim) {
                debug!("Evicting {} from preload cache", victim);
                released.push(handle);
            }
        }
    }
}

impl Default for PreloadCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn release_all(handles: Vec<ResourceHandle>) {
    for handle in handles {
        handle.release();
    }
}
