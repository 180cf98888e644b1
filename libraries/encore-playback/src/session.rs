//! Playback session - core orchestration
//!
//! Owns the single active stream and coordinates the loader, the preload cache
//! and the sequencer. All mutation of the playing resource goes through the
//! operations here.
//!
//! ```text
//! Idle ──play(id)──▶ Loading(id) ──ok──▶ Playing(id) ──pause──▶ Paused(id)
//!                        │                  │    ▲                  │
//!                        └──fail──▶ Error   │    └────resume────────┘
//!                                           ├─end, repeat──▶ Loading(id)
//!                                           ├─end──▶ Loading(successor) | Ended
//!                                           └─play(id2)──▶ Loading(id2)
//! ```
//!
//! Every load is tagged with a generation number. Starting a new load bumps
//! the generation, so the result of a superseded load is ignored (its handle
//! still lands in the cache).

use crate::{
    cache::PreloadCache,
    error::{PlaybackError, Result},
    events::{EventBus, PlaybackEvent},
    handle::{ResourceFactory, ResourceHandle},
    loader::{LoadPolicy, Loader},
    queue::Queue,
    sequencer::Sequencer,
    types::{PlaybackConfig, PlaybackState, Progress},
    volume::Volume,
};
use encore_core::{Track, TrackId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

struct SessionState {
    playback: PlaybackState,
    queue: Queue,
    sequencer: Sequencer,
    current: Option<Track>,
    active: Option<ResourceHandle>,
    generation: u64,
    volume: Volume,
}

struct SessionInner {
    config: PlaybackConfig,
    cache: Arc<PreloadCache>,
    loader: Loader,
    events: EventBus,
    state: Mutex<SessionState>,
}

/// Central playback session
///
/// Cheap to clone; clones control the same session. Construct one per
/// process and hand it to whatever UI layer needs it.
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<SessionInner>,
}

impl PlaybackSession {
    /// Create a session drawing resources from `factory`
    ///
    /// # Errors
    /// `InvalidConfig` if `config` fails validation
    pub fn new(config: PlaybackConfig, factory: Arc<dyn ResourceFactory>) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(PreloadCache::new(config.cache_capacity));
        let loader = Loader::new(factory, Arc::clone(&cache), LoadPolicy::from(&config));
        let state = SessionState {
            playback: PlaybackState::Idle,
            queue: Queue::default(),
            sequencer: Sequencer::new(config.shuffle, config.repeat, 0),
            current: None,
            active: None,
            generation: 0,
            volume: Volume::new(config.volume),
        };

        Ok(Self {
            inner: Arc::new(SessionInner {
                events: EventBus::new(config.event_capacity),
                config,
                cache,
                loader,
                state: Mutex::new(state),
            }),
        })
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &PreloadCache {
        &self.inner.cache
    }

    pub fn loader(&self) -> &Loader {
        &self.inner.loader
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.inner.events.subscribe()
    }

    // ===== Queries =====

    pub fn current_state(&self) -> PlaybackState {
        self.inner.state.lock().playback.clone()
    }

    /// Track in focus, or the last one played
    pub fn current_track(&self) -> Option<Track> {
        self.inner.state.lock().current.clone()
    }

    pub fn queue(&self) -> Vec<Track> {
        self.inner.state.lock().queue.tracks().to_vec()
    }

    pub fn is_shuffle_on(&self) -> bool {
        self.inner.state.lock().sequencer.is_shuffle_on()
    }

    pub fn is_repeat_on(&self) -> bool {
        self.inner.state.lock().sequencer.is_repeat_on()
    }

    pub fn volume(&self) -> Volume {
        self.inner.state.lock().volume
    }

    /// Elapsed and total time of the active track
    pub fn progress(&self) -> Option<Progress> {
        let state = self.inner.state.lock();
        let handle = state.active.as_ref()?;
        Some(Progress {
            elapsed: handle.position(),
            duration: handle.duration(),
        })
    }

    // ===== Queue and modes =====

    /// Replace the queue wholesale
    ///
    /// Does not interrupt the current track.
    pub fn set_queue(&self, tracks: Vec<Track>) {
        let mut state = self.inner.state.lock();
        state.queue = Queue::new(tracks);
        let len = state.queue.len();
        state.sequencer.on_queue_changed(len);
        debug!("Queue replaced ({} tracks)", len);
        self.inner.events.emit(PlaybackEvent::QueueChanged { length: len });
    }

    /// Flip shuffle; returns the new value
    ///
    /// A fresh permutation starts at the track in focus.
    pub fn toggle_shuffle(&self) -> bool {
        let mut state = self.inner.state.lock();
        let len = state.queue.len();
        let enabled = state.sequencer.toggle_shuffle(len);
        if let Some(index) = state
            .current
            .as_ref()
            .and_then(|t| state.queue.position(&t.id))
        {
            state.sequencer.anchor(index);
        }
        info!("Shuffle {}", if enabled { "on" } else { "off" });
        self.inner
            .events
            .emit(PlaybackEvent::ShuffleChanged { enabled });
        enabled
    }

    /// Flip repeat; returns the new value
    pub fn toggle_repeat(&self) -> bool {
        let mut state = self.inner.state.lock();
        let enabled = state.sequencer.toggle_repeat();
        info!("Repeat {}", if enabled { "on" } else { "off" });
        self.inner.events.emit(PlaybackEvent::RepeatChanged { enabled });
        enabled
    }

    pub fn set_volume(&self, level: u8) {
        let mut state = self.inner.state.lock();
        state.volume.set_level(level);
        self.apply_volume_locked(&state);
    }

    /// Flip mute; returns the new value
    pub fn toggle_mute(&self) -> bool {
        let mut state = self.inner.state.lock();
        let muted = state.volume.toggle_mute();
        self.apply_volume_locked(&state);
        muted
    }

    // ===== Transport =====

    /// Play a track from the queue
    ///
    /// Selecting the track that is already playing pauses it; selecting it
    /// while paused resumes it. Any other track supersedes whatever is loading
    /// or playing, and under shuffle becomes the start of the shuffled run.
    /// Resolves once the load settles.
    ///
    /// # Errors
    /// `NotFound` if the track is not queued, otherwise the classified load or
    /// play failure (the session is then in `Error`)
    pub async fn play(&self, track_id: &TrackId) -> Result<()> {
        let (track, generation) = {
            let mut state = self.inner.state.lock();
            match state.playback.clone() {
                PlaybackState::Playing(current) if &current == track_id => {
                    self.pause_locked(&mut state);
                    return Ok(());
                }
                PlaybackState::Paused(current) if &current == track_id => {
                    return self.resume_locked(&mut state);
                }
                PlaybackState::Loading(current) if &current == track_id => {
                    debug!("{} is already loading", track_id);
                    return Ok(());
                }
                _ => {}
            }

            let index = state
                .queue
                .position(track_id)
                .ok_or_else(|| PlaybackError::NotFound(track_id.clone()))?;
            let Some(track) = state.queue.get(index).cloned() else {
                return Err(PlaybackError::NotFound(track_id.clone()));
            };
            state.sequencer.anchor(index);
            let generation = self.begin_load_locked(&mut state, &track);
            (track, generation)
        };

        self.finish_load(track, generation).await
    }

    /// Replace the queue, then play `track_id` from it
    ///
    /// # Errors
    /// Same as [`play`](Self::play)
    pub async fn play_from(&self, tracks: Vec<Track>, track_id: &TrackId) -> Result<()> {
        self.set_queue(tracks);
        self.play(track_id).await
    }

    /// Pause when playing, resume when paused; no-op otherwise
    ///
    /// # Errors
    /// `PlaybackRejected` if resuming fails
    pub fn toggle_pause(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.playback.is_playing() {
            self.pause_locked(&mut state);
            Ok(())
        } else if matches!(state.playback, PlaybackState::Paused(_)) {
            self.resume_locked(&mut state)
        } else {
            Ok(())
        }
    }

    /// Skip to the next track (wraps around)
    ///
    /// No-op before anything was played.
    ///
    /// # Errors
    /// `NotFound` if the current track is no longer queued, otherwise as
    /// [`play`](Self::play)
    pub async fn next(&self) -> Result<()> {
        self.skip(Direction::Next).await
    }

    /// Skip to the previous track (wraps around)
    ///
    /// # Errors
    /// As [`next`](Self::next)
    pub async fn previous(&self) -> Result<()> {
        self.skip(Direction::Previous).await
    }

    /// Move the play position of the active track
    ///
    /// # Errors
    /// `PlaybackRejected` if the resource refuses the position
    pub fn seek(&self, position: Duration) -> Result<()> {
        let state = self.inner.state.lock();
        let (Some(handle), Some(track_id)) = (&state.active, state.playback.active_track())
        else {
            return Ok(());
        };
        handle
            .seek(position)
            .map_err(|e| PlaybackError::PlaybackRejected {
                track_id: track_id.clone(),
                reason: e.to_string(),
            })
    }

    /// Natural end of `track_id`
    ///
    /// Replays the track when repeat is on, otherwise moves to the following
    /// track or to `Ended` at the end of the queue. Stale notifications (for a
    /// track that is no longer playing) are ignored.
    ///
    /// # Errors
    /// As [`play`](Self::play)
    pub async fn track_ended(&self, track_id: &TrackId) -> Result<()> {
        let (track, generation) = {
            let mut state = self.inner.state.lock();
            if !matches!(&state.playback, PlaybackState::Playing(current) if current == track_id) {
                debug!("Ignoring end of {} in state {:?}", track_id, state.playback);
                return Ok(());
            }

            let follow = if state.sequencer.is_repeat_on() {
                // The queue may carry a newer source for the same track
                state
                    .queue
                    .track(track_id)
                    .cloned()
                    .or_else(|| state.current.clone())
            } else {
                state
                    .sequencer
                    .successor(&state.queue, track_id)
                    .and_then(|id| state.queue.track(&id).cloned())
            };

            let Some(track) = follow else {
                info!("Reached end of queue after {}", track_id);
                if let Some(handle) = state.active.take() {
                    handle.pause();
                }
                self.inner.cache.clear_active();
                self.set_state_locked(&mut state, PlaybackState::Ended);
                return Ok(());
            };

            let generation = self.begin_load_locked(&mut state, &track);
            (track, generation)
        };

        self.finish_load(track, generation).await
    }

    /// Check the active resource and handle its natural end
    ///
    /// Returns true if an end was handled. Meant to be driven by a timer in
    /// the platform layer.
    ///
    /// # Errors
    /// As [`track_ended`](Self::track_ended)
    pub async fn poll_finished(&self) -> Result<bool> {
        let finished = {
            let state = self.inner.state.lock();
            match (&state.playback, &state.active) {
                (PlaybackState::Playing(id), Some(handle)) if handle.is_finished() => {
                    Some(id.clone())
                }
                _ => None,
            }
        };

        match finished {
            Some(id) => {
                self.track_ended(&id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stop playback and release every cached resource
    ///
    /// Loads still in flight are cancelled and release what they bound. The
    /// session cannot load tracks afterwards.
    pub fn shutdown(&self) {
        self.inner.loader.close();
        {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            if let Some(handle) = state.active.take() {
                handle.pause();
            }
            state.current = None;
            self.set_state_locked(&mut state, PlaybackState::Idle);
        }
        self.inner.cache.close();
        info!("Playback session shut down");
    }

    // ===== Internals =====

    async fn skip(&self, direction: Direction) -> Result<()> {
        let (track, generation) = {
            let mut state = self.inner.state.lock();
            let Some(current) = state.current.as_ref().map(|t| t.id.clone()) else {
                return Ok(());
            };

            let target = match direction {
                Direction::Next => state.sequencer.next(&state.queue, &current),
                Direction::Previous => state.sequencer.previous(&state.queue, &current),
            };
            let track = target
                .and_then(|id| state.queue.track(&id).cloned())
                .ok_or(PlaybackError::NotFound(current))?;

            let generation = self.begin_load_locked(&mut state, &track);
            (track, generation)
        };

        self.finish_load(track, generation).await
    }

    /// Enter `Loading(track)`, superseding whatever was in focus
    fn begin_load_locked(&self, state: &mut SessionState, track: &Track) -> u64 {
        if let Some(previous) = state.active.take() {
            previous.rewind();
        }

        state.generation += 1;
        let previous_id = state.current.as_ref().map(|t| t.id.clone());
        state.current = Some(track.clone());
        self.inner.cache.mark_active(&track.id);

        info!("Loading {} ({} - {})", track.id, track.artist, track.title);
        self.set_state_locked(state, PlaybackState::Loading(track.id.clone()));

        if previous_id.as_ref() != Some(&track.id) {
            self.inner.events.emit(PlaybackEvent::TrackChanged {
                track_id: track.id.clone(),
                previous_track_id: previous_id,
            });
        }

        state.generation
    }

    /// Await the load started by `begin_load_locked` and settle the state
    async fn finish_load(&self, track: Track, generation: u64) -> Result<()> {
        let result = self
            .inner
            .loader
            .acquire(&track.id, &track.source_url)
            .await;

        let mut state = self.inner.state.lock();
        if state.generation != generation {
            debug!("Discarding superseded load of {}", track.id);
            return Ok(());
        }

        let handle = match result {
            Ok(handle) => handle,
            Err(e) => {
                let err = PlaybackError::from_load(track.id.clone(), e);
                self.fail_locked(&mut state, err.clone());
                return Err(err);
            }
        };

        handle.rewind();
        handle.set_gain(state.volume.gain());
        if let Err(e) = handle.play() {
            let err = PlaybackError::PlaybackRejected {
                track_id: track.id.clone(),
                reason: e.to_string(),
            };
            self.fail_locked(&mut state, err.clone());
            return Err(err);
        }

        state.active = Some(handle);
        info!("Playing {}", track.id);
        self.set_state_locked(&mut state, PlaybackState::Playing(track.id.clone()));
        self.preload_neighbors_locked(&state, &track.id);
        Ok(())
    }

    fn pause_locked(&self, state: &mut SessionState) {
        let Some(id) = state.playback.active_track().cloned() else {
            return;
        };
        if let Some(handle) = &state.active {
            handle.pause();
        }
        self.set_state_locked(state, PlaybackState::Paused(id));
    }

    fn resume_locked(&self, state: &mut SessionState) -> Result<()> {
        let Some(id) = state.playback.active_track().cloned() else {
            return Ok(());
        };
        let Some(handle) = state.active.clone() else {
            return Ok(());
        };

        match handle.play() {
            Ok(()) => {
                self.set_state_locked(state, PlaybackState::Playing(id));
                Ok(())
            }
            Err(e) => {
                let err = PlaybackError::PlaybackRejected {
                    track_id: id,
                    reason: e.to_string(),
                };
                self.fail_locked(state, err.clone());
                Err(err)
            }
        }
    }

    fn fail_locked(&self, state: &mut SessionState, err: PlaybackError) {
        let Some(track_id) = err.track_id().cloned() else {
            return;
        };
        warn!("Playback of {} failed: {}", track_id, err);

        if let Some(handle) = state.active.take() {
            handle.pause();
        }
        self.inner.cache.clear_active();

        self.inner.events.emit(PlaybackEvent::Error {
            track_id: track_id.clone(),
            notification: err.notification(),
        });
        self.set_state_locked(
            state,
            PlaybackState::Error {
                track_id,
                reason: err,
            },
        );
    }

    fn preload_neighbors_locked(&self, state: &SessionState, track_id: &TrackId) {
        if !self.inner.config.preload_neighbors {
            return;
        }
        for id in state.sequencer.neighbors(&state.queue, track_id) {
            if let Some(track) = state.queue.track(&id) {
                debug!("Preloading neighbour {}", id);
                self.inner
                    .loader
                    .preload(track.id.clone(), track.source_url.clone());
            }
        }
    }

    fn apply_volume_locked(&self, state: &SessionState) {
        if let Some(handle) = &state.active {
            handle.set_gain(state.volume.gain());
        }
        self.inner.events.emit(PlaybackEvent::VolumeChanged {
            level: state.volume.level(),
            is_muted: state.volume.is_muted(),
        });
    }

    fn set_state_locked(&self, state: &mut SessionState, playback: PlaybackState) {
        state.playback = playback.clone();
        self.inner
            .events
            .emit(PlaybackEvent::StateChanged { state: playback });
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Next,
    Previous,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("state", &self.current_state())
            .field("cached", &self.inner.cache.len())
            .finish()
    }
}
