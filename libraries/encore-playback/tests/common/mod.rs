//! Shared test fixtures: a scripted resource backend
//!
//! Each source URL gets a behaviour (ready, fail, hang, gated...). The backend
//! records bind attempts, releases and which URLs are currently playing so
//! tests can assert on what the session did to the "device".

#![allow(dead_code)]

use encore_core::Track;
use encore_playback::{
    PlayableResource, PlaybackConfig, ReadyFuture, ResourceError, ResourceFactory,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// How a URL reacts to being loaded
#[derive(Clone)]
pub enum Behavior {
    /// Ready immediately
    Ready,
    /// Every attempt fails
    Fail(String),
    /// The first n attempts fail, then ready
    FailFirst(usize),
    /// Never becomes ready
    Hang,
    /// Ready once the gate opens
    Gated(watch::Receiver<bool>),
    /// Loads fine, refuses to play
    RejectPlay,
}

/// Opens a `Behavior::Gated` load
pub struct Gate {
    tx: watch::Sender<bool>,
}

impl Gate {
    pub fn new() -> (Self, Behavior) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, Behavior::Gated(rx))
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Default)]
struct BackendState {
    behaviors: HashMap<String, Behavior>,
    attempts: HashMap<String, Vec<Instant>>,
    playing: HashSet<String>,
    finished: HashSet<String>,
    gains: HashMap<String, f32>,
    created: usize,
    released: usize,
}

#[derive(Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<BackendState>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: &str, behavior: Behavior) {
        self.state.lock().behaviors.insert(url.to_string(), behavior);
    }

    pub fn factory(&self) -> Arc<dyn ResourceFactory> {
        let backend = self.clone();
        Arc::new(move || {
            backend.state.lock().created += 1;
            Box::new(ScriptedResource::new(backend.clone())) as Box<dyn PlayableResource>
        })
    }

    pub fn attempts(&self, url: &str) -> usize {
        self.attempt_times(url).len()
    }

    pub fn attempt_times(&self, url: &str) -> Vec<Instant> {
        self.state
            .lock()
            .attempts
            .get(url)
            .cloned()
            .unwrap_or_default()
    }

    /// URLs currently producing output
    pub fn playing(&self) -> HashSet<String> {
        self.state.lock().playing.clone()
    }

    pub fn gain(&self, url: &str) -> Option<f32> {
        self.state.lock().gains.get(url).copied()
    }

    /// Make the resource bound to `url` report its natural end
    pub fn finish(&self, url: &str) {
        self.state.lock().finished.insert(url.to_string());
    }

    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    pub fn released(&self) -> usize {
        self.state.lock().released
    }

    fn behavior(&self, url: &str) -> Behavior {
        self.state
            .lock()
            .behaviors
            .get(url)
            .cloned()
            .unwrap_or(Behavior::Ready)
    }

    fn record_attempt(&self, url: &str) -> usize {
        let mut state = self.state.lock();
        let attempts = state.attempts.entry(url.to_string()).or_default();
        attempts.push(Instant::now());
        attempts.len()
    }
}

pub struct ScriptedResource {
    backend: ScriptedBackend,
    url: Option<String>,
    ready: Arc<AtomicBool>,
    released: bool,
    position: Duration,
}

impl ScriptedResource {
    fn new(backend: ScriptedBackend) -> Self {
        Self {
            backend,
            url: None,
            ready: Arc::new(AtomicBool::new(false)),
            released: false,
            position: Duration::ZERO,
        }
    }

    fn stop_output(&self) {
        if let Some(url) = &self.url {
            self.backend.state.lock().playing.remove(url);
        }
    }
}

impl PlayableResource for ScriptedResource {
    fn bind(&mut self, url: &str) -> ReadyFuture {
        self.stop_output();
        self.url = Some(url.to_string());
        self.released = false;
        self.position = Duration::ZERO;

        // Fresh flag per bind so an abandoned load cannot mark a later one ready
        let ready = Arc::new(AtomicBool::new(false));
        self.ready = Arc::clone(&ready);

        let attempt = self.backend.record_attempt(url);
        let behavior = self.backend.behavior(url);

        Box::pin(async move {
            match behavior {
                Behavior::Ready | Behavior::RejectPlay => {}
                Behavior::Fail(msg) => return Err(ResourceError::new(msg)),
                Behavior::FailFirst(n) if attempt <= n => {
                    return Err(ResourceError::new(format!("flaky attempt {attempt}")));
                }
                Behavior::FailFirst(_) => {}
                Behavior::Hang => futures::future::pending::<()>().await,
                Behavior::Gated(mut rx) => {
                    rx.wait_for(|open| *open)
                        .await
                        .map_err(|_| ResourceError::new("gate dropped"))?;
                }
            }
            ready.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn is_ready(&self) -> bool {
        !self.released && self.ready.load(Ordering::SeqCst)
    }

    fn play(&mut self) -> Result<(), ResourceError> {
        let Some(url) = self.url.clone() else {
            return Err(ResourceError::new("nothing bound"));
        };
        if matches!(self.backend.behavior(&url), Behavior::RejectPlay) {
            return Err(ResourceError::new("autoplay blocked"));
        }
        self.backend.state.lock().playing.insert(url);
        Ok(())
    }

    fn pause(&mut self) {
        self.stop_output();
    }

    fn seek(&mut self, position: Duration) -> Result<(), ResourceError> {
        self.position = position;
        if let Some(url) = &self.url {
            self.backend.state.lock().finished.remove(url);
        }
        Ok(())
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs(200))
    }

    fn is_finished(&self) -> bool {
        self.url
            .as_ref()
            .is_some_and(|url| self.backend.state.lock().finished.contains(url))
    }

    fn set_gain(&mut self, gain: f32) {
        if let Some(url) = &self.url {
            self.backend.state.lock().gains.insert(url.clone(), gain);
        }
    }

    fn release(&mut self) {
        self.stop_output();
        self.released = true;
        self.backend.state.lock().released += 1;
    }
}

pub fn url(id: &str) -> String {
    format!("https://cdn.example.com/audio/{id}.mp3")
}

pub fn track(id: &str) -> Track {
    Track::new(id, format!("Song {id}"), "Test Artist", url(id))
}

pub fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

/// Short timings so failure paths finish quickly in real time
pub fn fast_config() -> PlaybackConfig {
    PlaybackConfig {
        load_timeout_ms: 200,
        retry_delay_ms: 10,
        ..Default::default()
    }
}

/// Poll `condition` until it holds, panicking after two seconds
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(std::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
