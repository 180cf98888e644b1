//! File and HTTP resource backend
//!
//! A headless stand-in for an audio element. Binding fetches the source
//! (`tokio::fs` for local paths, `reqwest` for `http(s)://` URLs) and
//! estimates its length from the byte count. Playback is simulated with a
//! clock, so position, progress and natural end behave like a real player.

use encore_playback::{PlayableResource, ReadyFuture, ResourceError, ResourceFactory};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Creates `FetchResource`s sharing one HTTP client
#[derive(Clone)]
pub struct FetchBackend {
    client: reqwest::Client,
    bitrate_kbps: u32,
}

impl FetchBackend {
    pub fn new(bitrate_kbps: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            bitrate_kbps: bitrate_kbps.max(1),
        }
    }

    pub fn factory(&self) -> Arc<dyn ResourceFactory> {
        let backend = self.clone();
        Arc::new(move || {
            Box::new(FetchResource::new(
                backend.client.clone(),
                backend.bitrate_kbps,
            )) as Box<dyn PlayableResource>
        })
    }
}

#[derive(Debug, Default)]
struct Source {
    /// Bumped on every bind/release; a fetch only lands if it still matches
    generation: u64,
    duration: Option<Duration>,
}

/// Clock-driven resource over a fetched source
pub struct FetchResource {
    client: reqwest::Client,
    bitrate_kbps: u32,
    source: Arc<Mutex<Source>>,
    /// Position accumulated up to the last pause or seek
    offset: Duration,
    /// Set while playing
    started_at: Option<Instant>,
    gain: f32,
}

impl FetchResource {
    pub fn new(client: reqwest::Client, bitrate_kbps: u32) -> Self {
        Self {
            client,
            bitrate_kbps,
            source: Arc::new(Mutex::new(Source::default())),
            offset: Duration::ZERO,
            started_at: None,
            gain: 1.0,
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    fn reset_clock(&mut self) {
        self.offset = Duration::ZERO;
        self.started_at = None;
    }

    fn invalidate(&mut self) -> u64 {
        let mut source = self.source.lock();
        source.generation += 1;
        source.duration = None;
        source.generation
    }
}

/// Playing time of `bytes` at `bitrate_kbps`
pub fn estimate_duration(bytes: u64, bitrate_kbps: u32) -> Duration {
    let bits_per_second = u64::from(bitrate_kbps) * 1000;
    Duration::from_secs_f64((bytes * 8) as f64 / bits_per_second as f64)
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

async fn fetch_len(client: &reqwest::Client, url: &str) -> Result<u64, ResourceError> {
    if is_remote(url) {
        let response = client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ResourceError::new(e.to_string()))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ResourceError::new(e.to_string()))?;
        Ok(body.len() as u64)
    } else {
        let path = url.strip_prefix("file://").unwrap_or(url);
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ResourceError::new(format!("{path}: {e}")))?;
        if !metadata.is_file() {
            return Err(ResourceError::new(format!("{path}: not a file")));
        }
        Ok(metadata.len())
    }
}

impl PlayableResource for FetchResource {
    fn bind(&mut self, url: &str) -> ReadyFuture {
        self.reset_clock();
        let generation = self.invalidate();

        let client = self.client.clone();
        let source = Arc::clone(&self.source);
        let bitrate = self.bitrate_kbps;
        let url = url.to_string();

        Box::pin(async move {
            let bytes = fetch_len(&client, &url).await?;
            if bytes == 0 {
                return Err(ResourceError::new(format!("{url}: empty source")));
            }

            let mut state = source.lock();
            if state.generation != generation {
                return Err(ResourceError::new("superseded by a newer bind"));
            }
            let duration = estimate_duration(bytes, bitrate);
            debug!("Fetched {} ({} bytes, ~{:?})", url, bytes, duration);
            state.duration = Some(duration);
            Ok(())
        })
    }

    fn is_ready(&self) -> bool {
        self.source.lock().duration.is_some()
    }

    fn play(&mut self) -> Result<(), ResourceError> {
        if !self.is_ready() {
            return Err(ResourceError::new("source not loaded"));
        }
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.offset += started.elapsed();
        }
    }

    fn seek(&mut self, position: Duration) -> Result<(), ResourceError> {
        if let Some(duration) = self.duration() {
            if position > duration {
                return Err(ResourceError::new(format!(
                    "position {position:?} beyond end {duration:?}"
                )));
            }
        }
        self.offset = position;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn position(&self) -> Duration {
        let running = self.started_at.map(|s| s.elapsed()).unwrap_or_default();
        let position = self.offset + running;
        match self.duration() {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.source.lock().duration
    }

    fn is_finished(&self) -> bool {
        self.started_at.is_some()
            && self
                .duration()
                .is_some_and(|duration| self.position() >= duration)
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    fn release(&mut self) {
        self.reset_clock();
        self.invalidate();
    }
}
