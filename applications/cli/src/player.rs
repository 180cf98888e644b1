//! Headless player loop

use crate::error::{CliError, Result};
use encore_core::{
    resolve_queue, Catalog, MemoryCatalog, PlaylistId, PlaylistSource, Track, TrackFilter, TrackId,
};
use encore_playback::{format_time, PlaybackEvent, PlaybackSession, PlaybackState};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// What to queue up
#[derive(Debug, Clone, Default)]
pub struct QueueRequest {
    pub filter: TrackFilter,
    pub playlist: Option<String>,
    pub start: Option<String>,
}

/// Build the queue and the track to start with
pub async fn build_queue(
    catalog: &MemoryCatalog,
    request: &QueueRequest,
) -> Result<(Vec<Track>, TrackId)> {
    let tracks = match &request.playlist {
        Some(name) => {
            let ids = catalog.playlist_track_ids(&PlaylistId::new(name)).await?;
            let all = catalog.list_tracks().await?;
            resolve_queue(&all, &ids)
                .into_iter()
                .filter(|t| request.filter.matches(t))
                .collect()
        }
        None => catalog.list_tracks_matching(&request.filter).await?,
    };

    let start = match &request.start {
        Some(id) => {
            let id = TrackId::new(id);
            if !tracks.iter().any(|t| t.id == id) {
                return Err(CliError::EmptyQueue(format!("{id} is not in the selection")));
            }
            id
        }
        None => tracks
            .first()
            .map(|t| t.id.clone())
            .ok_or_else(|| CliError::EmptyQueue("no tracks match".to_string()))?,
    };

    Ok((tracks, start))
}

/// Play `start` and keep going until the queue ends or a track fails
///
/// Returns the final state.
pub async fn run(
    session: &PlaybackSession,
    tracks: Vec<Track>,
    start: &TrackId,
    poll_interval: Duration,
) -> Result<PlaybackState> {
    session.play_from(tracks, start).await?;

    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        ticker.tick().await;

        if let Err(e) = session.poll_finished().await {
            warn!("{}", e);
        }

        match session.current_state() {
            state @ (PlaybackState::Ended | PlaybackState::Error { .. }) => return Ok(state),
            _ => {}
        }
    }
}

/// Log session events until the session goes away
pub async fn report_events(session: PlaybackSession) {
    let mut events = session.subscribe();
    drop(session);

    loop {
        match events.recv().await {
            Ok(event) => describe(&event),
            Err(RecvError::Lagged(skipped)) => warn!("Missed {} player events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

fn describe(event: &PlaybackEvent) {
    match event {
        PlaybackEvent::StateChanged { state } => match state {
            PlaybackState::Playing(id) => info!("▶ {}", id),
            PlaybackState::Paused(id) => info!("⏸ {}", id),
            PlaybackState::Ended => info!("■ end of queue"),
            _ => {}
        },
        PlaybackEvent::TrackChanged { track_id, .. } => info!("Now loading {}", track_id),
        PlaybackEvent::Error { notification, .. } => {
            warn!("{}: {}", notification.title, notification.description);
        }
        PlaybackEvent::ShuffleChanged { enabled } => info!("Shuffle: {}", enabled),
        PlaybackEvent::RepeatChanged { enabled } => info!("Repeat: {}", enabled),
        PlaybackEvent::VolumeChanged { level, is_muted } => {
            info!("Volume: {}%{}", level, if *is_muted { " (muted)" } else { "" });
        }
        PlaybackEvent::QueueChanged { length } => info!("Queue: {} tracks", length),
    }
}

/// One catalog line for `list`
pub fn format_track(track: &Track) -> String {
    let duration = if track.duration_label.is_empty() {
        "-:--"
    } else {
        track.duration_label.as_str()
    };
    format!("{}\t{} - {}\t{}", track.id, track.artist, track.title, duration)
}

/// Progress line for the current track
pub fn format_progress(session: &PlaybackSession) -> Option<String> {
    let track = session.current_track()?;
    let progress = session.progress()?;
    Some(format!(
        "{} - {} [{}] {:>3.0}%",
        track.artist,
        track.title,
        progress.label(),
        progress.fraction() * 100.0
    ))
}

/// `m:ss` total of the tracks' catalog durations, skipping unparseable ones
pub fn total_duration(tracks: &[Track]) -> String {
    let seconds = tracks
        .iter()
        .filter_map(|t| {
            let (m, s) = t.duration_label.split_once(':')?;
            Some(m.trim().parse::<u64>().ok()? * 60 + s.trim().parse::<u64>().ok()?)
        })
        .sum();
    format_time(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new(vec![
            Track::new("s1", "So What", "Miles Davis", "/m/1.mp3")
                .with_duration_label("9:22")
                .with_category("jazz"),
            Track::new("s2", "Teen Town", "Weather Report", "/m/2.mp3")
                .with_duration_label("2:51")
                .with_category("fusion"),
            Track::new("s3", "Blue in Green", "Miles Davis", "/m/3.mp3")
                .with_duration_label("5:37")
                .with_category("jazz"),
        ]);
        catalog.insert_playlist("mix", vec![TrackId::new("s3"), TrackId::new("s2")]);
        catalog
    }

    #[tokio::test]
    async fn queue_from_search() {
        let request = QueueRequest {
            filter: TrackFilter::search("miles"),
            ..Default::default()
        };
        let (tracks, start) = build_queue(&catalog(), &request).await.unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(start, TrackId::new("s1"));
    }

    #[tokio::test]
    async fn queue_from_playlist_keeps_playlist_order() {
        let request = QueueRequest {
            playlist: Some("mix".to_string()),
            start: Some("s2".to_string()),
            ..Default::default()
        };
        let (tracks, start) = build_queue(&catalog(), &request).await.unwrap();

        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["s3", "s2"]);
        assert_eq!(start, TrackId::new("s2"));
    }

    #[tokio::test]
    async fn start_outside_selection_is_rejected() {
        let request = QueueRequest {
            filter: TrackFilter::default().in_category("fusion"),
            start: Some("s1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            build_queue(&catalog(), &request).await,
            Err(CliError::EmptyQueue(_))
        ));
    }

    #[test]
    fn total_of_catalog_durations() {
        let tracks = catalog().tracks;
        assert_eq!(total_duration(&tracks), "17:50");
        assert_eq!(format_track(&tracks[1]), "s2\tWeather Report - Teen Town\t2:51");
    }
}
