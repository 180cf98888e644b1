//! Headless playback over local files
//!
//! The backend runs at 1280 kbps here, so the test tracks last a few hundred ms.

use encore_cli::{player, FetchBackend, QueueRequest};
use encore_core::{MemoryCatalog, TrackId};
use encore_playback::{PlaybackConfig, PlaybackError, PlaybackSession, PlaybackState};
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;

/// 16 000 bytes per tenth of a second at 1280 kbps
fn write_track(dir: &TempDir, name: &str, tenths: usize) -> String {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&vec![0u8; 16_000 * tenths]).unwrap();
    path.to_str().unwrap().to_string()
}

fn catalog(dir: &TempDir, extra: &str) -> MemoryCatalog {
    let json = format!(
        r#"{{
            "tracks": [
                {{ "id": "s1", "title": "One", "artist": "A", "file_url": "{}", "duration": "0:03" }},
                {{ "id": "s2", "title": "Two", "artist": "A", "file_url": "{}", "duration": "0:02" }},
                {{ "id": "s3", "title": "Three", "artist": "B", "file_url": "{}", "duration": "0:04" }}
                {extra}
            ]
        }}"#,
        write_track(dir, "one.mp3", 3),
        write_track(dir, "two.mp3", 2),
        write_track(dir, "three.mp3", 4),
    );
    MemoryCatalog::from_json(&json).unwrap()
}

fn session() -> PlaybackSession {
    let config = PlaybackConfig {
        retry_delay_ms: 10,
        ..Default::default()
    };
    PlaybackSession::new(config, FetchBackend::new(1280).factory()).unwrap()
}

const POLL: Duration = Duration::from_millis(20);

#[tokio::test]
async fn test_plays_whole_queue_to_end() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog(&dir, "");
    let (tracks, start) = player::build_queue(&catalog, &QueueRequest::default())
        .await
        .unwrap();
    let session = session();

    let started = std::time::Instant::now();
    let state = player::run(&session, tracks, &start, POLL)
        .await
        .unwrap();

    assert_eq!(state, PlaybackState::Ended);
    assert_eq!(session.current_track().unwrap().id, TrackId::new("s3"));
    // 300ms + 200ms + 400ms of audio
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
}

#[tokio::test]
async fn test_missing_file_stops_with_error() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog(
        &dir,
        r#", { "id": "gone", "title": "Gone", "artist": "C", "file_url": "/no/such/file.mp3" }"#,
    );
    let request = QueueRequest {
        start: Some("gone".to_string()),
        ..Default::default()
    };
    let (tracks, start) = player::build_queue(&catalog, &request).await.unwrap();
    let session = session();

    let err = player::run(&session, tracks, &start, POLL)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("unavailable"), "{err}");
    assert!(matches!(
        session.current_state(),
        PlaybackState::Error {
            reason: PlaybackError::ResourceUnavailable { .. },
            ..
        }
    ));
}
