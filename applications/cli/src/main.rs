//! Encore - headless music player

use clap::{Parser, Subcommand};
use encore_core::{Catalog, MemoryCatalog, TrackFilter};
use encore_cli::{
    backend::FetchBackend,
    config::AppConfig,
    player::{self, QueueRequest},
};
use encore_playback::{PlaybackSession, PlaybackState};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "encore")]
#[command(about = "Encore headless music player", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "ENCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog file (overrides catalog.path)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play tracks from the catalog
    Play {
        /// Only tracks whose title or artist contains this text
        #[arg(short, long)]
        search: Option<String>,
        /// Only tracks in this category
        #[arg(long)]
        category: Option<String>,
        /// Play a playlist instead of the whole catalog
        #[arg(short, long)]
        playlist: Option<String>,
        /// Track to start with (defaults to the first in the queue)
        #[arg(short, long)]
        track: Option<String>,
        /// Shuffle the queue
        #[arg(long)]
        shuffle: bool,
        /// Repeat the current track
        #[arg(long)]
        repeat: bool,
        /// Volume 0-100
        #[arg(long)]
        volume: Option<u8>,
    },
    /// List catalog tracks
    List {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore_cli=info,encore_playback=info,encore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    let catalog_path = cli.catalog.unwrap_or_else(|| config.catalog.path.clone());
    let catalog = MemoryCatalog::from_json_file(&catalog_path)?;
    tracing::info!(
        "Loaded {} tracks from {}",
        catalog.tracks.len(),
        catalog_path.display()
    );

    match cli.command {
        Commands::Play {
            search,
            category,
            playlist,
            track,
            shuffle,
            repeat,
            volume,
        } => {
            let request = QueueRequest {
                filter: filter(search, category),
                playlist,
                start: track,
            };
            play(&config, &catalog, &request, shuffle, repeat, volume).await?;
        }
        Commands::List { search, category } => {
            let tracks = catalog
                .list_tracks_matching(&filter(search, category))
                .await?;
            for track in &tracks {
                println!("{}", player::format_track(track));
            }
            println!("{} tracks, {}", tracks.len(), player::total_duration(&tracks));
        }
    }

    Ok(())
}

fn filter(search: Option<String>, category: Option<String>) -> TrackFilter {
    TrackFilter {
        search: search.unwrap_or_default(),
        category,
    }
}

async fn play(
    config: &AppConfig,
    catalog: &MemoryCatalog,
    request: &QueueRequest,
    shuffle: bool,
    repeat: bool,
    volume: Option<u8>,
) -> anyhow::Result<()> {
    let (tracks, start) = player::build_queue(catalog, request).await?;

    let backend = FetchBackend::new(config.player.bitrate_kbps);
    let session = PlaybackSession::new(config.playback.clone(), backend.factory())?;
    tokio::spawn(player::report_events(session.clone()));

    if shuffle && !session.is_shuffle_on() {
        session.toggle_shuffle();
    }
    if repeat && !session.is_repeat_on() {
        session.toggle_repeat();
    }
    if let Some(level) = volume {
        session.set_volume(level);
    }

    let progress = {
        let session = session.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(10));
            loop {
                ticker.tick().await;
                if let Some(line) = player::format_progress(&session) {
                    tracing::info!("{}", line);
                }
            }
        })
    };

    let outcome = tokio::select! {
        result = player::run(&session, tracks, &start, config.player.poll_interval()) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    progress.abort();
    session.shutdown();

    match outcome {
        Some(Ok(PlaybackState::Error { reason, .. })) => {
            let notification = reason.notification();
            anyhow::bail!("{}: {}", notification.title, notification.description)
        }
        Some(Ok(_)) => Ok(()),
        Some(Err(e)) => Err(e.into()),
        None => {
            tracing::info!("Interrupted");
            Ok(())
        }
    }
}
