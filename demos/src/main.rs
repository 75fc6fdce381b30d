use std::time::Duration;

use stream_clip::{MediaPlayer, PlayerEvent, PlayerState, RodioOutput, StreamSettings, Track};
use tracing::{info, metadata::LevelFilter, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

const FRAME: Duration = Duration::from_millis(16);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::default().add_directive(LevelFilter::INFO.into()))
        .with_line_number(true)
        .with_file(true)
        .init();

    // Args:
    // 1) WAV URL (plain http only)
    // 2) Optional volume in [0, 1] (default: 0.8)
    let url: Url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8000/audio.wav".to_string())
        .parse()?;
    let volume: f32 = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.8);

    info!("play_url starting");
    info!("  URL: {}", url);

    let output = RodioOutput::open_default()?;
    let mut player = MediaPlayer::new(output, StreamSettings::default());
    let mut events = player.subscribe_events();
    player.set_volume(volume);
    player.play(Track::new("cli", url));

    // Update loop: one tick per frame until the track finishes or fails.
    loop {
        player.tick();

        while let Ok(event) = events.try_recv() {
            match event {
                PlayerEvent::DownloadEnded { outcome, .. } => info!("download ended: {:?}", outcome),
                PlayerEvent::PlaybackBegan { .. } => info!("playback began"),
                PlayerEvent::PlaybackEnded { reason, .. } => info!("playback ended: {:?}", reason),
                PlayerEvent::Error { message, .. } => warn!("error: {}", message),
                PlayerEvent::DownloadBegan { .. } => {}
            }
        }

        let info = player.playback_info();
        match info.state {
            PlayerState::Error => return Err("playback failed".into()),
            PlayerState::Stopped if !info.is_paused() => break,
            _ => {}
        }
        std::thread::sleep(FRAME);
    }

    info!(
        "done at {:.1}s, downloaded {:.0}%",
        player.position().as_secs_f32(),
        player.download_progress() * 100.0
    );
    Ok(())
}
