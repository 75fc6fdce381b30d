//! Public, minimal types shared by the clip, the player and its handles.
//!
//! `PlaybackInfo` is the player's observable status. It is only ever handed out
//! as a cloned snapshot; callers never hold a reference into live player state.

use std::fmt;
use std::sync::Arc;

use url::Url;

/// Basic PCM specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

/// A remote track: an opaque identifier plus the URL its audio is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Track {
    pub id: Arc<str>,
    pub url: Url,
}

impl Track {
    pub fn new(id: impl Into<Arc<str>>, url: Url) -> Self {
        Self { id: id.into(), url }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.url)
    }
}

/// Coarse player state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Nothing has been played yet.
    #[default]
    NotInitialized,
    /// The current track could not be fetched or decoded.
    Error,
    /// A track is downloading and/or producing audio.
    Playing,
    /// Playback is paused, stopped or finished; see [`StopReason`].
    Stopped,
}

/// Why the player entered [`PlayerState::Stopped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    #[default]
    None,
    /// Paused by the caller; position is retained.
    Pause,
    /// Stopped by the caller; buffered audio is dropped.
    Stop,
    /// The track played to its end.
    Completed,
}

/// Why the player entered [`PlayerState::Playing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunReason {
    #[default]
    None,
    /// A new track was requested.
    Play,
    /// A paused track was resumed.
    Resume,
}

/// Snapshot of the player's public status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackInfo {
    pub track: Option<Track>,
    pub state: PlayerState,
    pub stop_reason: StopReason,
    pub run_reason: RunReason,
    pub muted: bool,
    pub app_focused: bool,
}

impl Default for PlaybackInfo {
    fn default() -> Self {
        Self {
            track: None,
            state: PlayerState::NotInitialized,
            stop_reason: StopReason::None,
            run_reason: RunReason::None,
            muted: false,
            app_focused: true,
        }
    }
}

impl PlaybackInfo {
    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlayerState::Stopped && self.stop_reason == StopReason::Pause
    }
}

/// How a download ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The server finished the body (or the body framing broke off, which is
    /// treated the same way).
    Completed { bytes: usize },
    /// The fetch observed its cancellation token.
    Cancelled { bytes: usize },
    /// The connection could not be established or the server refused the request.
    Failed { message: String },
}

/// Player events, emitted on state transition boundaries.
///
/// These are out-of-band and best-effort: a subscriber that lags behind loses
/// the oldest events. Use [`PlaybackInfo`] snapshots for authoritative state.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    DownloadBegan {
        track: Track,
    },
    DownloadEnded {
        track: Track,
        outcome: FetchOutcome,
    },
    PlaybackBegan {
        track: Track,
    },
    PlaybackEnded {
        track: Track,
        reason: StopReason,
    },
    Error {
        track: Track,
        message: String,
    },
}
