//! Streaming WAV playback over HTTP.
//!
//! A track URL is downloaded on a dedicated thread over a raw TCP connection
//! (chunked, `Content-Length` or read-until-close bodies), buffered into a
//! [`MediaClip`], and played back through an [`AudioOutput`] that pulls 16-bit
//! PCM converted to `f32` without blocking. [`MediaPlayer`] owns the state
//! machine; [`PlayerHandle`] lets any thread queue requests for it.
//!
//! This file only wires modules and re-exports.

pub mod chunked;
pub mod fetch;
pub mod wav;

mod clip;
mod error;
mod output;
mod player;
mod queue;
mod settings;
mod types;

#[cfg(feature = "rodio")]
mod rodio;

// Public API re-exports.
pub use crate::clip::{MediaClip, SampleSource};
pub use crate::error::{ClipError, ClipResult, WavError};
pub use crate::fetch::{spawn_fetch, Fetcher, HttpTarget};
pub use crate::output::{AudioOutput, ClipSource};
pub use crate::player::{MediaPlayer, PlayerHandle};
pub use crate::queue::{Action, ActionQueue, ActionSender};
pub use crate::settings::StreamSettings;
pub use crate::types::{
    AudioSpec, FetchOutcome, PlaybackInfo, PlayerEvent, PlayerState, RunReason, StopReason, Track,
};
pub use crate::wav::WavHeader;

#[cfg(feature = "rodio")]
pub use crate::rodio::RodioOutput;
