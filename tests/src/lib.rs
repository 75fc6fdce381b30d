//! Shared fixtures for the `stream-clip` integration tests.
//!
//! - [`setup`]: the background runtime every fixture server lives on,
//! - [`wav`]: synthesized WAV payloads with recognizable sample values,
//! - [`server`]: an axum server for `Content-Length` and streamed bodies, and a
//!   raw TCP server that controls chunk boundaries byte for byte,
//! - [`output`]: an in-memory [`stream_clip::AudioOutput`] the tests pump by hand.

pub mod output;
pub mod setup;
pub mod wav;

use std::time::{Duration, Instant};

pub use output::RecordingOutput;
pub use server::{ChunkEnd, ChunkPlan, ChunkedServer, ClipServer};
pub use wav::WavFixture;

/// Poll `cond` every few milliseconds until it holds or `timeout` elapses.
///
/// Returns the final value of `cond`.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}
