//! Audio output abstraction and the pull adapter that feeds it.
//!
//! The player never talks to a sound device directly. It drives an
//! [`AudioOutput`], which receives a [`ClipSource`]: an iterator of interleaved
//! `f32` samples pulled block-wise from a [`SampleSource`].
//!
//! `ClipSource` yields silence while the download is behind (underrun) and
//! ends only once the source reports it is exhausted, so an output that runs
//! dry has genuinely finished the track.

use crate::clip::{MediaClip, SampleSource};
use crate::types::AudioSpec;

/// Host audio output contract.
///
/// All methods are called from the player's update thread.
pub trait AudioOutput {
    /// Replace whatever is currently loaded with `source`. Does not start playback.
    fn attach(&mut self, source: ClipSource);

    fn play(&mut self);

    fn pause(&mut self);

    /// Stop and unload the current source.
    fn stop(&mut self);

    /// Linear gain in [0, 1].
    fn set_volume(&mut self, volume: f32);

    /// Whether a source is loaded, unpaused and has not run out of samples.
    fn is_playing(&self) -> bool;
}

/// Iterator adapter over a [`SampleSource`], pulling `block` samples at a time.
///
/// Notes:
/// - the output spec is captured at construction and never changes,
/// - the block holds whole frames, so silence padded in after an underrun
///   keeps the channel order intact,
/// - the block buffer is allocated once; pulls reuse it.
pub struct ClipSource<S: SampleSource = MediaClip> {
    source: S,
    spec: AudioSpec,
    block: Vec<f32>,
    len: usize,
    cursor: usize,
}

impl<S: SampleSource> ClipSource<S> {
    /// Returns `None` while the source's spec is still unknown.
    pub fn new(source: S, block_samples: usize) -> Option<Self> {
        let spec = source.spec()?;
        let channels = usize::from(spec.channels.max(1));
        let block_len = block_samples.max(1).div_ceil(channels) * channels;
        Some(Self {
            source,
            spec,
            block: vec![0.0; block_len],
            len: 0,
            cursor: 0,
        })
    }

    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Pull the next block. Returns false once the source is exhausted.
    fn refill(&mut self) -> bool {
        self.cursor = 0;
        let n = self.source.read_interleaved(&mut self.block);
        if n < self.block.len() && self.source.is_exhausted() {
            // Final partial block: no trailing silence.
            self.len = n;
            return n > 0;
        }
        // Underrun pads with the zeros `read_interleaved` wrote.
        self.len = self.block.len();
        true
    }
}

impl<S: SampleSource> Iterator for ClipSource<S> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.cursor >= self.len && !self.refill() {
            return None;
        }
        let s = self.block[self.cursor];
        self.cursor += 1;
        Some(s)
    }
}
