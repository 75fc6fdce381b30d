//! Streaming media clip: the shared buffer between a fetch thread and the audio driver.
//!
//! A [`MediaClip`] owns the raw downloaded bytes of one track, the parsed WAV
//! header once enough bytes have arrived, and a read cursor advanced by the
//! pull callback ([`MediaClip::read_interleaved`]).
//!
//! Threading contract:
//! - exactly one writer (the fetch thread) calls `append` / `finish_download`;
//! - the audio driver thread calls `read_interleaved`;
//! - any thread may query status.
//!
//! All buffer state lives behind one `parking_lot::Mutex`, held only for the
//! duration of a copy or conversion. Readiness is mirrored in an atomic so the
//! update loop can poll it without touching the lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::ClipError;
use crate::settings::StreamSettings;
use crate::types::{AudioSpec, Track};
use crate::wav::WavHeader;

/// Pull-based PCM source driven by an audio driver thread.
///
/// Real-time contract for `read_interleaved`:
/// - it must not block on I/O or wait for data; missing samples are zero-filled,
/// - it must not allocate,
/// - it returns the number of samples that carry real audio (the rest of `out`
///   is silence).
pub trait SampleSource: Send + Sync {
    /// Output spec, once known.
    fn spec(&self) -> Option<AudioSpec>;

    /// Fill `out` with interleaved samples in [-1, 1].
    fn read_interleaved(&self, out: &mut [f32]) -> usize;

    /// No further samples will ever be produced.
    fn is_exhausted(&self) -> bool;
}

#[derive(Debug, Default)]
struct ClipBuffer {
    /// Raw download, header included.
    data: BytesMut,
    /// Absolute offset into `data` of the next unread PCM byte.
    cursor: usize,
    header: Option<WavHeader>,
    /// Body length announced by the server, if any.
    expected_len: Option<usize>,
    download_complete: bool,
    failure: Option<String>,
}

impl ClipBuffer {
    /// End of playable PCM: the declared data size, capped by what has arrived.
    fn payload_end(&self) -> usize {
        match self.header.as_ref().and_then(|h| h.total_len()) {
            Some(total) => total.min(self.data.len()),
            None => self.data.len(),
        }
    }

    fn available_bytes(&self) -> usize {
        self.payload_end().saturating_sub(self.cursor)
    }

    /// Bytes per interleaved 16-bit frame; 2 until the header is known.
    fn frame_bytes(&self) -> usize {
        self.header
            .as_ref()
            .map_or(2, |h| usize::from(h.channels.max(1)) * 2)
    }
}

struct ClipShared {
    track: Track,
    header_probe_bytes: usize,
    max_header_bytes: usize,
    ready_threshold_bytes: usize,
    buffer: Mutex<ClipBuffer>,
    ready: AtomicBool,
    cancel: CancellationToken,
}

/// Download buffer and read cursor for one track. Cheap to clone.
#[derive(Clone)]
pub struct MediaClip {
    inner: Arc<ClipShared>,
}

impl std::fmt::Debug for MediaClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaClip")
            .field("track", &self.inner.track)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl MediaClip {
    pub fn new(track: Track, settings: &StreamSettings) -> Self {
        Self {
            inner: Arc::new(ClipShared {
                track,
                header_probe_bytes: settings.header_probe_bytes,
                max_header_bytes: settings.max_header_bytes,
                ready_threshold_bytes: settings.ready_threshold_bytes,
                buffer: Mutex::new(ClipBuffer::default()),
                ready: AtomicBool::new(false),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn track(&self) -> &Track {
        &self.inner.track
    }

    /// Token observed by the fetch loop between reads.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Request the fetch to stop. Later appends are ignored.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Record the body length announced by the server.
    pub fn set_expected_len(&self, len: Option<usize>) {
        self.inner.buffer.lock().expected_len = len;
    }

    /// Append downloaded bytes. Called by the fetch thread only.
    pub fn append(&self, bytes: &[u8]) {
        if bytes.is_empty() || self.is_cancelled() {
            return;
        }

        let mut buf = self.inner.buffer.lock();
        if buf.failure.is_some() || buf.download_complete {
            return;
        }
        buf.data.extend_from_slice(bytes);

        if buf.header.is_none() && buf.data.len() >= self.inner.header_probe_bytes {
            self.probe_header(&mut buf, false);
        }
        self.update_ready(&buf);
    }

    /// Mark the download as finished; the final header attempt happens here.
    pub fn finish_download(&self) {
        let mut buf = self.inner.buffer.lock();
        if buf.download_complete {
            return;
        }
        buf.download_complete = true;
        if buf.header.is_none() && buf.failure.is_none() {
            self.probe_header(&mut buf, true);
        }
        tracing::debug!(
            "clip {}: download complete, {} bytes",
            self.inner.track.id,
            buf.data.len()
        );
        self.update_ready(&buf);
    }

    /// Mark the clip as unplayable.
    pub fn mark_failed(&self, message: impl Into<String>) {
        let mut buf = self.inner.buffer.lock();
        if buf.failure.is_none() {
            buf.failure = Some(message.into());
        }
        self.update_ready(&buf);
    }

    fn probe_header(&self, buf: &mut ClipBuffer, last_chance: bool) {
        match WavHeader::parse(&buf.data) {
            Ok(header) if !header.is_pcm16() => {
                let err = ClipError::UnsupportedFormat {
                    audio_format: header.audio_format,
                    bits_per_sample: header.bits_per_sample,
                };
                tracing::warn!("clip {}: {}", self.inner.track.id, err);
                buf.failure = Some(err.to_string());
            }
            Ok(header) => {
                tracing::debug!(
                    "clip {}: header parsed, {} Hz, {} ch, pcm at offset {}",
                    self.inner.track.id,
                    header.sample_rate,
                    header.channels,
                    header.header_size
                );
                buf.cursor = header.header_size;
                buf.header = Some(header);
            }
            Err(e) if last_chance || buf.data.len() >= self.inner.max_header_bytes => {
                let err = ClipError::from(e);
                tracing::warn!("clip {}: giving up on header: {}", self.inner.track.id, err);
                buf.failure = Some(err.to_string());
            }
            Err(e) => {
                tracing::trace!(
                    "clip {}: header not yet parseable at {} bytes: {}",
                    self.inner.track.id,
                    buf.data.len(),
                    e
                );
            }
        }
    }

    fn update_ready(&self, buf: &ClipBuffer) {
        let ready = buf.failure.is_none()
            && buf.header.is_some()
            && (buf.download_complete || buf.data.len() >= self.inner.ready_threshold_bytes);
        self.inner.ready.store(ready, Ordering::Release);
    }

    /// Enough audio is buffered to start playback.
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    pub fn failure(&self) -> Option<String> {
        self.inner.buffer.lock().failure.clone()
    }

    pub fn is_download_complete(&self) -> bool {
        self.inner.buffer.lock().download_complete
    }

    pub fn header(&self) -> Option<WavHeader> {
        self.inner.buffer.lock().header.clone()
    }

    /// Total bytes downloaded so far, header included.
    pub fn downloaded_bytes(&self) -> usize {
        self.inner.buffer.lock().data.len()
    }

    /// Unread PCM bytes currently buffered.
    pub fn buffered_bytes(&self) -> usize {
        self.inner.buffer.lock().available_bytes()
    }

    /// Download progress in [0, 1].
    ///
    /// Uses the server's `Content-Length` or the header's declared size; 0 while
    /// neither is known.
    pub fn progress(&self) -> f32 {
        let buf = self.inner.buffer.lock();
        if buf.download_complete {
            return 1.0;
        }
        let expected = buf
            .expected_len
            .or_else(|| buf.header.as_ref().and_then(|h| h.total_len()));
        match expected {
            Some(0) | None => 0.0,
            Some(total) => (buf.data.len() as f32 / total as f32).clamp(0.0, 1.0),
        }
    }

    pub fn estimated_duration(&self) -> Option<Duration> {
        self.inner
            .buffer
            .lock()
            .header
            .as_ref()
            .and_then(|h| h.estimated_duration())
    }

    /// Playback position implied by the read cursor.
    pub fn position(&self) -> Duration {
        let buf = self.inner.buffer.lock();
        match buf.header.as_ref() {
            Some(h) => h.position_of(buf.cursor.saturating_sub(h.header_size)),
            None => Duration::ZERO,
        }
    }

    /// Drop all buffered audio and rewind. The clip stays unplayable until new
    /// bytes with a header are appended.
    pub fn clear(&self) {
        let mut buf = self.inner.buffer.lock();
        buf.data = BytesMut::new();
        buf.cursor = 0;
        buf.header = None;
        self.inner.ready.store(false, Ordering::Release);
    }
}

impl SampleSource for MediaClip {
    fn spec(&self) -> Option<AudioSpec> {
        self.inner.buffer.lock().header.as_ref().map(WavHeader::spec)
    }

    fn read_interleaved(&self, out: &mut [f32]) -> usize {
        let mut buf = self.inner.buffer.lock();
        if buf.header.is_none() || buf.failure.is_some() {
            out.fill(0.0);
            return 0;
        }

        // Whole frames only, so a partially downloaded frame never shifts the
        // channel order of everything pulled after it.
        let frame_bytes = buf.frame_bytes();
        let channels = frame_bytes / 2;
        let frames = (out.len() / channels).min(buf.available_bytes() / frame_bytes);
        let samples = frames * channels;
        let start = buf.cursor;
        let pcm = &buf.data[start..start + samples * 2];
        for (dst, src) in out.iter_mut().zip(pcm.chunks_exact(2)) {
            *dst = i16::from_le_bytes([src[0], src[1]]) as f32 / 32768.0;
        }
        buf.cursor += samples * 2;
        out[samples..].fill(0.0);
        samples
    }

    fn is_exhausted(&self) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let buf = self.inner.buffer.lock();
        buf.failure.is_some()
            || (buf.download_complete
                && buf.header.is_some()
                && buf.available_bytes() < buf.frame_bytes())
    }
}
